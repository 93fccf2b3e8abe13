//! # Player Queue Service
//!
//! Create, update, retrieve, delete and unindex players. Every mutation is
//! one atomic batch holding the record write together with all of its index
//! writes, so readers never see a record without its indexes or the reverse.
//!
//! Mutations start by purging the player from every index it is currently
//! in. The purge resolves the player's field list when the batch applies,
//! which means:
//!
//! - an update that drops a property also drops the stale index entry,
//! - a delete racing an update cannot leave entries for fields it never saw,
//! - delete and unindex never need to read or parse the stored record.

use playerq_domain::{PlayerProperties, TIMESTAMP_INDEX, epoch_seconds};

use crate::config::Config;
use crate::error::{PersistenceError, Result};
use crate::index::{IndexRegistry, PropertyIndexer};
use crate::keys::KeySpace;
use crate::record::RecordStore;
use crate::store::{Batch, StateStore};

/// Player queue state storage over a [`StateStore`]
#[derive(Debug, Clone)]
pub struct PlayerQueueService<S> {
    store: S,
    keys: KeySpace,
    records: RecordStore,
    indexer: PropertyIndexer,
    registry: IndexRegistry,
}

fn queue_of(queue_id: Option<&str>) -> Option<&str> {
    queue_id.filter(|q| !q.is_empty())
}

fn ensure_not_reserved(player_id: &str) -> Result<()> {
    if KeySpace::is_reserved(player_id) {
        return Err(PersistenceError::ReservedKey {
            player_id: player_id.to_string(),
        });
    }
    Ok(())
}

impl<S: StateStore> PlayerQueueService<S> {
    /// Create a service with the given configuration
    pub fn new(store: S, config: &Config) -> Self {
        let keys = config.key_space();
        let registry = IndexRegistry::new(keys.clone(), config.registry_delimiter);
        let indexer = PropertyIndexer::new(keys.clone(), registry.clone(), config.parse_policy);

        Self {
            store,
            records: RecordStore::new(keys.clone()),
            keys,
            indexer,
            registry,
        }
    }

    /// Underlying store
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Store a player's properties and index every numeric property.
    ///
    /// The blob replaces any previous record wholesale. Every property name
    /// is registered, including ones without a numeric score. A non-empty
    /// `queue_id` counts the player into that queue. Under the best-effort
    /// parse policy a malformed blob is still stored, just with no property
    /// indexes.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ReservedKey`] if `player_id` names a
    /// built-in key. Returns the store error if the batch fails; a batch
    /// rejected by the store (for instance because `player_id` equals a
    /// property index name) writes nothing. Under the strict parse policy,
    /// returns the parse error and writes nothing.
    #[tracing::instrument(skip(self, properties_json))]
    pub async fn create(
        &self,
        player_id: &str,
        properties_json: &str,
        queue_id: Option<&str>,
    ) -> Result<()> {
        ensure_not_reserved(player_id)?;
        let fields = self.indexer.flatten(player_id, properties_json)?;

        let mut batch = Batch::new();
        self.indexer.purge(&mut batch, player_id);
        self.records.put(&mut batch, player_id, properties_json);
        for (field, score) in &fields.scored {
            self.indexer.index_insert(&mut batch, field, *score, player_id);
        }
        for field in &fields.unscored {
            self.registry.register(&mut batch, field);
        }
        if let Some(queue_id) = queue_of(queue_id) {
            batch.zincr(self.keys.queues(), queue_id, 1.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let now = epoch_seconds() as f64;
        self.indexer.index_insert(&mut batch, TIMESTAMP_INDEX, now, player_id);

        self.store.execute(batch).await?;
        tracing::debug!(
            indexed = fields.scored.len(),
            unscored = fields.unscored.len(),
            "Player stored"
        );
        Ok(())
    }

    /// [`create`](Self::create) from typed properties.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create).
    pub async fn create_properties(
        &self,
        player_id: &str,
        properties: &PlayerProperties,
        queue_id: Option<&str>,
    ) -> Result<()> {
        let blob = properties.to_json()?;
        self.create(player_id, &blob, queue_id).await
    }

    /// Replace a player's properties. Same as [`create`](Self::create)
    /// without a queue: no field merge, and indexes for properties missing
    /// from the new blob are dropped.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create).
    pub async fn update(&self, player_id: &str, properties_json: &str) -> Result<()> {
        self.create(player_id, properties_json, None).await
    }

    /// Remove a player's record and every index entry for it.
    ///
    /// Deleting an absent player succeeds. A non-empty `queue_id` counts the
    /// player out of that queue.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::ReservedKey`] if `player_id` names a
    /// built-in key, and the store error if the batch fails.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, player_id: &str, queue_id: Option<&str>) -> Result<()> {
        ensure_not_reserved(player_id)?;
        let mut batch = Batch::new();
        self.indexer.purge(&mut batch, player_id);
        self.records.delete(&mut batch, player_id);
        if let Some(queue_id) = queue_of(queue_id) {
            batch.zincr(self.keys.queues(), queue_id, -1.0);
        }
        self.indexer.index_remove(&mut batch, TIMESTAMP_INDEX, player_id);

        self.store.execute(batch).await?;
        tracing::debug!("Player deleted");
        Ok(())
    }

    /// Pull a player out of every index but keep the record.
    ///
    /// # Errors
    ///
    /// Returns the store error if the batch fails.
    #[tracing::instrument(skip(self))]
    pub async fn unindex(&self, player_id: &str) -> Result<()> {
        let mut batch = Batch::new();
        self.indexer.purge(&mut batch, player_id);
        self.indexer.index_remove(&mut batch, TIMESTAMP_INDEX, player_id);

        self.store.execute(batch).await?;
        tracing::debug!("Player unindexed");
        Ok(())
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// A player's stored properties.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for an unknown player and
    /// [`PersistenceError::Parse`] if the
    /// stored blob is not a JSON object.
    pub async fn retrieve(&self, player_id: &str) -> Result<PlayerProperties> {
        self.records.get(&self.store, player_id).await
    }

    /// Members of a property index as `(player_id, score)`, lowest score first.
    ///
    /// # Errors
    ///
    /// Returns the store error if the index cannot be read.
    pub async fn index_members(&self, field: &str) -> Result<Vec<(String, f64)>> {
        self.store.sorted_set(&self.keys.index(field)).await
    }

    /// Fields a player is currently indexed under, including `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the reverse index cannot be read.
    pub async fn indexed_fields(&self, player_id: &str) -> Result<Vec<String>> {
        let mut fields = self.store.set_members(&self.keys.indexed_fields(player_id)).await?;
        fields.sort_unstable();
        Ok(fields)
    }

    /// Approximate number of players counted into a queue.
    ///
    /// # Errors
    ///
    /// Returns the store error if the counter cannot be read.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn queue_size(&self, queue_id: &str) -> Result<i64> {
        let count = self.store.score(&self.keys.queues(), queue_id).await?;
        Ok(count.map_or(0, |c| c.round() as i64))
    }
}
