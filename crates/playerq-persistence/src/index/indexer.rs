//! Per-property sorted-set indexing.

use playerq_domain::{PlayerProperties, property_score};

use super::registry::IndexRegistry;
use crate::config::ParsePolicy;
use crate::error::{PersistenceError, Result};
use crate::keys::KeySpace;
use crate::store::Batch;

/// Fields of one property blob, split by whether they can be indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub scored: Vec<(String, f64)>,
    pub unscored: Vec<String>,
}

/// Derives index scores from a property blob and queues index membership
/// changes.
///
/// Alongside each sorted set the indexer keeps a reverse index of the fields
/// a player is indexed under, so removal never has to read the record.
#[derive(Debug, Clone)]
pub struct PropertyIndexer {
    keys: KeySpace,
    registry: IndexRegistry,
    policy: ParsePolicy,
}

impl PropertyIndexer {
    #[must_use]
    pub const fn new(keys: KeySpace, registry: IndexRegistry, policy: ParsePolicy) -> Self {
        Self {
            keys,
            registry,
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> ParsePolicy {
        self.policy
    }

    /// Parse a blob into scored fields plus the names of fields that have no
    /// numeric score.
    ///
    /// Under [`ParsePolicy::BestEffort`] a malformed blob yields nothing and
    /// values without a numeric score are listed in
    /// [`Flattened::unscored`] instead of being indexed.
    ///
    /// # Errors
    ///
    /// Under [`ParsePolicy::Strict`], returns [`PersistenceError::Parse`] for a
    /// malformed blob and [`PersistenceError::InvalidProperty`] for the first
    /// value without a numeric score.
    pub fn flatten(&self, player_id: &str, properties_json: &str) -> Result<Flattened> {
        let properties = match PlayerProperties::from_json(properties_json) {
            Ok(properties) => properties,
            Err(e) if self.policy == ParsePolicy::BestEffort => {
                tracing::warn!(player_id, error = %e, "Malformed properties, indexing nothing");
                return Ok(Flattened::default());
            }
            Err(e) => return Err(PersistenceError::parse(player_id, &e)),
        };

        let mut flattened = Flattened {
            scored: Vec::with_capacity(properties.len()),
            unscored: Vec::new(),
        };
        for (field, value) in properties.iter() {
            match property_score(value) {
                Some(score) => flattened.scored.push((field.clone(), score)),
                None if self.policy == ParsePolicy::BestEffort => {
                    tracing::warn!(player_id, field = %field, "Non-numeric property, registering only");
                    flattened.unscored.push(field.clone());
                }
                None => {
                    return Err(PersistenceError::InvalidProperty {
                        field: field.clone(),
                        reason: format!("{value} has no numeric score"),
                    });
                }
            }
        }
        Ok(flattened)
    }

    /// Queue `player_id` into `field`'s index with `score`, registering the field.
    pub fn index_insert(&self, batch: &mut Batch, field: &str, score: f64, player_id: &str) {
        tracing::debug!(player_id, field, score, "Indexing field");
        self.registry.register(batch, field);
        batch
            .zadd(self.keys.index(field), player_id, score)
            .sadd(self.keys.indexed_fields(player_id), field);
    }

    /// Queue removal of `player_id` from `field`'s index.
    ///
    /// The field stays registered even if its index becomes empty.
    pub fn index_remove(&self, batch: &mut Batch, field: &str, player_id: &str) {
        tracing::debug!(player_id, field, "Un-indexing field");
        batch.zrem(self.keys.index(field), player_id);
    }

    /// Queue removal of `player_id` from every index it was inserted into.
    ///
    /// The field list is resolved when the batch applies.
    pub fn purge(&self, batch: &mut Batch, player_id: &str) {
        batch.purge_indexed(
            self.keys.indexed_fields(player_id),
            self.keys.prefix(),
            player_id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StateStore};

    fn indexer(policy: ParsePolicy) -> PropertyIndexer {
        PropertyIndexer::new(KeySpace::default(), IndexRegistry::default(), policy)
    }

    #[test]
    fn test_flatten_numbers_and_flag_strings() {
        let flattened = indexer(ParsePolicy::Strict)
            .flatten("p1", r#"{"ping.us-east":70,"map.sunset":"1620000000","skill":12.5}"#)
            .unwrap();

        assert!(flattened.unscored.is_empty());
        assert_eq!(
            flattened.scored,
            [
                ("map.sunset".to_string(), 1_620_000_000.0),
                ("ping.us-east".to_string(), 70.0),
                ("skill".to_string(), 12.5),
            ]
        );
    }

    #[test]
    fn test_best_effort_malformed_blob_yields_nothing() {
        let flattened = indexer(ParsePolicy::BestEffort).flatten("p1", "{\"ping\":").unwrap();
        assert_eq!(flattened, Flattened::default());
    }

    #[test]
    fn test_best_effort_lists_non_numeric_as_unscored() {
        let flattened = indexer(ParsePolicy::BestEffort)
            .flatten("p1", r#"{"ping":70,"region":"eu","ready":true,"nested":{"a":1}}"#)
            .unwrap();
        assert_eq!(flattened.scored, [("ping".to_string(), 70.0)]);
        assert_eq!(flattened.unscored, ["nested", "ready", "region"]);
    }

    #[test]
    fn test_strict_rejects() {
        let strict = indexer(ParsePolicy::Strict);
        assert!(strict.flatten("p1", "not json").unwrap_err().is_parse());

        let err = strict.flatten("p1", r#"{"ping":70,"ready":true}"#).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidProperty { field, .. } if field == "ready"));
    }

    #[tokio::test]
    async fn test_insert_then_purge() {
        let store = MemoryStore::new();
        let indexer = indexer(ParsePolicy::BestEffort);

        let mut batch = Batch::new();
        indexer.index_insert(&mut batch, "ping.us-east", 70.0, "p1");
        indexer.index_insert(&mut batch, "ping.us-east", 95.0, "p2");
        store.execute(batch).await.unwrap();
        assert_eq!(store.score("ping.us-east", "p1").await.unwrap(), Some(70.0));
        assert_eq!(store.set_members("indices").await.unwrap(), ["ping.us-east"]);

        let mut batch = Batch::new();
        indexer.purge(&mut batch, "p1");
        store.execute(batch).await.unwrap();
        assert_eq!(store.score("ping.us-east", "p1").await.unwrap(), None);
        assert_eq!(store.score("ping.us-east", "p2").await.unwrap(), Some(95.0));
    }

    #[tokio::test]
    async fn test_remove_keeps_registration() {
        let store = MemoryStore::new();
        let indexer = indexer(ParsePolicy::BestEffort);

        let mut batch = Batch::new();
        indexer.index_insert(&mut batch, "mode.ctf", 1_620_000_000.0, "p1");
        store.execute(batch).await.unwrap();

        let mut batch = Batch::new();
        indexer.index_remove(&mut batch, "mode.ctf", "p1");
        store.execute(batch).await.unwrap();

        assert!(store.sorted_set("mode.ctf").await.unwrap().is_empty());
        assert_eq!(store.set_members("indices").await.unwrap(), ["mode.ctf"]);
    }
}
