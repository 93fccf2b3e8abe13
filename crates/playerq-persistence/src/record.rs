//! Player record blobs.

use playerq_domain::PlayerProperties;

use crate::error::{PersistenceError, Result};
use crate::keys::KeySpace;
use crate::store::{Batch, StateStore};

/// Stores the serialized property blob of each player under its id.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    keys: KeySpace,
}

impl RecordStore {
    #[must_use]
    pub const fn new(keys: KeySpace) -> Self {
        Self { keys }
    }

    /// Queue an unconditional overwrite of the player's blob.
    pub fn put(&self, batch: &mut Batch, player_id: &str, properties_json: &str) {
        batch.set(self.keys.record(player_id), properties_json);
    }

    /// Queue removal of the player's blob. No-op if absent.
    pub fn delete(&self, batch: &mut Batch, player_id: &str) {
        batch.delete(self.keys.record(player_id));
    }

    /// The stored blob, unparsed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the player has no record.
    pub async fn get_raw<S: StateStore + ?Sized>(&self, store: &S, player_id: &str) -> Result<String> {
        store
            .get(&self.keys.record(player_id))
            .await?
            .ok_or_else(|| PersistenceError::not_found(player_id))
    }

    /// The stored properties.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the player has no record and
    /// [`PersistenceError::Parse`] if the blob is not a JSON object.
    pub async fn get<S: StateStore + ?Sized>(&self, store: &S, player_id: &str) -> Result<PlayerProperties> {
        let blob = self.get_raw(store, player_id).await?;
        PlayerProperties::from_json(&blob).map_err(|e| PersistenceError::parse(player_id, &e))
    }
}
