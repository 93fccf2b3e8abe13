//! Persistence layer error types

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Transport or protocol failure against the backing store.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Malformed properties for player {player_id}: {reason}")]
    Parse { player_id: String, reason: String },

    #[error("Player not found: {player_id}")]
    NotFound { player_id: String },

    #[error("Player id {player_id} collides with a built-in key")]
    ReservedKey { player_id: String },

    #[error("Property {field} cannot be indexed: {reason}")]
    InvalidProperty { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PersistenceError {
    pub(crate) fn parse(player_id: &str, err: &serde_json::Error) -> Self {
        Self::Parse {
            player_id: player_id.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn not_found(player_id: &str) -> Self {
        Self::NotFound {
            player_id: player_id.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            player_id: String::new(),
            reason: err.to_string(),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for PersistenceError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
