//! # Player Queue Persistence Library
//!
//! State storage for matchmaking players: each player's flat property record,
//! one sorted-set index per property name, and the registry of known
//! property names, all maintained together in atomic batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PlayerQueueService                        │
//! │     (create / update / retrieve / delete / unindex)          │
//! └─────────────────────────────────────────────────────────────┘
//!            │                  │                   │
//!            ▼                  ▼                   ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │   RecordStore    │ │ PropertyIndexer  │ │  IndexRegistry   │
//! │ (property blobs) │ │ (sorted sets +   │ │ (known property  │
//! │                  │ │  reverse index)  │ │  names)          │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//!            │                  │                   │
//!            └──────────── one Batch ───────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          StateStore (RedisStore / MemoryStore)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `redis`: Enable the Redis store (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use playerq_persistence::{Config, PlayerQueueService, RedisStore};
//!
//! let config = Config::from_env()?;
//! let store = RedisStore::connect(&config.redis).await?;
//! let players = PlayerQueueService::new(store, &config);
//!
//! players
//!     .create("p1", r#"{"ping.us-east":70,"map.sunset":1620000000}"#, Some("q1"))
//!     .await?;
//! let properties = players.retrieve("p1").await?;
//! players.delete("p1", Some("q1")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod index;
pub mod keys;
pub mod record;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::{Config, ParsePolicy, RedisConfig};
pub use error::{PersistenceError, Result};
pub use index::{IndexRegistry, PropertyIndexer};
pub use keys::KeySpace;
pub use record::RecordStore;
pub use service::PlayerQueueService;
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{Batch, BatchOp, KeyKind, MemoryStore, StateStore};

pub use playerq_domain::{IndexName, PlayerProperties};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connect to Redis and build a service from environment configuration
///
/// # Errors
///
/// Returns an error if the configuration is invalid or Redis is unreachable.
#[cfg(feature = "redis")]
pub async fn init_from_env() -> Result<PlayerQueueService<RedisStore>> {
    let config = Config::from_env()?;
    let store = RedisStore::connect(&config.redis).await?;
    tracing::info!(
        key_prefix = %config.key_prefix,
        parse_policy = ?config.parse_policy,
        "Player queue storage ready"
    );
    Ok(PlayerQueueService::new(store, &config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
