//! Store key layout.
//!
//! ```text
//! {prefix}{player_id}            → properties JSON blob
//! {prefix}{field}                → sorted set player_id → score
//! {prefix}timestamp              → sorted set player_id → write time
//! {prefix}indices                → set of every indexed field name
//! {prefix}queues                 → sorted set queue_id → member count
//! {prefix}indexed:{player_id}    → set of fields the player is indexed under
//! ```
//!
//! The empty prefix is the legacy layout shared with older queue services.

use playerq_domain::{QUEUE_COUNTERS, REGISTRY_SET, TIMESTAMP_INDEX};

const INDEXED_PREFIX: &str = "indexed:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn record(&self, player_id: &str) -> String {
        format!("{}{player_id}", self.prefix)
    }

    /// Sorted set for one property field.
    #[must_use]
    pub fn index(&self, field: &str) -> String {
        format!("{}{field}", self.prefix)
    }

    #[must_use]
    pub fn timestamp(&self) -> String {
        self.index(TIMESTAMP_INDEX)
    }

    #[must_use]
    pub fn registry(&self) -> String {
        format!("{}{REGISTRY_SET}", self.prefix)
    }

    #[must_use]
    pub fn queues(&self) -> String {
        format!("{}{QUEUE_COUNTERS}", self.prefix)
    }

    /// Whether a player stored as `player_id` would land on a built-in key.
    #[must_use]
    pub fn is_reserved(player_id: &str) -> bool {
        matches!(player_id, TIMESTAMP_INDEX | REGISTRY_SET | QUEUE_COUNTERS)
            || player_id.starts_with(INDEXED_PREFIX)
    }

    /// Reverse index: fields `player_id` currently appears under.
    #[must_use]
    pub fn indexed_fields(&self, player_id: &str) -> String {
        format!("{}{INDEXED_PREFIX}{player_id}", self.prefix)
    }
}
