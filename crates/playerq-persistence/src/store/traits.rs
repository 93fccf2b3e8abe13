//! # Backing Store Traits
//!
//! Abstract store interface the player queue is written against.
//! Implementations can be swapped for different backends (Redis, in-memory, etc.)
//!
//! Reads go straight to the store. Every write is queued into a [`Batch`]
//! and handed to [`StateStore::execute`], which must make the whole batch
//! visible at once or not at all. Before writing anything, an implementation
//! type-checks each op against the key it touches (as left by the ops before
//! it) and rejects the whole batch on a mismatch. In particular a `Set` never
//! overwrites a set or sorted set.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// BATCH
// =============================================================================

/// A single write queued in a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Overwrite a string value. Fails if the key holds another type.
    Set { key: String, value: String },

    /// Remove a key of any type. No-op if absent.
    Delete { key: String },

    /// Add or rescore a sorted-set member.
    SortedSetAdd {
        key: String,
        member: String,
        score: f64,
    },

    /// Remove a sorted-set member. No-op if absent.
    SortedSetRemove { key: String, member: String },

    /// Add `delta` to a member's score, creating it at `delta` if absent.
    SortedSetIncrement {
        key: String,
        member: String,
        delta: f64,
    },

    /// Add a set member. Duplicates are ignored.
    SetAdd { key: String, member: String },

    /// Remove `member` from every sorted set listed in the set at
    /// `reverse_key` (each name prefixed with `index_prefix`), then delete
    /// `reverse_key`.
    ///
    /// The listing is read when the batch applies, not when it is built.
    /// Listed keys that do not hold a sorted set are left alone.
    PurgeIndexed {
        reverse_key: String,
        index_prefix: String,
        member: String,
    },
}

/// Type a key holds, as seen by the batch type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    None,
    String,
    Set,
    SortedSet,
}

impl BatchOp {
    /// The key this op is checked against.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. }
            | Self::Delete { key }
            | Self::SortedSetAdd { key, .. }
            | Self::SortedSetRemove { key, .. }
            | Self::SortedSetIncrement { key, .. }
            | Self::SetAdd { key, .. } => key,
            Self::PurgeIndexed { reverse_key, .. } => reverse_key,
        }
    }

    /// Type the key must hold (or be absent) for the op to apply.
    #[must_use]
    pub const fn expected_kind(&self) -> Option<KeyKind> {
        match self {
            Self::Set { .. } => Some(KeyKind::String),
            Self::Delete { .. } => None,
            Self::SortedSetAdd { .. }
            | Self::SortedSetRemove { .. }
            | Self::SortedSetIncrement { .. } => Some(KeyKind::SortedSet),
            Self::SetAdd { .. } | Self::PurgeIndexed { .. } => Some(KeyKind::Set),
        }
    }

    /// Type the key is treated as holding once the op has applied.
    #[must_use]
    pub const fn kind_after(&self) -> KeyKind {
        match self {
            Self::Delete { .. } | Self::PurgeIndexed { .. } => KeyKind::None,
            Self::Set { .. } => KeyKind::String,
            Self::SetAdd { .. } => KeyKind::Set,
            Self::SortedSetAdd { .. }
            | Self::SortedSetRemove { .. }
            | Self::SortedSetIncrement { .. } => KeyKind::SortedSet,
        }
    }
}

/// Ordered group of writes applied with all-or-nothing visibility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(BatchOp::Set {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(BatchOp::Delete { key: key.into() })
    }

    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.push(BatchOp::SortedSetAdd {
            key: key.into(),
            member: member.into(),
            score,
        })
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(BatchOp::SortedSetRemove {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn zincr(&mut self, key: impl Into<String>, member: impl Into<String>, delta: f64) -> &mut Self {
        self.push(BatchOp::SortedSetIncrement {
            key: key.into(),
            member: member.into(),
            delta,
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(BatchOp::SetAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn purge_indexed(
        &mut self,
        reverse_key: impl Into<String>,
        index_prefix: impl Into<String>,
        member: impl Into<String>,
    ) -> &mut Self {
        self.push(BatchOp::PurgeIndexed {
            reverse_key: reverse_key.into(),
            index_prefix: index_prefix.into(),
            member: member.into(),
        })
    }

    fn push(&mut self, op: BatchOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

// =============================================================================
// STATE STORE
// =============================================================================

/// Key-value and sorted-set primitives the player queue needs.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get a string value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// List the members of a set (empty if the key is absent)
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// List a sorted set as `(member, score)` in ascending score order
    async fn sorted_set(&self, key: &str) -> Result<Vec<(String, f64)>>;

    /// Score of one sorted-set member
    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Apply a batch atomically
    async fn execute(&self, batch: Batch) -> Result<()>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        (**self).set_members(key).await
    }

    async fn sorted_set(&self, key: &str) -> Result<Vec<(String, f64)>> {
        (**self).sorted_set(key).await
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        (**self).score(key, member).await
    }

    async fn execute(&self, batch: Batch) -> Result<()> {
        (**self).execute(batch).await
    }
}
