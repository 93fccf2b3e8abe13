//! # In-Memory Store
//!
//! Process-local [`StateStore`] with the same batch semantics as
//! [`RedisStore`](super::RedisStore): empty collections disappear, removing a
//! missing member is a no-op, and a batch that would touch any key as the
//! wrong type is rejected before anything is written.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{Batch, BatchOp, KeyKind, StateStore};
use crate::error::{PersistenceError, Result};

#[derive(Debug, Clone)]
enum Entry {
    String(String),
    Set(BTreeSet<String>),
    SortedSet(HashMap<String, f64>),
}

impl Entry {
    const fn kind(&self) -> KeyKind {
        match self {
            Self::String(_) => KeyKind::String,
            Self::Set(_) => KeyKind::Set,
            Self::SortedSet(_) => KeyKind::SortedSet,
        }
    }
}

type Keyspace = HashMap<String, Entry>;

/// In-memory state store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Keyspace>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `execute` fail as a lost connection would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> bool {
        self.data.lock().await.contains_key(key)
    }

    pub async fn is_empty(&self) -> bool {
        self.data.lock().await.is_empty()
    }
}

fn wrong_type(key: &str) -> PersistenceError {
    PersistenceError::Store(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {key}"
    ))
}

/// Type-check every op against the pre-batch state plus the effect of the
/// ops before it.
fn check(data: &Keyspace, batch: &Batch) -> Result<()> {
    let mut kinds: HashMap<&str, KeyKind> = HashMap::new();
    for op in batch.ops() {
        let key = op.key();
        let current = *kinds
            .entry(key)
            .or_insert_with(|| data.get(key).map_or(KeyKind::None, Entry::kind));
        if let Some(expected) = op.expected_kind() {
            if current != KeyKind::None && current != expected {
                return Err(wrong_type(key));
            }
        }
        kinds.insert(key, op.kind_after());
    }
    Ok(())
}

fn zrem(data: &mut Keyspace, key: &str, member: &str) {
    if let Some(Entry::SortedSet(members)) = data.get_mut(key) {
        members.remove(member);
        if members.is_empty() {
            data.remove(key);
        }
    }
}

fn apply(data: &mut Keyspace, op: BatchOp) {
    match op {
        BatchOp::Set { key, value } => {
            data.insert(key, Entry::String(value));
        }
        BatchOp::Delete { key } => {
            data.remove(&key);
        }
        BatchOp::SortedSetAdd { key, member, score } => {
            if let Entry::SortedSet(members) = data
                .entry(key)
                .or_insert_with(|| Entry::SortedSet(HashMap::new()))
            {
                members.insert(member, score);
            }
        }
        BatchOp::SortedSetRemove { key, member } => zrem(data, &key, &member),
        BatchOp::SortedSetIncrement { key, member, delta } => {
            if let Entry::SortedSet(members) = data
                .entry(key)
                .or_insert_with(|| Entry::SortedSet(HashMap::new()))
            {
                *members.entry(member).or_insert(0.0) += delta;
            }
        }
        BatchOp::SetAdd { key, member } => {
            if let Entry::Set(members) = data
                .entry(key)
                .or_insert_with(|| Entry::Set(BTreeSet::new()))
            {
                members.insert(member);
            }
        }
        BatchOp::PurgeIndexed {
            reverse_key,
            index_prefix,
            member,
        } => {
            if let Some(Entry::Set(fields)) = data.remove(&reverse_key) {
                for field in fields {
                    zrem(data, &format!("{index_prefix}{field}"), &member);
                }
            }
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sorted_set(&self, key: &str) -> Result<Vec<(String, f64)>> {
        match self.data.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::SortedSet(members)) => {
                let mut ranked: Vec<(String, f64)> = members
                    .iter()
                    .map(|(member, score)| (member.clone(), *score))
                    .collect();
                ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(ranked)
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        match self.data.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::SortedSet(members)) => Ok(members.get(member).copied()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn execute(&self, batch: Batch) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Store("connection reset by peer".to_string()));
        }

        let mut data = self.data.lock().await;
        check(&data, &batch)?;
        for op in batch {
            apply(&mut data, op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_sorted_set_ordering_and_removal() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.zadd("ping", "b", 90.0).zadd("ping", "a", 40.0).zadd("ping", "c", 90.0);
        assert_ok!(store.execute(batch).await);

        let ranked = store.sorted_set("ping").await.unwrap();
        let members: Vec<&str> = ranked.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(members, ["a", "b", "c"]);

        let mut batch = Batch::new();
        batch.zrem("ping", "a").zrem("ping", "b").zrem("ping", "c").zrem("ping", "missing");
        assert_ok!(store.execute(batch).await);
        assert!(!store.exists("ping").await);
    }

    #[tokio::test]
    async fn test_increment_creates_member() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.zincr("queues", "q1", 1.0).zincr("queues", "q1", 1.0);
        assert_ok!(store.execute(batch).await);
        assert_eq!(store.score("queues", "q1").await.unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn test_wrong_type_rejects_whole_batch() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.set("p1", "{}");
        assert_ok!(store.execute(batch).await);

        let mut batch = Batch::new();
        batch.set("p2", "{}").zadd("p1", "p2", 1.0);
        assert_err!(store.execute(batch).await);

        assert!(!store.exists("p2").await);
        assert_eq!(store.get("p1").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_set_refuses_to_overwrite_index() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.zadd("ping.us-east", "p1", 70.0);
        assert_ok!(store.execute(batch).await);

        let mut batch = Batch::new();
        batch.set("ping.us-east", "{}");
        assert_err!(store.execute(batch).await);
        assert_eq!(store.score("ping.us-east", "p1").await.unwrap(), Some(70.0));
    }

    #[tokio::test]
    async fn test_type_check_follows_earlier_ops() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.zadd("k", "p1", 1.0);
        assert_ok!(store.execute(batch).await);

        // deleted earlier in the same batch, so the key may change type
        let mut batch = Batch::new();
        batch.delete("k").set("k", "{}");
        assert_ok!(store.execute(batch).await);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("{}"));

        let mut batch = Batch::new();
        batch.sadd("fresh", "a").zadd("fresh", "a", 1.0);
        assert_err!(store.execute(batch).await);
        assert!(!store.exists("fresh").await);
    }

    #[tokio::test]
    async fn test_purge_reads_reverse_index_at_apply_time() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch
            .zadd("ping", "p1", 70.0)
            .zadd("ping", "p2", 80.0)
            .zadd("map", "p1", 5.0)
            .sadd("indexed:p1", "ping")
            .sadd("indexed:p1", "map");
        assert_ok!(store.execute(batch).await);

        let mut batch = Batch::new();
        batch.purge_indexed("indexed:p1", "", "p1");
        assert_ok!(store.execute(batch).await);

        assert_eq!(store.score("ping", "p1").await.unwrap(), None);
        assert_eq!(store.score("ping", "p2").await.unwrap(), Some(80.0));
        assert!(!store.exists("map").await);
        assert!(!store.exists("indexed:p1").await);
    }

    #[tokio::test]
    async fn test_purge_skips_listed_keys_that_are_not_indexes() {
        let store = MemoryStore::new();
        let mut batch = Batch::new();
        batch.set("region", "eu").sadd("indexed:p1", "region");
        assert_ok!(store.execute(batch).await);

        let mut batch = Batch::new();
        batch.purge_indexed("indexed:p1", "", "p1");
        assert_ok!(store.execute(batch).await);
        assert_eq!(store.get("region").await.unwrap().as_deref(), Some("eu"));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let mut batch = Batch::new();
        batch.set("p1", "{}");
        let err = store.execute(batch).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Store(_)));
        assert!(store.is_empty().await);
    }
}
