//! # Store Module
//!
//! Backing store contract and its implementations.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_client;
pub mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_client::RedisStore;
pub use traits::{Batch, BatchOp, KeyKind, StateStore};
