//! # Index Module
//!
//! Secondary indexes over player properties.

pub mod indexer;
pub mod registry;

pub use indexer::{Flattened, PropertyIndexer};
pub use registry::IndexRegistry;
