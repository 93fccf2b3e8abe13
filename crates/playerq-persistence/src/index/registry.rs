//! Registry of indexed property names.

use playerq_domain::{DEFAULT_DELIMITER, GroupedIndices, IndexName};

use crate::error::Result;
use crate::keys::KeySpace;
use crate::store::{Batch, StateStore};

/// Set of every property name that has ever been indexed.
///
/// Names are only ever added. An index that empties out stays registered.
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    keys: KeySpace,
    delimiter: char,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new(KeySpace::default(), DEFAULT_DELIMITER)
    }
}

impl IndexRegistry {
    #[must_use]
    pub const fn new(keys: KeySpace, delimiter: char) -> Self {
        Self { keys, delimiter }
    }

    /// Queue registration of `field`. Registering twice is harmless.
    pub fn register(&self, batch: &mut Batch, field: &str) {
        batch.sadd(self.keys.registry(), field);
    }

    /// Registered names as stored, sorted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the registry cannot be read.
    pub async fn fields<S: StateStore + ?Sized>(&self, store: &S) -> Result<Vec<String>> {
        let mut fields = store.set_members(&self.keys.registry()).await?;
        fields.sort_unstable();
        Ok(fields)
    }

    /// Registered names split into `(namespace, value)` on the first delimiter.
    ///
    /// # Errors
    ///
    /// Returns the store error if the registry cannot be read.
    pub async fn list_fields<S: StateStore + ?Sized>(&self, store: &S) -> Result<Vec<IndexName>> {
        let fields = self.fields(store).await?;
        Ok(fields
            .iter()
            .map(|field| IndexName::parse(field, self.delimiter))
            .collect())
    }

    /// Registered values grouped under their namespace.
    ///
    /// # Errors
    ///
    /// Returns the store error if the registry cannot be read.
    pub async fn grouped<S: StateStore + ?Sized>(&self, store: &S) -> Result<GroupedIndices> {
        let mut grouped = GroupedIndices::new();
        for name in self.list_fields(store).await? {
            grouped.entry(name.namespace).or_default().push(name.value);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn registry_with(fields: &[&str]) -> (MemoryStore, IndexRegistry) {
        let store = MemoryStore::new();
        let registry = IndexRegistry::default();
        let mut batch = Batch::new();
        for field in fields {
            registry.register(&mut batch, field);
        }
        store.execute(batch).await.unwrap();
        (store, registry)
    }

    #[tokio::test]
    async fn test_register_deduplicates() {
        let (store, registry) = registry_with(&["mode:ctf", "mode:ctf", "timestamp"]).await;
        assert_eq!(registry.fields(&store).await.unwrap(), ["mode:ctf", "timestamp"]);
    }

    #[tokio::test]
    async fn test_value_keeps_later_delimiters() {
        let (store, registry) = registry_with(&["map:sunset:valley", "map:docks"]).await;

        let names = registry.list_fields(&store).await.unwrap();
        assert_eq!(
            names,
            [IndexName::new("map", "docks"), IndexName::new("map", "sunset:valley")]
        );
    }

    #[tokio::test]
    async fn test_grouped_by_namespace() {
        let (store, registry) =
            registry_with(&["map:docks", "map:sunset:valley", "mode:ctf", "timestamp"]).await;

        let grouped = registry.grouped(&store).await.unwrap();
        assert_eq!(grouped["map"], ["docks", "sunset:valley"]);
        assert_eq!(grouped["mode"], ["ctf"]);
        assert_eq!(grouped["timestamp"], [""]);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let store = MemoryStore::new();
        let registry = IndexRegistry::new(KeySpace::default(), '.');
        let mut batch = Batch::new();
        registry.register(&mut batch, "ping.us-east.1");
        store.execute(batch).await.unwrap();

        let names = registry.list_fields(&store).await.unwrap();
        assert_eq!(names, [IndexName::new("ping", "us-east.1")]);
    }
}
