//! # Player Queue - Domain Model
//!
//! Value types shared by the player queue state storage: the flat property
//! record a player carries into matchmaking, the score every property is
//! indexed under, and the names the index registry enumerates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// =============================================================================
// BUILT-IN KEYS
// =============================================================================

/// Built-in index every player joins, scored by write time.
pub const TIMESTAMP_INDEX: &str = "timestamp";

/// Set of every property name ever indexed.
pub const REGISTRY_SET: &str = "indices";

/// Sorted set holding one approximate member count per queue.
pub const QUEUE_COUNTERS: &str = "queues";

/// Separator between namespace and value in a registered index name.
pub const DEFAULT_DELIMITER: char = ':';

/// Current wall-clock time in epoch seconds.
///
/// Flag properties and the built-in timestamp index are both scored with it.
#[must_use]
pub fn epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

// =============================================================================
// PLAYER PROPERTIES
// =============================================================================

/// Flat mapping of property name to numeric value.
///
/// Serialized as a single JSON object and stored wholesale. Boolean-style
/// flags are not encoded as 0/1: a flag that is set carries the epoch second
/// it was written, and an unset flag is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerProperties(Map<String, Value>);

impl PlayerProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric property.
    #[must_use]
    pub fn with_score(mut self, field: impl Into<String>, score: impl Into<Number>) -> Self {
        self.0.insert(field.into(), Value::Number(score.into()));
        self
    }

    /// Add a flag property set at the current time.
    #[must_use]
    pub fn with_flag(self, field: impl Into<String>) -> Self {
        self.with_flag_at(field, epoch_seconds())
    }

    /// Add a flag property set at `epoch_secs`.
    #[must_use]
    pub fn with_flag_at(self, field: impl Into<String>, epoch_secs: i64) -> Self {
        self.with_score(field, epoch_secs)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parse a stored JSON blob. Anything but a JSON object is rejected.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `blob` is not a valid JSON object.
    pub fn from_json(blob: &str) -> serde_json::Result<Self> {
        serde_json::from_str(blob)
    }

    /// # Errors
    ///
    /// Returns the JSON error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}

/// Score a property value is indexed under.
///
/// JSON numbers score as themselves; strings score as the number they spell
/// (flags are often written as numeric epoch strings). Everything else has no
/// score and cannot be indexed.
#[must_use]
pub fn property_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

// =============================================================================
// INDEX NAMES
// =============================================================================

/// A registered index name split into its namespace and value.
///
/// The composite form is `<namespace><delimiter><value>`. Only the first
/// delimiter separates the two parts; later occurrences belong to the value.
/// A name without any delimiter is all namespace with an empty value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexName {
    pub namespace: String,
    pub value: String,
}

impl IndexName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn parse(composite: &str, delimiter: char) -> Self {
        match composite.split_once(delimiter) {
            Some((namespace, value)) => Self::new(namespace, value),
            None => Self::new(composite, ""),
        }
    }

    /// Rebuild the composite form.
    #[must_use]
    pub fn composite(&self, delimiter: char) -> String {
        if self.value.is_empty() {
            self.namespace.clone()
        } else {
            format!("{}{delimiter}{}", self.namespace, self.value)
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite(DEFAULT_DELIMITER))
    }
}

/// Registered index values grouped under their namespace.
pub type GroupedIndices = BTreeMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;
    use serde_json::json;

    #[test]
    fn test_properties_round_trip_through_blob() {
        let ping: u32 = (10u32..300).fake();
        let props = PlayerProperties::new()
            .with_score("ping.us-east", ping)
            .with_flag_at("map.sunset", 1_620_000_000);

        let blob = props.to_json().unwrap();
        let parsed = PlayerProperties::from_json(&blob).unwrap();

        assert_eq!(parsed, props);
        assert_eq!(parsed.get("ping.us-east"), Some(&json!(ping)));
    }

    #[test]
    fn test_non_object_blob_rejected() {
        assert!(PlayerProperties::from_json("[1, 2]").is_err());
        assert!(PlayerProperties::from_json("{not json").is_err());
    }

    #[test]
    fn test_flag_uses_current_time() {
        let before = epoch_seconds();
        let props = PlayerProperties::new().with_flag("mode.ctf");
        let at = props.get("mode.ctf").and_then(Value::as_i64).unwrap();
        assert!(at >= before && at <= epoch_seconds());
    }

    #[test]
    fn test_property_score() {
        assert_eq!(property_score(&json!(70)), Some(70.0));
        assert_eq!(property_score(&json!(1.5)), Some(1.5));
        assert_eq!(property_score(&json!("123456782")), Some(123_456_782.0));
        assert_eq!(property_score(&json!("fast")), None);
        assert_eq!(property_score(&json!(true)), None);
        assert_eq!(property_score(&json!(null)), None);
        assert_eq!(property_score(&json!({"nested": 1})), None);
    }

    #[test]
    fn test_index_name_splits_on_first_delimiter_only() {
        let name = IndexName::parse("map:sunset:valley", ':');
        assert_eq!(name.namespace, "map");
        assert_eq!(name.value, "sunset:valley");
        assert_eq!(name.composite(':'), "map:sunset:valley");
    }

    #[test]
    fn test_index_name_without_delimiter() {
        let name = IndexName::parse(TIMESTAMP_INDEX, ':');
        assert_eq!(name, IndexName::new("timestamp", ""));
        assert_eq!(name.to_string(), "timestamp");
    }
}
