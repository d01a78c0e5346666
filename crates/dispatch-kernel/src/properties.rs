//! The properties bag propagated to every build request.

use std::collections::BTreeMap;

/// A single property value together with a free-text tag describing where
/// it came from (e.g. `"scheduler"`, `"user"`, `"forced build"`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PropertyValue {
    pub value: serde_json::Value,
    pub source: String,
}

/// A mapping of property name to [`PropertyValue`], copied by value into
/// every [`BuildRequest`](crate::request::BuildRequest) created from a
/// [`BuildSet`](crate). Properties are logically immutable once a
/// `BuildSet` is constructed: mutating the bag a caller holds after
/// `NewBuildSet` has no effect on requests already created.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    /// An empty properties bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, tagging it with the given source.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>, source: impl Into<String>) {
        self.values.insert(
            name.into(),
            PropertyValue {
                value: value.into(),
                source: source.into(),
            },
        );
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Number of properties in the bag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take an independent value-copy snapshot of the bag. Because
    /// `Properties` has no interior mutability, `clone()` already produces
    /// the "snapshot, subsequent mutations do not propagate" semantics the
    /// data model requires — this method exists to make that intent
    /// explicit at call sites that create a [`BuildRequest`].
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Iterate over `(name, value)` pairs in deterministic name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
