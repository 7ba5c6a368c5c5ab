//! Component identifiers and instance key derivation.
//!
//! An instance key is the component id followed by the JSON rendering of the
//! ordered init values, e.g. `Feed["latest",20]`. Component ids may not contain
//! `[`, so the first `[` always marks where the values begin and two distinct
//! `(component, values)` pairs can never render to the same key.
//!
//! Object members are rendered in sorted key order at every depth, whatever
//! map representation `serde_json` was built with, so equal objects always
//! derive equal keys.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::InitError;

/// Unique identifier of a bound component type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    /// Validate and wrap a component id.
    pub fn new(id: impl Into<String>) -> Result<Self, InitError> {
        let id = id.into();
        if id.is_empty() {
            return Err(InitError::configuration("component id must not be empty"));
        }
        if id.contains('[') {
            return Err(InitError::configuration(format!(
                "component id '{id}' must not contain '['"
            )));
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = InitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}

/// Identity of a component instance: its type plus its init values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceKey(String);

impl InstanceKey {
    /// Derive the key for `component_id` with the given ordered init values.
    ///
    /// Order-sensitive, and equal values always derive equal keys.
    pub fn derive(component_id: &ComponentId, init_values: &[Value]) -> Self {
        let rendered = Value::Array(init_values.iter().map(canonical).collect()).to_string();
        Self(format!("{component_id}{rendered}"))
    }

    /// Wrap an already-derived key, e.g. one read back from persisted state.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The component id portion of the key.
    pub fn component_id(&self) -> &str {
        self.0.split_once('[').map_or(self.0.as_str(), |(id, _)| id)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(members) => {
            let mut sorted: Vec<_> = members.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(name, member)| (name.clone(), canonical(member)))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

impl Borrow<str> for InstanceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ComponentId {
        ComponentId::new(s).unwrap()
    }

    #[test]
    fn empty_values_render_empty_array() {
        let key = InstanceKey::derive(&id("SimpleInitTestComponent"), &[]);
        assert_eq!(key.as_str(), "SimpleInitTestComponent[]");
    }

    #[test]
    fn string_values_are_json_quoted() {
        let key = InstanceKey::derive(&id("SimpleInitTestComponent"), &[json!("foo")]);
        assert_eq!(key.as_str(), r#"SimpleInitTestComponent["foo"]"#);
    }

    #[test]
    fn order_matters() {
        let a = InstanceKey::derive(&id("Feed"), &[json!(1), json!(2)]);
        let b = InstanceKey::derive(&id("Feed"), &[json!(2), json!(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn number_and_string_do_not_collide() {
        let a = InstanceKey::derive(&id("Feed"), &[json!(1)]);
        let b = InstanceKey::derive(&id("Feed"), &[json!("1")]);
        assert_ne!(a, b);
    }

    #[test]
    fn object_values_derive_by_value() {
        let a = InstanceKey::derive(&id("Feed"), &[json!({"a": 1, "b": 2})]);
        let b = InstanceKey::derive(&id("Feed"), &[json!({"b": 2, "a": 1})]);
        assert_eq!(a, b);
    }

    #[test]
    fn nested_objects_render_in_sorted_order() {
        let mut inner = serde_json::Map::new();
        inner.insert("z".into(), json!(1));
        inner.insert("m".into(), json!([{"y": true, "x": null}]));
        let mut outer = serde_json::Map::new();
        outer.insert("b".into(), Value::Object(inner));
        outer.insert("a".into(), json!("first"));

        let key = InstanceKey::derive(&id("Feed"), &[Value::Object(outer)]);
        assert_eq!(
            key.as_str(),
            r#"Feed[{"a":"first","b":{"m":[{"x":null,"y":true}],"z":1}}]"#
        );
    }

    #[test]
    fn component_id_rejects_bracket_and_empty() {
        assert!(ComponentId::new("").is_err());
        assert!(ComponentId::new("Feed[").is_err());
    }

    #[test]
    fn key_exposes_component_id() {
        let key = InstanceKey::derive(&id("Feed"), &[json!("x")]);
        assert_eq!(key.component_id(), "Feed");
    }
}
