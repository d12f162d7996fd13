//! In-memory graph model.
//!
//! Nodes and edges carry dynamic attribute bags: a map from string key to a
//! small tagged value union. The key set is open, since JSON entity sources
//! bring arbitrary fields.

mod graph;

pub use graph::{EdgeRef, Graph, MergeOutcome, NodeRef};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known attribute keys.
///
/// Input-facing names follow the upstream extracts; `componente` is also what
/// the dashboard read side queries on the backend.
pub mod keys {
    pub const NAME: &str = "name";
    pub const TIPO: &str = "tipo";
    pub const ENTITY_TYPE: &str = "entity_type";
    pub const COMPONENT: &str = "componente";
    pub const DEGREE: &str = "grado";
    pub const COLOR: &str = "color";
    pub const SHAPE: &str = "shape";
    pub const SYNTHESIZED: &str = "creado_desde_enlace";
    pub const LINK_QUALITY: &str = "calidad_vinculo";
    pub const DEGREE_CENTRALITY: &str = "degree_centrality";
    pub const BETWEENNESS_CENTRALITY: &str = "betweenness_centrality";
    pub const CLOSENESS_CENTRALITY: &str = "closeness_centrality";
}

/// Attribute bag attached to a node or an edge.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// True for null and for empty text, the values that count as "unset".
    pub fn is_blank(&self) -> bool {
        match self {
            AttrValue::Null => true,
            AttrValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// True for nested records and lists.
    pub fn is_composite(&self) -> bool {
        matches!(self, AttrValue::List(_) | AttrValue::Map(_))
    }

    /// Compact JSON text encoding.
    pub fn to_json(&self) -> String {
        serde_json::Value::from(self).to_string()
    }

    /// Flat textual rendering used for delimited files: null becomes an empty
    /// field, composites become compact JSON.
    pub fn to_field(&self) -> String {
        match self {
            AttrValue::Null => String::new(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Text(s) => s.clone(),
            AttrValue::List(_) | AttrValue::Map(_) => self.to_json(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => AttrValue::Text(s),
            serde_json::Value::Array(items) => {
                AttrValue::List(items.into_iter().map(AttrValue::from).collect())
            }
            serde_json::Value::Object(map) => AttrValue::Map(
                map.into_iter().map(|(k, v)| (k, AttrValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&AttrValue> for serde_json::Value {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::Null => serde_json::Value::Null,
            AttrValue::Bool(b) => serde_json::Value::Bool(*b),
            AttrValue::Int(i) => serde_json::Value::from(*i),
            AttrValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttrValue::Text(s) => serde_json::Value::String(s.clone()),
            AttrValue::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            AttrValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Node type, derived from the `tipo` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Case,
    Person,
    Entity,
}

impl NodeKind {
    /// Value written to the `tipo` attribute for nodes created by the pipeline.
    pub fn tipo(&self) -> &'static str {
        match self {
            NodeKind::Case => "nunc",
            NodeKind::Person => "persona",
            NodeKind::Entity => "entidad",
        }
    }

    /// Parse a `tipo` value (case-insensitive). Unknown values are entities.
    pub fn from_tipo(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "nunc" | "case" => Self::Case,
            "persona" | "person" => Self::Person,
            _ => Self::Entity,
        }
    }

    /// Kind of a node given its attributes.
    pub fn of(attrs: &Attributes) -> Self {
        attrs
            .get(keys::TIPO)
            .and_then(AttrValue::as_str)
            .map(Self::from_tipo)
            .unwrap_or(Self::Entity)
    }
}

/// Build an attribute bag from `(key, value)` pairs.
pub fn attrs<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_conversion_keeps_structure() {
        let value: serde_json::Value =
            serde_json::json!({"a": 1, "b": [true, "x"], "c": null, "d": 1.5});
        let attr = AttrValue::from(value);
        let AttrValue::Map(map) = &attr else {
            panic!("expected map");
        };
        assert_eq!(map["a"], AttrValue::Int(1));
        assert_eq!(map["c"], AttrValue::Null);
        assert_eq!(map["d"], AttrValue::Float(1.5));
        assert_eq!(attr.to_json(), r#"{"a":1,"b":[true,"x"],"c":null,"d":1.5}"#);
    }

    #[test]
    fn test_to_field() {
        assert_eq!(AttrValue::Null.to_field(), "");
        assert_eq!(AttrValue::from("abc").to_field(), "abc");
        assert_eq!(AttrValue::Int(7).to_field(), "7");
        assert_eq!(
            AttrValue::List(vec![AttrValue::Int(1), AttrValue::Int(2)]).to_field(),
            "[1,2]"
        );
    }

    #[test]
    fn test_node_kind_from_tipo() {
        assert_eq!(NodeKind::from_tipo("nunc"), NodeKind::Case);
        assert_eq!(NodeKind::from_tipo("Person"), NodeKind::Person);
        assert_eq!(NodeKind::from_tipo("empresa"), NodeKind::Entity);
        assert_eq!(NodeKind::of(&Attributes::new()), NodeKind::Entity);
    }
}
