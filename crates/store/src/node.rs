//! Node, property and version value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable node identifier
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Long(i64),
    Boolean(bool),
    Date(DateTime<Utc>),
    /// Hard reference, enforced by the store
    Reference(NodeId),
    /// Weak reference, may dangle by design of the store
    WeakReference(NodeId),
}

impl Value {
    /// Target of a reference-typed value
    pub fn as_reference(&self) -> Option<NodeId> {
        match self {
            Value::Reference(id) | Value::WeakReference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Single- or multi-valued property content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyData {
    Single(Value),
    Multiple(Vec<Value>),
}

impl PropertyData {
    pub fn is_multiple(&self) -> bool {
        matches!(self, PropertyData::Multiple(_))
    }

    /// All values, in order
    pub fn values(&self) -> Vec<&Value> {
        match self {
            PropertyData::Single(value) => vec![value],
            PropertyData::Multiple(values) => values.iter().collect(),
        }
    }
}

/// Named property attached to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub data: PropertyData,
}

impl Property {
    pub fn single(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            data: PropertyData::Single(value),
        }
    }

    pub fn multiple(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data: PropertyData::Multiple(values),
        }
    }
}

/// Point-in-time view of a node as returned by a session
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub path: String,
    /// Primary type first, then mixins and inherited supertypes
    pub node_types: Vec<String>,
    pub properties: Vec<Property>,
}

impl Node {
    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    pub fn primary_type(&self) -> &str {
        self.node_types.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_node_type(&self, node_type: &str) -> bool {
        self.node_types.iter().any(|t| t == node_type)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Date of the last-modified property, `None` if absent
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self.property(crate::props::LAST_MODIFIED)?.data {
            PropertyData::Single(ref value) => value.as_date(),
            PropertyData::Multiple(_) => None,
        }
    }
}

/// One snapshot inside a version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: NodeId,
    pub name: String,
    pub created: DateTime<Utc>,
    /// Identifier of the source object this snapshot was frozen from
    pub frozen_uuid: Option<NodeId>,
}

impl Version {
    pub fn is_root(&self) -> bool {
        self.name == crate::ROOT_VERSION
    }
}
