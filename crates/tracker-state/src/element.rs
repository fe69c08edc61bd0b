//! Presence elements.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracker_core::Dot;

/// Identifier of the process owning a presence.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque presence metadata.
pub type Meta = serde_json::Value;

/// Metadata used when a join supplies none.
pub fn empty_meta() -> Meta {
    Meta::Object(serde_json::Map::new())
}

/// Element content without its dot, as shipped in payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    pub owner: OwnerId,
    pub topic: String,
    pub key: String,
    pub meta: Meta,
}

/// Dot-keyed element map exchanged between replicas.
pub type ElementMap = BTreeMap<Dot, ElementData>;

/// One present entry: content plus the dot of the add that created it.
///
/// Content never participates in merging; only the dot does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub owner: OwnerId,
    pub topic: String,
    pub key: String,
    pub meta: Meta,
    pub dot: Dot,
}

impl Element {
    pub fn from_data(dot: Dot, data: ElementData) -> Self {
        Self {
            owner: data.owner,
            topic: data.topic,
            key: data.key,
            meta: data.meta,
            dot,
        }
    }

    /// Split into the payload representation.
    pub fn into_data(self) -> (Dot, ElementData) {
        (
            self.dot,
            ElementData {
                owner: self.owner,
                topic: self.topic,
                key: self.key,
                meta: self.meta,
            },
        )
    }

    /// Replica that minted this element's dot.
    pub fn replica(&self) -> &str {
        &self.dot.replica
    }
}
