use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Prefix used for the display form of instrument nodes
pub const INSTRUMENT_PREFIX: &str = "INST::";

/// A vertex in the relationship graph.
///
/// Instruments live in their own namespace so an account can never collide
/// with an instrument of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Account(String),
    Instrument(String),
}

impl NodeId {
    pub fn account(id: impl Into<String>) -> Self {
        NodeId::Account(id.into())
    }

    pub fn instrument(symbol: impl Into<String>) -> Self {
        NodeId::Instrument(symbol.into())
    }

    /// Raw identifier without namespace
    pub fn as_str(&self) -> &str {
        match self {
            NodeId::Account(id) | NodeId::Instrument(id) => id,
        }
    }

    pub fn is_instrument(&self) -> bool {
        matches!(self, NodeId::Instrument(_))
    }

    pub fn is_account(&self) -> bool {
        matches!(self, NodeId::Account(_))
    }

    /// Account identifier, or None for instrument nodes
    pub fn as_account(&self) -> Option<&str> {
        match self {
            NodeId::Account(id) => Some(id),
            NodeId::Instrument(_) => None,
        }
    }

    /// Returns true if the identifier is unset
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    /// Parse the display form back into a node
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(INSTRUMENT_PREFIX) {
            Some(symbol) => NodeId::Instrument(symbol.to_string()),
            None => NodeId::Account(raw.to_string()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Account(id) => write!(f, "{}", id),
            NodeId::Instrument(symbol) => write!(f, "{}{}", INSTRUMENT_PREFIX, symbol),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(NodeId::parse(&raw))
    }
}
