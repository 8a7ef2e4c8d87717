//! Node and edge addresses.
//!
//! Addresses are opaque identifiers: ordered sequences of string segments.
//! Ordering is lexicographic over segments, so it is total and independent of
//! how a graph was built. Prefix matching is segment-wise: `["user"]` is a
//! prefix of `["user", "alice"]`, but `"us"` is not a prefix of anything
//! except itself. The empty address is a prefix of every address.
//!
//! Node and edge addresses live in separate namespaces and are separate
//! types; mixing them up is a compile error, not a runtime surprise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a node in the host graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(Vec<String>);

/// Address of an edge in the host graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeAddress(Vec<String>);

impl NodeAddress {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NodeAddress(segments.into_iter().map(Into::into).collect())
    }

    /// The empty address: a prefix of every node address.
    pub fn empty() -> Self {
        NodeAddress(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix`'s segments are a leading run of this address's.
    pub fn has_prefix(&self, prefix: &NodeAddress) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl EdgeAddress {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EdgeAddress(segments.into_iter().map(Into::into).collect())
    }

    /// The empty address: a prefix of every edge address.
    pub fn empty() -> Self {
        EdgeAddress(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix`'s segments are a leading run of this address's.
    pub fn has_prefix(&self, prefix: &EdgeAddress) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl fmt::Display for EdgeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}
