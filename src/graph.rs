//! Host graph seam: the directed multigraph the scoring engine wraps.
//!
//! The engine does not own a graph representation of its own. It consumes any
//! type implementing [`HostGraph`], which captures exactly what the overlay
//! needs: address-keyed node and edge enumeration in sorted order, prefix
//! filters, neighbor queries, a monotonic modification counter, and a
//! canonical JSON form. [`MemGraph`] is the in-memory implementation used by
//! this crate's tests and benchmarks.

use crate::address::{EdgeAddress, NodeAddress};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A directed edge. The graph is a multigraph: parallel edges between the
/// same endpoints are distinct by address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub address: EdgeAddress,
    pub src: NodeAddress,
    pub dst: NodeAddress,
}

impl Edge {
    pub fn new(address: EdgeAddress, src: NodeAddress, dst: NodeAddress) -> Self {
        Edge { address, src, dst }
    }

    pub fn is_loop(&self) -> bool {
        self.src == self.dst
    }
}

/// Which incident edges a neighbor query considers, relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges whose `dst` is the target.
    In,
    /// Edges whose `src` is the target.
    Out,
    /// Both. A self-loop is yielded once, not twice.
    Any,
}

/// Filters for edge iteration. Every field is required; the empty address
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgesOptions {
    pub address_prefix: EdgeAddress,
    pub src_prefix: NodeAddress,
    pub dst_prefix: NodeAddress,
}

/// Filters for neighbor queries. Every field is required; `Default` is
/// direction `Any` with match-all prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborsOptions {
    pub direction: Direction,
    pub node_prefix: NodeAddress,
    pub edge_prefix: EdgeAddress,
}

impl Default for NeighborsOptions {
    fn default() -> Self {
        NeighborsOptions {
            direction: Direction::Any,
            node_prefix: NodeAddress::empty(),
            edge_prefix: EdgeAddress::empty(),
        }
    }
}

/// An incident edge together with the endpoint on the far side. For a
/// self-loop the neighbor is the target itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub node: NodeAddress,
    pub edge: Edge,
}

/// What the scoring engine requires of a host graph.
///
/// Enumeration methods return materialized `Vec`s in sorted address order;
/// hosts with large graphs can afford this because the engine only enumerates
/// during construction, compilation, and serialization.
pub trait HostGraph: Sized {
    fn node_count(&self) -> usize;

    /// Node addresses in sorted order, optionally restricted to a prefix.
    fn nodes(&self, prefix: Option<&NodeAddress>) -> Vec<NodeAddress>;

    fn has_node(&self, address: &NodeAddress) -> bool;

    /// Edges in sorted address order, filtered when options are supplied.
    fn edges(&self, options: Option<&EdgesOptions>) -> Vec<Edge>;

    fn edge(&self, address: &EdgeAddress) -> Option<Edge>;

    /// Incident edges of `target` respecting direction and prefix filters, in
    /// sorted edge-address order. Fails with [`Error::UnknownNode`] if
    /// `target` is not a node of this graph.
    fn neighbors(&self, target: &NodeAddress, options: &NeighborsOptions) -> Result<Vec<Neighbor>>;

    /// Monotonic counter bumped by every successful structural mutation.
    fn modification_count(&self) -> u64;

    /// Structural equality: same node set and edge set. Modification history
    /// is irrelevant.
    fn graph_eq(&self, other: &Self) -> bool;

    /// Order-canonical JSON: two graphs that are `graph_eq` produce identical
    /// values no matter how they were built.
    fn to_canonical_json(&self) -> serde_json::Value;

    fn from_canonical_json(value: &serde_json::Value) -> Result<Self>;
}

/// In-memory host graph backed by ordered maps, so every enumeration comes
/// out in canonical (sorted) address order for free.
#[derive(Debug, Clone, Default)]
pub struct MemGraph {
    nodes: BTreeSet<NodeAddress>,
    edges: BTreeMap<EdgeAddress, Edge>,
    modification_count: u64,
}

#[derive(Serialize, Deserialize)]
struct MemGraphJson {
    edges: Vec<Edge>,
    nodes: Vec<NodeAddress>,
}

impl MemGraph {
    pub fn new() -> Self {
        MemGraph::default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Adds a node. Re-adding an existing node is a no-op and does not bump
    /// the modification counter.
    pub fn add_node(&mut self, address: NodeAddress) -> &mut Self {
        if self.nodes.insert(address) {
            self.modification_count += 1;
        }
        self
    }

    /// Adds an edge. Both endpoints must already be nodes. Re-adding an
    /// identical edge is a no-op; re-using an edge address with different
    /// endpoints is an error.
    pub fn add_edge(&mut self, edge: Edge) -> Result<&mut Self> {
        if !self.nodes.contains(&edge.src) {
            return Err(Error::UnknownNode(edge.src));
        }
        if !self.nodes.contains(&edge.dst) {
            return Err(Error::UnknownNode(edge.dst));
        }
        match self.edges.get(&edge.address) {
            Some(existing) if *existing == edge => Ok(self),
            Some(existing) => Err(Error::InvalidParameter(format!(
                "edge address {} already bound to {} -> {}",
                edge.address, existing.src, existing.dst
            ))),
            None => {
                self.edges.insert(edge.address.clone(), edge);
                self.modification_count += 1;
                Ok(self)
            }
        }
    }

    /// Removes an edge, reporting whether it existed.
    pub fn remove_edge(&mut self, address: &EdgeAddress) -> bool {
        let removed = self.edges.remove(address).is_some();
        if removed {
            self.modification_count += 1;
        }
        removed
    }
}

impl HostGraph for MemGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn nodes(&self, prefix: Option<&NodeAddress>) -> Vec<NodeAddress> {
        match prefix {
            None => self.nodes.iter().cloned().collect(),
            Some(p) => self.nodes.iter().filter(|a| a.has_prefix(p)).cloned().collect(),
        }
    }

    fn has_node(&self, address: &NodeAddress) -> bool {
        self.nodes.contains(address)
    }

    fn edges(&self, options: Option<&EdgesOptions>) -> Vec<Edge> {
        match options {
            None => self.edges.values().cloned().collect(),
            Some(o) => self
                .edges
                .values()
                .filter(|e| {
                    e.address.has_prefix(&o.address_prefix)
                        && e.src.has_prefix(&o.src_prefix)
                        && e.dst.has_prefix(&o.dst_prefix)
                })
                .cloned()
                .collect(),
        }
    }

    fn edge(&self, address: &EdgeAddress) -> Option<Edge> {
        self.edges.get(address).cloned()
    }

    fn neighbors(&self, target: &NodeAddress, options: &NeighborsOptions) -> Result<Vec<Neighbor>> {
        if !self.nodes.contains(target) {
            return Err(Error::UnknownNode(target.clone()));
        }
        let mut out = Vec::new();
        for edge in self.edges.values() {
            if !edge.address.has_prefix(&options.edge_prefix) {
                continue;
            }
            let touches_out = edge.src == *target;
            let touches_in = edge.dst == *target;
            let neighbor = match options.direction {
                Direction::Out if touches_out => &edge.dst,
                Direction::In if touches_in => &edge.src,
                // For `Any`, a self-loop matches the first arm and is
                // yielded exactly once.
                Direction::Any if touches_out => &edge.dst,
                Direction::Any if touches_in => &edge.src,
                _ => continue,
            };
            if !neighbor.has_prefix(&options.node_prefix) {
                continue;
            }
            out.push(Neighbor { node: neighbor.clone(), edge: edge.clone() });
        }
        Ok(out)
    }

    fn modification_count(&self) -> u64 {
        self.modification_count
    }

    fn graph_eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }

    fn to_canonical_json(&self) -> serde_json::Value {
        // BTree iteration order makes this canonical: insertion order never
        // reaches the output.
        serde_json::json!({
            "edges": self.edges.values().collect::<Vec<_>>(),
            "nodes": self.nodes.iter().collect::<Vec<_>>(),
        })
    }

    fn from_canonical_json(value: &serde_json::Value) -> Result<Self> {
        let parsed: MemGraphJson = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidParameter(format!("malformed graph JSON: {e}")))?;
        let mut graph = MemGraph::new();
        for node in parsed.nodes {
            graph.add_node(node);
        }
        for edge in parsed.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}
