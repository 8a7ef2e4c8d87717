//! Canonical serialization of scored graphs.
//!
//! External form: a JSON array `[header, payload]`. The header is a fixed
//! `{type, version}` pair checked on load; the payload is a compact,
//! order-canonical encoding: scores in sorted node-address order, weight
//! arrays in sorted edge-address order, plus the host graph's canonical JSON.
//! Because every array is keyed by the canonical order and every object's
//! keys are sorted, two equal overlays serialize to byte-identical strings no
//! matter how their graphs were built.

use crate::graph::HostGraph;
use crate::scored::ScoredGraph;
use crate::weights::EdgeWeight;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const COMPAT_TYPE: &str = "flowrank/scored-graph";
pub const COMPAT_VERSION: &str = "0.2.0";

/// The versioned envelope header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatHeader {
    #[serde(rename = "type")]
    pub type_: String,
    pub version: String,
}

impl CompatHeader {
    fn current() -> Self {
        CompatHeader { type_: COMPAT_TYPE.to_string(), version: COMPAT_VERSION.to_string() }
    }

    fn validate(&self) -> Result<()> {
        if self.type_ != COMPAT_TYPE || self.version != COMPAT_VERSION {
            return Err(Error::CompatMismatch {
                expected: format!("{COMPAT_TYPE}@{COMPAT_VERSION}"),
                found: format!("{}@{}", self.type_, self.version),
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    fro_weights: Vec<f64>,
    graph_json: serde_json::Value,
    scores: Vec<f64>,
    synthetic_loop_weight: f64,
    to_weights: Vec<f64>,
}

impl<G: HostGraph> ScoredGraph<G> {
    /// Serializes to the canonical JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let nodes = self.nodes(None)?;
        let edges = self.edges(None)?;
        let payload = Payload {
            fro_weights: edges.iter().map(|we| we.weight.fro_weight).collect(),
            graph_json: self.graph().to_canonical_json(),
            scores: nodes.iter().map(|sn| sn.score).collect(),
            synthetic_loop_weight: self.synthetic_loop_weight()?,
            to_weights: edges.iter().map(|we| we.weight.to_weight).collect(),
        };
        serde_json::to_value((CompatHeader::current(), payload))
            .map_err(|e| Error::Internal(format!("serialization failed: {e}")))
    }

    /// [`ScoredGraph::to_json`] rendered as a compact string. Equal overlays
    /// produce byte-identical output.
    pub fn to_json_string(&self) -> Result<String> {
        let value = self.to_json()?;
        serde_json::to_string(&value)
            .map_err(|e| Error::Internal(format!("serialization failed: {e}")))
    }

    /// Rebuilds an overlay from its canonical JSON value, validating the
    /// header and every overlay invariant.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let (header, payload): (CompatHeader, Payload) = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidParameter(format!("malformed scored graph JSON: {e}")))?;
        header.validate()?;

        let graph = G::from_canonical_json(&payload.graph_json)?;
        let nodes = graph.nodes(None);
        if payload.scores.len() != nodes.len() {
            return Err(Error::InvalidParameter(format!(
                "expected {} scores, found {}",
                nodes.len(),
                payload.scores.len()
            )));
        }
        let edges = graph.edges(None);
        if payload.to_weights.len() != edges.len() || payload.fro_weights.len() != edges.len() {
            return Err(Error::InvalidParameter(format!(
                "expected {} weight pairs, found {}/{}",
                edges.len(),
                payload.to_weights.len(),
                payload.fro_weights.len()
            )));
        }

        let scores: BTreeMap<_, _> = nodes.into_iter().zip(payload.scores).collect();
        let edge_weights: BTreeMap<_, _> = edges
            .into_iter()
            .zip(payload.to_weights.iter().zip(&payload.fro_weights))
            .map(|(edge, (&to, &fro))| (edge.address, EdgeWeight::new(to, fro)))
            .collect();
        ScoredGraph::from_parts(graph, edge_weights, scores, payload.synthetic_loop_weight)
    }

    /// [`ScoredGraph::from_json`] from a string.
    pub fn from_json_string(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidParameter(format!("malformed scored graph JSON: {e}")))?;
        Self::from_json(&value)
    }
}
