//! Scored-graph overlay.
//!
//! [`ScoredGraph`] wraps a host graph and maintains, as derived state, a
//! weight pair per edge and a score per node. Scores form a probability
//! distribution at all times: uniform after construction, and the stationary
//! distribution of the induced Markov chain after [`ScoredGraph::run`].
//!
//! The overlay snapshots the host graph's modification counter at
//! construction; every public operation re-checks it and fails with
//! [`Error::GraphModified`](crate::Error::GraphModified) if the graph changed
//! underneath. That check is the sole defense against use-after-mutate, so
//! nothing here caches across it.

use crate::address::{EdgeAddress, NodeAddress};
use crate::compile::compile;
use crate::graph::{Edge, EdgesOptions, HostGraph, NeighborsOptions};
use crate::markov::{indicator_distribution, uniform_distribution};
use crate::solver::{find_stationary_distribution, SolverOptions};
use crate::weights::EdgeWeight;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default weight of the synthetic self-loop attached to every node. Keeps
/// every total out-weight strictly positive so the induced chain is
/// well-defined, while barely perturbing well-connected nodes.
pub const DEFAULT_SYNTHETIC_LOOP_WEIGHT: f64 = 1e-3;

/// A node together with its current score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub address: NodeAddress,
    pub score: f64,
}

/// An edge together with its evaluated weight pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub edge: Edge,
    pub weight: EdgeWeight,
}

/// One entry of a neighbor query: the endpoint on the far side, the incident
/// edge, and the portion of the target's score attributable to this edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNeighbor {
    pub node: ScoredNode,
    pub edge: WeightedEdge,
    pub score_contribution: f64,
}

/// Teleport seed semantics for [`ScoredGraph::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    /// No teleport: alpha 0, uniform seed.
    NoSeed,
    /// Teleport to the uniform distribution with probability `alpha`.
    Uniform { alpha: f64 },
    /// Teleport to a uniform distribution over `nodes`. An empty selection,
    /// or one covering every node, means uniform over all nodes. Addresses
    /// not present in the graph are rejected with
    /// [`Error::UnknownNode`](crate::Error::UnknownNode).
    Selected { alpha: f64, nodes: Vec<NodeAddress> },
    /// Reserved: teleport to an arbitrary score map. Always fails with
    /// [`Error::NotImplemented`](crate::Error::NotImplemented).
    Specified { alpha: f64, scores: BTreeMap<NodeAddress, f64> },
}

/// Outcome of a [`ScoredGraph::run`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The last observed delta. At or below the convergence threshold iff the
    /// solve converged before the iteration cap.
    pub convergence_delta: f64,
}

/// A host graph overlaid with edge weights and node scores.
#[derive(Debug, Clone)]
pub struct ScoredGraph<G: HostGraph> {
    graph: G,
    edge_weights: BTreeMap<EdgeAddress, EdgeWeight>,
    scores: BTreeMap<NodeAddress, f64>,
    total_out_weight: BTreeMap<NodeAddress, f64>,
    synthetic_loop_weight: f64,
    modification_count: u64,
}

impl<G: HostGraph> ScoredGraph<G> {
    /// Builds an overlay over `graph`, applying `evaluator` exactly once per
    /// edge and initializing scores to the uniform distribution.
    ///
    /// Fails on an empty graph, a non-positive or non-finite loop weight, or
    /// an evaluator result that is negative, NaN, or infinite.
    pub fn new(
        graph: G,
        evaluator: impl Fn(&Edge) -> EdgeWeight,
        synthetic_loop_weight: f64,
    ) -> Result<Self> {
        let mut edge_weights = BTreeMap::new();
        for edge in graph.edges(None) {
            let weight = evaluator(&edge);
            weight.validate(&edge.address)?;
            edge_weights.insert(edge.address, weight);
        }
        let n = graph.node_count();
        if n == 0 {
            return Err(Error::EmptyGraph);
        }
        let uniform = 1.0 / n as f64;
        let scores = graph.nodes(None).into_iter().map(|a| (a, uniform)).collect();
        Self::from_parts(graph, edge_weights, scores, synthetic_loop_weight)
    }

    /// [`ScoredGraph::new`] with [`DEFAULT_SYNTHETIC_LOOP_WEIGHT`].
    pub fn with_default_loop_weight(
        graph: G,
        evaluator: impl Fn(&Edge) -> EdgeWeight,
    ) -> Result<Self> {
        Self::new(graph, evaluator, DEFAULT_SYNTHETIC_LOOP_WEIGHT)
    }

    /// Assembles an overlay from already-materialized state; shared by
    /// construction and deserialization. Re-validates every invariant: the
    /// weight map's keys must be exactly the graph's edges, the score map's
    /// keys exactly its nodes.
    pub(crate) fn from_parts(
        graph: G,
        edge_weights: BTreeMap<EdgeAddress, EdgeWeight>,
        scores: BTreeMap<NodeAddress, f64>,
        synthetic_loop_weight: f64,
    ) -> Result<Self> {
        if !synthetic_loop_weight.is_finite() || synthetic_loop_weight <= 0.0 {
            return Err(Error::InvalidLoopWeight(synthetic_loop_weight));
        }
        let nodes = graph.nodes(None);
        if nodes.is_empty() {
            return Err(Error::EmptyGraph);
        }
        let node_set: BTreeSet<&NodeAddress> = nodes.iter().collect();
        if scores.len() != nodes.len() || !scores.keys().all(|a| node_set.contains(a)) {
            return Err(Error::InvalidParameter(
                "score map keys do not match the graph's node set".to_string(),
            ));
        }
        let edges = graph.edges(None);
        if edge_weights.len() != edges.len()
            || !edges.iter().all(|e| edge_weights.contains_key(&e.address))
        {
            return Err(Error::InvalidParameter(
                "weight map keys do not match the graph's edge set".to_string(),
            ));
        }

        let mut total_out_weight: BTreeMap<NodeAddress, f64> =
            nodes.into_iter().map(|a| (a, synthetic_loop_weight)).collect();
        for edge in &edges {
            let weight = &edge_weights[&edge.address];
            weight.validate(&edge.address)?;
            *total_out_weight
                .get_mut(&edge.src)
                .ok_or_else(|| Error::UnknownNode(edge.src.clone()))? += weight.to_weight;
            *total_out_weight
                .get_mut(&edge.dst)
                .ok_or_else(|| Error::UnknownNode(edge.dst.clone()))? += weight.fro_weight;
        }

        let modification_count = graph.modification_count();
        Ok(ScoredGraph {
            graph,
            edge_weights,
            scores,
            total_out_weight,
            synthetic_loop_weight,
            modification_count,
        })
    }

    /// Raw access to the host graph. Reading is always safe; mutating through
    /// [`ScoredGraph::graph_mut`] invalidates the overlay, and every
    /// subsequent operation fails with `GraphModified`.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    fn check_unmodified(&self) -> Result<()> {
        let found = self.graph.modification_count();
        if found != self.modification_count {
            return Err(Error::GraphModified { expected: self.modification_count, found });
        }
        Ok(())
    }

    fn score_of(&self, address: &NodeAddress) -> Result<f64> {
        self.scores
            .get(address)
            .copied()
            .ok_or_else(|| Error::Internal(format!("no score recorded for node {address}")))
    }

    fn weight_of(&self, address: &EdgeAddress) -> Result<EdgeWeight> {
        self.edge_weights
            .get(address)
            .copied()
            .ok_or_else(|| Error::Internal(format!("no weight recorded for edge {address}")))
    }

    /// The configured synthetic self-loop weight.
    pub fn synthetic_loop_weight(&self) -> Result<f64> {
        self.check_unmodified()?;
        Ok(self.synthetic_loop_weight)
    }

    /// Every node (optionally restricted to an address prefix) with its
    /// score, in canonical order.
    pub fn nodes(&self, prefix: Option<&NodeAddress>) -> Result<Vec<ScoredNode>> {
        self.check_unmodified()?;
        self.graph
            .nodes(prefix)
            .into_iter()
            .map(|address| {
                let score = self.score_of(&address)?;
                Ok(ScoredNode { address, score })
            })
            .collect()
    }

    /// One node with its score, or `None` if absent.
    pub fn node(&self, address: &NodeAddress) -> Result<Option<ScoredNode>> {
        self.check_unmodified()?;
        if !self.graph.has_node(address) {
            return Ok(None);
        }
        let score = self.score_of(address)?;
        Ok(Some(ScoredNode { address: address.clone(), score }))
    }

    /// Every edge (filtered when options are supplied) with its weight, in
    /// canonical order.
    pub fn edges(&self, options: Option<&EdgesOptions>) -> Result<Vec<WeightedEdge>> {
        self.check_unmodified()?;
        self.graph
            .edges(options)
            .into_iter()
            .map(|edge| {
                let weight = self.weight_of(&edge.address)?;
                Ok(WeightedEdge { edge, weight })
            })
            .collect()
    }

    /// One edge with its weight, or `None` if absent.
    pub fn edge(&self, address: &EdgeAddress) -> Result<Option<WeightedEdge>> {
        self.check_unmodified()?;
        match self.graph.edge(address) {
            None => Ok(None),
            Some(edge) => {
                let weight = self.weight_of(&edge.address)?;
                Ok(Some(WeightedEdge { edge, weight }))
            }
        }
    }

    /// The cached total out-weight of `address`: synthetic loop weight plus
    /// the `to_weight` of every out-edge plus the `fro_weight` of every
    /// in-edge. Equals the raw weight of the node's column in the induced
    /// chain.
    pub fn total_out_weight(&self, address: &NodeAddress) -> Result<f64> {
        self.check_unmodified()?;
        self.total_out_weight
            .get(address)
            .copied()
            .ok_or_else(|| Error::UnknownNode(address.clone()))
    }

    /// Incident edges of `target` with the far endpoint's score and the
    /// portion of `target`'s score flowing in along each edge:
    /// `score(other) * raw / total_out_weight(other)`, where `raw` collects
    /// `to_weight` if the edge points at `target` and `fro_weight` if it
    /// leaves `target` (a self-loop collects both).
    ///
    /// At a fixed point with no teleport, these contributions plus the
    /// synthetic-loop contribution sum to `target`'s score exactly; that
    /// identity is what makes scores explainable edge by edge.
    pub fn neighbors(
        &self,
        target: &NodeAddress,
        options: &NeighborsOptions,
    ) -> Result<Vec<ScoredNeighbor>> {
        self.check_unmodified()?;
        let neighbors = self.graph.neighbors(target, options)?;
        neighbors
            .into_iter()
            .map(|nb| {
                let weight = self.weight_of(&nb.edge.address)?;
                let mut raw = 0.0;
                if nb.edge.dst == *target {
                    raw += weight.to_weight;
                }
                if nb.edge.src == *target {
                    raw += weight.fro_weight;
                }
                let score = self.score_of(&nb.node)?;
                let total = self
                    .total_out_weight
                    .get(&nb.node)
                    .copied()
                    .ok_or_else(|| Error::UnknownNode(nb.node.clone()))?;
                Ok(ScoredNeighbor {
                    node: ScoredNode { address: nb.node, score },
                    edge: WeightedEdge { edge: nb.edge, weight },
                    score_contribution: score * raw / total,
                })
            })
            .collect()
    }

    /// The portion of `target`'s score attributable to its synthetic
    /// self-loop: `score(target) * loop_weight / total_out_weight(target)`.
    pub fn synthetic_loop_score_contribution(&self, target: &NodeAddress) -> Result<f64> {
        self.check_unmodified()?;
        let score = match self.scores.get(target) {
            Some(&s) => s,
            None => return Err(Error::UnknownNode(target.clone())),
        };
        let total = self
            .total_out_weight
            .get(target)
            .copied()
            .ok_or_else(|| Error::UnknownNode(target.clone()))?;
        Ok(score * self.synthetic_loop_weight / total)
    }

    /// Structural equality: same graph, same scores, same weights, same loop
    /// weight. Modification history is irrelevant, but both overlays must
    /// still be valid (unmodified) to compare.
    pub fn equals(&self, other: &Self) -> Result<bool> {
        self.check_unmodified()?;
        other.check_unmodified()?;
        Ok(self.graph.graph_eq(&other.graph)
            && self.scores == other.scores
            && self.edge_weights == other.edge_weights
            && self.synthetic_loop_weight == other.synthetic_loop_weight)
    }

    /// Compiles the graph, converges the induced chain under `seed`, and
    /// overwrites the score map with the resulting distribution. The solve
    /// starts from the overlay's current scores, so successive runs refine
    /// rather than restart. Scores are written only after the solver
    /// returns; a failed run leaves the overlay unchanged.
    pub fn run(&mut self, seed: &Seed, options: &SolverOptions) -> Result<RunReport> {
        self.check_unmodified()?;
        let compiled = compile(&self.graph, &self.edge_weights, self.synthetic_loop_weight)?;
        let (alpha, seed_distribution) = self.seed_distribution(seed, &compiled.order)?;
        let pi0 = compiled
            .order
            .iter()
            .map(|a| self.score_of(a))
            .collect::<Result<Vec<f64>>>()?;
        let result =
            find_stationary_distribution(&compiled.chain, &pi0, &seed_distribution, alpha, options)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            convergence_delta = result.convergence_delta,
            nodes = compiled.order.len(),
            "run finished"
        );
        for (address, score) in compiled.order.into_iter().zip(result.pi) {
            self.scores.insert(address, score);
        }
        Ok(RunReport { convergence_delta: result.convergence_delta })
    }

    fn seed_distribution(&self, seed: &Seed, order: &[NodeAddress]) -> Result<(f64, Vec<f64>)> {
        match seed {
            Seed::NoSeed => Ok((0.0, uniform_distribution(order.len()))),
            Seed::Uniform { alpha } => {
                validate_alpha(*alpha)?;
                Ok((*alpha, uniform_distribution(order.len())))
            }
            Seed::Selected { alpha, nodes } => {
                validate_alpha(*alpha)?;
                for address in nodes {
                    if !self.graph.has_node(address) {
                        return Err(Error::UnknownNode(address.clone()));
                    }
                }
                let distinct: BTreeSet<&NodeAddress> = nodes.iter().collect();
                if distinct.is_empty() || distinct.len() == order.len() {
                    return Ok((*alpha, uniform_distribution(order.len())));
                }
                Ok((*alpha, indicator_distribution(order, nodes)?))
            }
            Seed::Specified { .. } => Err(Error::NotImplemented("specified seed for run")),
        }
    }
}

fn validate_alpha(alpha: f64) -> Result<()> {
    if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
        return Err(Error::InvalidParameter(format!(
            "teleport probability must be in [0, 1], got {alpha}"
        )));
    }
    Ok(())
}
