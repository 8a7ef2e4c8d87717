//! # flowrank
//!
//! Weighted-graph scoring engine: wraps a directed multigraph in a scored
//! overlay, compiles asymmetric edge weights plus synthetic self-loops into a
//! column-stochastic sparse Markov chain, and drives a PageRank-style power
//! iteration to a stationary distribution of score over nodes. Each node's
//! score decomposes into contributions from its neighbors, which is what
//! makes the results explainable rather than just a ranking.
//!
//! ## Design contract
//!
//! - **Algorithmic clarity > cleverness**: implementations are meant to be
//!   readable and testable.
//! - **Canonical orderings**: the node order used by the Markov chain and the
//!   order used by the serializer are the same (lexicographic over
//!   addresses). Serialized form is canonical with respect to construction
//!   history.
//! - **No silent normalization**: edge weights are validated, never clamped;
//!   column normalization by total out-weight is the only division and its
//!   divisor is guaranteed positive by the synthetic loop.
//!
//! Public invariants (must not drift):
//!
//! - The overlay's score map is a probability distribution at all times.
//! - Every public overlay operation fails fast if the host graph was mutated
//!   after construction.
//! - Bit-exact floating point results are *not* part of the contract; two
//!   runs agree to within the convergence threshold.

pub mod address;
pub mod compile;
pub mod graph;
pub mod markov;
pub mod ranking;
pub mod scored;
pub mod serialize;
pub mod solver;
pub mod weights;

pub use address::{EdgeAddress, NodeAddress};
pub use compile::{compile, CompiledChain};
pub use graph::{Direction, Edge, EdgesOptions, HostGraph, MemGraph, Neighbor, NeighborsOptions};
pub use markov::{
    indicator_distribution, max_delta, step, uniform_distribution, ChainColumn,
    SparseMarkovChain, COLUMN_SUM_EPSILON,
};
pub use ranking::top_k;
pub use scored::{
    RunReport, ScoredGraph, ScoredNeighbor, ScoredNode, Seed, WeightedEdge,
    DEFAULT_SYNTHETIC_LOOP_WEIGHT,
};
pub use serialize::{CompatHeader, COMPAT_TYPE, COMPAT_VERSION};
pub use solver::{find_stationary_distribution, SolverOptions, StationaryDistribution};
pub use weights::EdgeWeight;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph has no nodes")]
    EmptyGraph,
    #[error("synthetic loop weight must be a positive finite number, got {0}")]
    InvalidLoopWeight(f64),
    #[error("invalid weight {weight} on edge {edge}")]
    InvalidWeight { edge: EdgeAddress, weight: f64 },
    #[error("graph modified since overlay construction: modification count was {expected}, now {found}")]
    GraphModified { expected: u64, found: u64 },
    #[error("no such node: {0}")]
    UnknownNode(NodeAddress),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("incompatible serialized form: expected {expected}, found {found}")]
    CompatMismatch { expected: String, found: String },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("markov chain column {column} is not a probability distribution (sums to {sum})")]
    NonStochasticColumn { column: usize, sum: f64 },
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
