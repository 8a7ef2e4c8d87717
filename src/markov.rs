//! Sparse Markov chain kernel.
//!
//! A chain is stored as a sequence of columns. Column `j` lists, in parallel
//! arrays, the rows `i` and probabilities `P(i <- j)` of moving *from* node
//! `j` *to* node `i`, so every column is a probability distribution. One
//! power-iteration step scatters each column's mass into a dense scratch
//! vector; order of summation is unspecified and results are not bit-exact.

use crate::address::NodeAddress;
use crate::{Error, Result};
use std::collections::BTreeSet;

/// Tolerance for the column-sum check at construction.
pub const COLUMN_SUM_EPSILON: f64 = 1e-12;

/// Nonzero entries of one column: `weight[k]` is the probability of moving to
/// row `neighbor[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainColumn {
    pub neighbor: Vec<u32>,
    pub weight: Vec<f64>,
}

/// A column-stochastic sparse transition matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMarkovChain {
    columns: Vec<ChainColumn>,
}

impl SparseMarkovChain {
    /// Validates that every column is a probability distribution: parallel
    /// arrays of equal length, in-range rows, non-negative finite weights
    /// summing to 1 within [`COLUMN_SUM_EPSILON`].
    pub fn new(columns: Vec<ChainColumn>) -> Result<Self> {
        let n = columns.len();
        for (j, column) in columns.iter().enumerate() {
            if column.neighbor.len() != column.weight.len() {
                return Err(Error::InvalidParameter(format!(
                    "column {j} has {} rows but {} weights",
                    column.neighbor.len(),
                    column.weight.len()
                )));
            }
            for &i in &column.neighbor {
                if i as usize >= n {
                    return Err(Error::InvalidParameter(format!(
                        "column {j} references row {i}, but the chain has {n} nodes"
                    )));
                }
            }
            for &w in &column.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "column {j} has invalid transition weight {w}"
                    )));
                }
            }
            let sum: f64 = column.weight.iter().sum();
            if (sum - 1.0).abs() > COLUMN_SUM_EPSILON {
                return Err(Error::NonStochasticColumn { column: j, sum });
            }
        }
        Ok(SparseMarkovChain { columns })
    }

    pub fn node_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ChainColumn] {
        &self.columns
    }
}

/// The uniform distribution over `n` nodes. `n` must be positive: a
/// distribution over zero nodes is undefined.
pub fn uniform_distribution(n: usize) -> Vec<f64> {
    debug_assert!(n > 0, "uniform distribution over zero nodes");
    vec![1.0 / n as f64; n]
}

/// A distribution whose mass is spread evenly over `selected`, zero
/// elsewhere. Duplicates in `selected` are collapsed. An empty selection
/// means uniform over `order`; a non-empty selection disjoint from `order` is
/// an error.
pub fn indicator_distribution(order: &[NodeAddress], selected: &[NodeAddress]) -> Result<Vec<f64>> {
    if selected.is_empty() {
        return Ok(uniform_distribution(order.len()));
    }
    let selected: BTreeSet<&NodeAddress> = selected.iter().collect();
    let hits: Vec<usize> = order
        .iter()
        .enumerate()
        .filter(|(_, addr)| selected.contains(addr))
        .map(|(i, _)| i)
        .collect();
    if hits.is_empty() {
        return Err(Error::InvalidParameter(
            "selected nodes are disjoint from the node order".to_string(),
        ));
    }
    let mut pi = vec![0.0; order.len()];
    let mass = 1.0 / hits.len() as f64;
    for i in hits {
        pi[i] = mass;
    }
    Ok(pi)
}

/// One power-iteration step with teleport:
/// `pi' = alpha * seed + (1 - alpha) * (chain . pi)`.
pub fn step(chain: &SparseMarkovChain, pi: &[f64], seed: &[f64], alpha: f64) -> Vec<f64> {
    debug_assert_eq!(pi.len(), chain.node_count());
    debug_assert_eq!(seed.len(), chain.node_count());
    let mut next = vec![0.0; pi.len()];
    for (j, column) in chain.columns.iter().enumerate() {
        let mass = pi[j];
        if mass == 0.0 {
            continue;
        }
        for (&i, &w) in column.neighbor.iter().zip(&column.weight) {
            next[i as usize] += w * mass;
        }
    }
    if alpha > 0.0 {
        for (x, &s) in next.iter_mut().zip(seed) {
            *x = alpha * s + (1.0 - alpha) * *x;
        }
    }
    next
}

/// Convergence measure: the L-infinity norm `max_i |pi1_i - pi0_i|`.
pub fn max_delta(pi0: &[f64], pi1: &[f64]) -> f64 {
    debug_assert_eq!(pi0.len(), pi1.len());
    pi0.iter().zip(pi1).map(|(a, b)| (b - a).abs()).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NodeAddress {
        NodeAddress::new([s])
    }

    /// Two-node chain: node 0 sends everything to node 1, node 1 splits
    /// evenly between both.
    fn two_node_chain() -> SparseMarkovChain {
        SparseMarkovChain::new(vec![
            ChainColumn { neighbor: vec![1], weight: vec![1.0] },
            ChainColumn { neighbor: vec![0, 1], weight: vec![0.5, 0.5] },
        ])
        .unwrap()
    }

    #[test]
    fn uniform_sums_to_one() {
        let pi = uniform_distribution(4);
        assert_eq!(pi, vec![0.25; 4]);
    }

    #[test]
    fn indicator_spreads_mass_over_selection() {
        let order = vec![addr("a"), addr("b"), addr("c"), addr("d")];
        let pi = indicator_distribution(&order, &[addr("b"), addr("d")]).unwrap();
        assert_eq!(pi, vec![0.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn indicator_collapses_duplicates() {
        let order = vec![addr("a"), addr("b")];
        let pi = indicator_distribution(&order, &[addr("a"), addr("a")]).unwrap();
        assert_eq!(pi, vec![1.0, 0.0]);
    }

    #[test]
    fn indicator_empty_selection_is_uniform() {
        let order = vec![addr("a"), addr("b")];
        assert_eq!(indicator_distribution(&order, &[]).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn indicator_disjoint_selection_errors() {
        let order = vec![addr("a"), addr("b")];
        let err = indicator_distribution(&order, &[addr("zz")]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn construction_rejects_non_stochastic_column() {
        let err = SparseMarkovChain::new(vec![ChainColumn {
            neighbor: vec![0],
            weight: vec![0.9],
        }])
        .unwrap_err();
        assert!(matches!(err, Error::NonStochasticColumn { column: 0, .. }));
    }

    #[test]
    fn construction_rejects_mismatched_arrays_and_bad_rows() {
        let err = SparseMarkovChain::new(vec![ChainColumn {
            neighbor: vec![0, 1],
            weight: vec![1.0],
        }])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let err = SparseMarkovChain::new(vec![ChainColumn {
            neighbor: vec![5],
            weight: vec![1.0],
        }])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn step_moves_mass_along_columns() {
        let chain = two_node_chain();
        let pi = step(&chain, &[1.0, 0.0], &[0.5, 0.5], 0.0);
        assert_eq!(pi, vec![0.0, 1.0]);
        let pi = step(&chain, &pi, &[0.5, 0.5], 0.0);
        assert_eq!(pi, vec![0.5, 0.5]);
    }

    #[test]
    fn step_preserves_total_mass() {
        let chain = two_node_chain();
        let pi = step(&chain, &[0.3, 0.7], &[0.5, 0.5], 0.25);
        let total: f64 = pi.iter().sum();
        assert!((total - 1.0).abs() < 1e-12, "total={total}");
    }

    #[test]
    fn full_teleport_returns_the_seed() {
        let chain = two_node_chain();
        let seed = [0.9, 0.1];
        let pi = step(&chain, &[0.5, 0.5], &seed, 1.0);
        assert_eq!(pi, seed);
    }

    #[test]
    fn max_delta_is_l_infinity() {
        assert_eq!(max_delta(&[0.25, 0.75], &[0.5, 0.5]), 0.25);
        assert_eq!(max_delta(&[0.5, 0.5], &[0.5, 0.5]), 0.0);
    }
}
