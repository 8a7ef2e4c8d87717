//! Graph-to-chain compilation.
//!
//! Turns a host graph plus per-edge weights into a column-stochastic sparse
//! Markov chain over the canonical node order (all node addresses, sorted).
//! Column `j` accumulates `to_weight` for each out-edge of `j`, `fro_weight`
//! for each in-edge of `j`, and the synthetic self-loop at the diagonal;
//! parallel edges add into the same cell. Raw columns are then normalized by
//! their totals, which the synthetic loop keeps strictly positive.

use crate::address::{EdgeAddress, NodeAddress};
use crate::graph::HostGraph;
use crate::markov::{ChainColumn, SparseMarkovChain};
use crate::weights::EdgeWeight;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// A chain together with the node order its indices refer to. The same order
/// is used by the serializer; the two must never diverge.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledChain {
    pub order: Vec<NodeAddress>,
    pub chain: SparseMarkovChain,
}

impl CompiledChain {
    /// Index of `address` in the canonical order.
    pub fn index_of(&self, address: &NodeAddress) -> Option<usize> {
        self.order.binary_search(address).ok()
    }
}

/// Compiles `graph` into a Markov chain.
///
/// Every edge of the graph must have an entry in `weights`, and every weight
/// must pass the non-negativity/finiteness check. Edges whose weights are
/// both zero are accepted and contribute nothing.
pub fn compile<G: HostGraph>(
    graph: &G,
    weights: &BTreeMap<EdgeAddress, EdgeWeight>,
    synthetic_loop_weight: f64,
) -> Result<CompiledChain> {
    if !synthetic_loop_weight.is_finite() || synthetic_loop_weight <= 0.0 {
        return Err(Error::InvalidLoopWeight(synthetic_loop_weight));
    }

    let order = graph.nodes(None);
    let n = order.len();
    let index: HashMap<&NodeAddress, usize> =
        order.iter().enumerate().map(|(i, a)| (a, i)).collect();

    // Raw column cells, keyed by row. BTreeMap keeps row order deterministic.
    let mut raw: Vec<BTreeMap<u32, f64>> = vec![BTreeMap::new(); n];
    for (j, cells) in raw.iter_mut().enumerate() {
        cells.insert(j as u32, synthetic_loop_weight);
    }

    for edge in graph.edges(None) {
        let weight = weights.get(&edge.address).ok_or_else(|| {
            Error::InvalidParameter(format!("no weight recorded for edge {}", edge.address))
        })?;
        weight.validate(&edge.address)?;
        let src = *index
            .get(&edge.src)
            .ok_or_else(|| Error::UnknownNode(edge.src.clone()))?;
        let dst = *index
            .get(&edge.dst)
            .ok_or_else(|| Error::UnknownNode(edge.dst.clone()))?;
        if weight.to_weight != 0.0 {
            *raw[src].entry(dst as u32).or_insert(0.0) += weight.to_weight;
        }
        if weight.fro_weight != 0.0 {
            *raw[dst].entry(src as u32).or_insert(0.0) += weight.fro_weight;
        }
    }

    let mut columns = Vec::with_capacity(n);
    for cells in raw {
        let total: f64 = cells.values().sum();
        let mut neighbor = Vec::with_capacity(cells.len());
        let mut weight = Vec::with_capacity(cells.len());
        for (i, w) in cells {
            neighbor.push(i);
            weight.push(w / total);
        }
        columns.push(ChainColumn { neighbor, weight });
    }

    let chain = SparseMarkovChain::new(columns)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(nodes = n, "compiled graph into markov chain");
    Ok(CompiledChain { order, chain })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, MemGraph};

    fn n(s: &str) -> NodeAddress {
        NodeAddress::new([s])
    }

    fn e(s: &str, src: &str, dst: &str) -> Edge {
        Edge::new(EdgeAddress::new([s]), n(src), n(dst))
    }

    fn weight_map(entries: &[(&str, f64, f64)]) -> BTreeMap<EdgeAddress, EdgeWeight> {
        entries
            .iter()
            .map(|&(s, to, fro)| (EdgeAddress::new([s]), EdgeWeight::new(to, fro)))
            .collect()
    }

    fn column_sums(chain: &SparseMarkovChain) -> Vec<f64> {
        chain.columns().iter().map(|c| c.weight.iter().sum()).collect()
    }

    #[test]
    fn order_is_sorted_addresses() {
        let mut g = MemGraph::new();
        g.add_node(n("c")).add_node(n("a")).add_node(n("b"));
        let compiled = compile(&g, &BTreeMap::new(), 1e-3).unwrap();
        assert_eq!(compiled.order, vec![n("a"), n("b"), n("c")]);
        assert_eq!(compiled.index_of(&n("b")), Some(1));
        assert_eq!(compiled.index_of(&n("z")), None);
    }

    #[test]
    fn isolated_nodes_get_only_the_synthetic_loop() {
        let mut g = MemGraph::new();
        g.add_node(n("a"));
        let compiled = compile(&g, &BTreeMap::new(), 1e-3).unwrap();
        let column = &compiled.chain.columns()[0];
        assert_eq!(column.neighbor, vec![0]);
        assert_eq!(column.weight, vec![1.0]);
    }

    #[test]
    fn asymmetric_weights_flow_in_both_directions() {
        let mut g = MemGraph::new();
        g.add_node(n("a")).add_node(n("b"));
        g.add_edge(e("ab", "a", "b")).unwrap();
        let weights = weight_map(&[("ab", 3.0, 1.0)]);
        let loop_weight = 1.0;
        let compiled = compile(&g, &weights, loop_weight).unwrap();

        // Column a: loop 1.0 + to_weight 3.0 toward b, total 4.
        let col_a = &compiled.chain.columns()[0];
        assert_eq!(col_a.neighbor, vec![0, 1]);
        assert_eq!(col_a.weight, vec![0.25, 0.75]);

        // Column b: loop 1.0 + fro_weight 1.0 back toward a, total 2.
        let col_b = &compiled.chain.columns()[1];
        assert_eq!(col_b.neighbor, vec![0, 1]);
        assert_eq!(col_b.weight, vec![0.5, 0.5]);
    }

    #[test]
    fn parallel_edges_accumulate_into_one_cell() {
        let mut g = MemGraph::new();
        g.add_node(n("a")).add_node(n("b"));
        g.add_edge(e("e1", "a", "b")).unwrap();
        g.add_edge(e("e2", "a", "b")).unwrap();
        let weights = weight_map(&[("e1", 1.0, 0.0), ("e2", 1.0, 0.0)]);
        let compiled = compile(&g, &weights, 2.0).unwrap();
        let col_a = &compiled.chain.columns()[0];
        // loop 2.0 + two edges at 1.0 each, total 4.
        assert_eq!(col_a.neighbor, vec![0, 1]);
        assert_eq!(col_a.weight, vec![0.5, 0.5]);
    }

    #[test]
    fn host_self_loop_contributes_both_weights_beside_the_synthetic_loop() {
        let mut g = MemGraph::new();
        g.add_node(n("a"));
        g.add_edge(e("aa", "a", "a")).unwrap();
        let weights = weight_map(&[("aa", 2.0, 3.0)]);
        let compiled = compile(&g, &weights, 1.0).unwrap();
        let column = &compiled.chain.columns()[0];
        assert_eq!(column.neighbor, vec![0]);
        assert_eq!(column.weight, vec![1.0]);
        // The raw diagonal is 1 + 2 + 3 = 6; normalization hides it, but the
        // column must still be a valid distribution.
        assert!((column_sums(&compiled.chain)[0] - 1.0).abs() <= 1e-12);
    }

    #[test]
    fn zero_zero_weights_are_accepted_and_contribute_nothing() {
        let mut g = MemGraph::new();
        g.add_node(n("a")).add_node(n("b"));
        g.add_edge(e("ab", "a", "b")).unwrap();
        let weights = weight_map(&[("ab", 0.0, 0.0)]);
        let compiled = compile(&g, &weights, 1e-3).unwrap();
        for column in compiled.chain.columns() {
            assert_eq!(column.neighbor.len(), 1);
            assert_eq!(column.weight, vec![1.0]);
        }
    }

    #[test]
    fn every_column_sums_to_one() {
        let mut g = MemGraph::new();
        for s in ["a", "b", "c", "d"] {
            g.add_node(n(s));
        }
        g.add_edge(e("ab", "a", "b")).unwrap();
        g.add_edge(e("bc", "b", "c")).unwrap();
        g.add_edge(e("cd", "c", "d")).unwrap();
        g.add_edge(e("da", "d", "a")).unwrap();
        let weights =
            weight_map(&[("ab", 1.0, 0.5), ("bc", 2.0, 0.0), ("cd", 0.0, 4.0), ("da", 1.0, 1.0)]);
        let compiled = compile(&g, &weights, 1e-3).unwrap();
        for (j, sum) in column_sums(&compiled.chain).into_iter().enumerate() {
            assert!((sum - 1.0).abs() <= 1e-12, "column {j} sums to {sum}");
        }
    }

    #[test]
    fn invalid_weight_is_rejected_and_names_the_edge() {
        let mut g = MemGraph::new();
        g.add_node(n("a")).add_node(n("b"));
        g.add_edge(e("ab", "a", "b")).unwrap();
        let weights = weight_map(&[("ab", -1.0, 0.0)]);
        let err = compile(&g, &weights, 1e-3).unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { .. }));
        assert!(err.to_string().contains("ab"));
    }

    #[test]
    fn missing_weight_is_rejected() {
        let mut g = MemGraph::new();
        g.add_node(n("a")).add_node(n("b"));
        g.add_edge(e("ab", "a", "b")).unwrap();
        let err = compile(&g, &BTreeMap::new(), 1e-3).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn non_positive_loop_weight_is_rejected() {
        let g = {
            let mut g = MemGraph::new();
            g.add_node(n("a"));
            g
        };
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = compile(&g, &BTreeMap::new(), bad).unwrap_err();
            assert!(matches!(err, Error::InvalidLoopWeight(_)));
        }
    }
}
