//! Ranking utilities.

use crate::scored::ScoredNode;
use ordered_float::NotNan;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Select the `k` highest-scoring nodes, descending. Non-finite and
/// non-positive scores are skipped; ties break toward the lexicographically
/// smaller address so the result is deterministic.
pub fn top_k(nodes: &[ScoredNode], k: usize) -> Vec<ScoredNode> {
    if k == 0 || nodes.is_empty() {
        return Vec::new();
    }
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (i, node) in nodes.iter().enumerate() {
        if !node.score.is_finite() || node.score <= 0.0 {
            continue;
        }
        let s = match NotNan::new(node.score) {
            Ok(s) => s,
            Err(_) => continue,
        };
        // Max-heap of Reverse keeps the current k best; the address is part
        // of the key so equal scores evict deterministically.
        let key = Reverse((s, Reverse(&node.address), i));
        if heap.len() < k {
            heap.push(key);
        } else if let Some(&Reverse((min_score, Reverse(min_addr), _))) = heap.peek() {
            if (s, Reverse(&node.address)) > (min_score, Reverse(min_addr)) {
                heap.pop();
                heap.push(key);
            }
        }
    }
    let mut results: Vec<ScoredNode> =
        heap.into_iter().map(|Reverse((_, _, i))| nodes[i].clone()).collect();
    results.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.address.cmp(&b.address))
    });
    results
}
