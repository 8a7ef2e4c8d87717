//! Stationary-distribution solver.
//!
//! Drives repeated power-iteration steps until the L-infinity delta between
//! successive distributions drops below the convergence threshold or the
//! iteration cap is reached. Non-convergence is reported through the final
//! delta, never panicked on; callers choose how to interpret it.
//!
//! Long runs yield cooperatively: after `yield_after` of wall time the solver
//! hands the scheduler a hint (`std::thread::yield_now`) so other host work
//! can interleave. This crate performs no parallelism of its own.

use crate::markov::{max_delta, step, SparseMarkovChain};
use crate::{Error, Result};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SolverOptions {
    /// Hard cap on iterations; the solver stops here even if not converged.
    pub max_iterations: usize,
    /// Stop once the delta between successive distributions is at or below
    /// this.
    pub convergence_threshold: f64,
    /// Wall-time budget between cooperative yields.
    pub yield_after: Duration,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            max_iterations: 255,
            convergence_threshold: 1e-7,
            yield_after: Duration::from_millis(30),
        }
    }
}

/// Outcome of a solve: the final distribution and the last observed delta.
#[derive(Debug, Clone, PartialEq)]
pub struct StationaryDistribution {
    pub pi: Vec<f64>,
    pub convergence_delta: f64,
}

/// Iterates `pi' = alpha * seed + (1 - alpha) * (chain . pi)` from `pi0`.
///
/// Termination, checked in this order each iteration:
/// 1. the iteration cap is reached: return the current distribution together
///    with the delta of the step that produced it (`max_iterations = 0` has
///    taken no step, so that one case reports the delta against a
///    hypothetical step and returns `pi0` unchanged);
/// 2. the delta is at or below the convergence threshold: return the stepped
///    distribution;
/// 3. otherwise, yield if the budget has elapsed, and continue.
pub fn find_stationary_distribution(
    chain: &SparseMarkovChain,
    pi0: &[f64],
    seed: &[f64],
    alpha: f64,
    options: &SolverOptions,
) -> Result<StationaryDistribution> {
    let n = chain.node_count();
    if pi0.len() != n || seed.len() != n {
        return Err(Error::InvalidParameter(format!(
            "distribution lengths ({}, {}) do not match chain size {n}",
            pi0.len(),
            seed.len()
        )));
    }
    if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
        return Err(Error::InvalidParameter(format!(
            "teleport probability must be in [0, 1], got {alpha}"
        )));
    }

    let mut pi = pi0.to_vec();
    let mut last_delta: Option<f64> = None;
    let mut iteration = 0usize;
    let mut last_yield = Instant::now();
    loop {
        if iteration >= options.max_iterations {
            let delta = match last_delta {
                Some(d) => d,
                // Only reachable with max_iterations = 0: no step has been
                // taken, so measure one hypothetical step without taking it.
                None => max_delta(&pi, &step(chain, &pi, seed, alpha)),
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(iteration, delta, "iteration cap reached before convergence");
            return Ok(StationaryDistribution { pi, convergence_delta: delta });
        }
        let next = step(chain, &pi, seed, alpha);
        let delta = max_delta(&pi, &next);
        iteration += 1;
        pi = next;
        last_delta = Some(delta);
        if delta <= options.convergence_threshold {
            #[cfg(feature = "tracing")]
            tracing::debug!(iteration, delta, "converged");
            return Ok(StationaryDistribution { pi, convergence_delta: delta });
        }
        if last_yield.elapsed() >= options.yield_after {
            std::thread::yield_now();
            last_yield = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov::ChainColumn;

    /// A two-state chain whose stationary distribution is (2/3, 1/3):
    /// column 0 keeps half its mass, column 1 sends everything to 0.
    fn biased_chain() -> SparseMarkovChain {
        SparseMarkovChain::new(vec![
            ChainColumn { neighbor: vec![0, 1], weight: vec![0.5, 0.5] },
            ChainColumn { neighbor: vec![0], weight: vec![1.0] },
        ])
        .unwrap()
    }

    #[test]
    fn converges_to_the_stationary_distribution() {
        let chain = biased_chain();
        let uniform = [0.5, 0.5];
        let result = find_stationary_distribution(
            &chain,
            &uniform,
            &uniform,
            0.0,
            &SolverOptions { convergence_threshold: 1e-12, ..Default::default() },
        )
        .unwrap();
        assert!((result.pi[0] - 2.0 / 3.0).abs() < 1e-9, "pi={:?}", result.pi);
        assert!((result.pi[1] - 1.0 / 3.0).abs() < 1e-9);
        assert!(result.convergence_delta <= 1e-12);
    }

    #[test]
    fn zero_iterations_returns_initial_distribution_with_hypothetical_delta() {
        let chain = biased_chain();
        let pi0 = [1.0, 0.0];
        let result = find_stationary_distribution(
            &chain,
            &pi0,
            &[0.5, 0.5],
            0.0,
            &SolverOptions { max_iterations: 0, convergence_threshold: 0.0, ..Default::default() },
        )
        .unwrap();
        assert_eq!(result.pi, pi0);
        // One hypothetical step from (1, 0) reaches (0.5, 0.5).
        assert_eq!(result.convergence_delta, 0.5);
    }

    #[test]
    fn iteration_cap_stops_an_unconverged_solve() {
        let chain = biased_chain();
        let result = find_stationary_distribution(
            &chain,
            &[1.0, 0.0],
            &[0.5, 0.5],
            0.0,
            &SolverOptions { max_iterations: 1, convergence_threshold: 0.0, ..Default::default() },
        )
        .unwrap();
        // One step from (1, 0): column 0 splits evenly. The reported delta
        // belongs to that step, not to a further lookahead (which would have
        // measured 0.25).
        assert_eq!(result.pi, vec![0.5, 0.5]);
        assert_eq!(result.convergence_delta, 0.5);
    }

    #[test]
    fn full_teleport_converges_immediately_to_the_seed() {
        let chain = biased_chain();
        let seed = [0.9, 0.1];
        let result = find_stationary_distribution(
            &chain,
            &[0.5, 0.5],
            &seed,
            1.0,
            &SolverOptions::default(),
        )
        .unwrap();
        assert_eq!(result.pi, seed.to_vec());
        assert!(result.convergence_delta <= 1e-7);
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let chain = biased_chain();
        for alpha in [-0.1, 1.1, f64::NAN] {
            let err = find_stationary_distribution(
                &chain,
                &[0.5, 0.5],
                &[0.5, 0.5],
                alpha,
                &SolverOptions::default(),
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)));
        }
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let chain = biased_chain();
        let err = find_stationary_distribution(
            &chain,
            &[1.0],
            &[0.5, 0.5],
            0.0,
            &SolverOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
