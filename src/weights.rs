//! Edge weights and the evaluator contract.

use crate::address::EdgeAddress;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Asymmetric weight pair for one edge.
///
/// `to_weight` governs score flow `src -> dst`; `fro_weight` governs score
/// flow `dst -> src`. Both may be zero; neither may be negative, NaN, or
/// infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    pub to_weight: f64,
    pub fro_weight: f64,
}

impl EdgeWeight {
    pub fn new(to_weight: f64, fro_weight: f64) -> Self {
        EdgeWeight { to_weight, fro_weight }
    }

    /// Checks the non-negativity/finiteness contract, naming the offending
    /// edge in the error.
    pub fn validate(&self, edge: &EdgeAddress) -> Result<()> {
        for w in [self.to_weight, self.fro_weight] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidWeight { edge: edge.clone(), weight: w });
            }
        }
        Ok(())
    }
}
