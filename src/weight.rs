//! Weight computation.
//!
//! `compute_weight` is the sole injection point the roadmap note in the
//! specification calls out ("roadmap: neural-network weight function") —
//! swapping in a different [`WeightFn`] changes nothing about dirty
//! tracking, the distribution cache, or the selector.

use std::fmt::Debug;

/// Computes a single entry's weight from its top-`N` history bits.
///
/// `bits` has exactly `coeffs.len()` entries, ordered age-0-first. `mwsp`
/// is `-1` to disable the floor, otherwise the index in `[0, bits.len())`
/// whose bit is forced to `1` regardless of its actual history value.
pub trait WeightFn: Debug + Send + Sync {
    fn weight(&self, bits: &[bool], mwsp: i32, coeffs: &[f64]) -> f64;
}

/// The weight function specified in §4.3: `w = Σ 2^(3n/2) * effective_s(n)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShiftRegisterWeight;

impl WeightFn for ShiftRegisterWeight {
    fn weight(&self, bits: &[bool], mwsp: i32, coeffs: &[f64]) -> f64 {
        coeffs
            .iter()
            .enumerate()
            .map(|(n, &coeff)| {
                let effective = (mwsp >= 0 && n as i32 == mwsp) || bits[n];
                if effective {
                    coeff
                } else {
                    0.0
                }
            })
            .sum()
    }
}

#[derive(Debug)]
pub(crate) struct WeightEngine {
    consideration_depth: usize,
    mwsp: i32,
    /// Precomputed `2^(3n/2)` for `n in [0, consideration_depth)`.
    coeffs: Vec<f64>,
    weight_fn: Box<dyn WeightFn>,
}

impl WeightEngine {
    pub(crate) fn new(consideration_depth: usize, mwsp: i32, weight_fn: Box<dyn WeightFn>) -> Self {
        let coeffs = (0..consideration_depth)
            .map(|n| 2f64.powf(1.5 * n as f64))
            .collect();
        Self {
            consideration_depth,
            mwsp,
            coeffs,
            weight_fn,
        }
    }

    pub(crate) fn consideration_depth(&self) -> usize {
        self.consideration_depth
    }

    pub(crate) fn set_mwsp(&mut self, m: i32) {
        self.mwsp = m;
    }

    pub(crate) fn compute(&self, bits: &[bool]) -> f64 {
        self.weight_fn.weight(bits, self.mwsp, &self.coeffs)
    }
}
