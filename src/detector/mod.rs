//! Linear window detector: weight vector plus bias.
//!
//! A window with descriptor `x` scores `dot(w, x) - bias`; it is a hit when
//! the score exceeds the configured hit threshold.

mod sliding;
pub mod synthesize;
mod vector_file;

use thiserror::Error;

pub use sliding::{
    DetectionParams, Detection, SlidingWindowDetector, WindowDetector, filter_nested,
};
pub use synthesize::{Synthesis, SynthesisError, synthesize};
pub use vector_file::{
    BiasLayout, DetectorFileError, DetectorManifest, SCORE_CONVENTION, load_detector,
    manifest_path, save_detector,
};

/// Weight vector of length `D` and a separate bias.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearDetector {
    weights: Vec<f32>,
    bias: f64,
}

impl LinearDetector {
    pub fn new(weights: Vec<f32>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Descriptor length `D` this detector expects.
    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    /// `dot(w, x) - bias`, accumulated in `f64`.
    pub fn score(&self, features: &[f32]) -> Result<f64, DimensionMismatch> {
        if features.len() != self.weights.len() {
            return Err(DimensionMismatch {
                expected: self.weights.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| f64::from(*w) * f64::from(*x))
            .sum();
        Ok(dot - self.bias)
    }
}

/// Descriptor and detector lengths disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("descriptor length {actual} does not match detector dimension {expected}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_subtracts_bias() {
        let detector = LinearDetector::new(vec![0.5, -1.0], 0.25);
        assert_eq!(detector.score(&[2.0, 1.0]).unwrap(), -0.25);
        assert_eq!(detector.dimension(), 2);
    }

    #[test]
    fn score_rejects_wrong_length() {
        let detector = LinearDetector::new(vec![1.0; 3], 0.0);
        assert_eq!(
            detector.score(&[1.0]),
            Err(DimensionMismatch {
                expected: 3,
                actual: 1
            })
        );
    }
}
