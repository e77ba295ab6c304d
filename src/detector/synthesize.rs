//! Collapse a linear-kernel SVM into one weight vector.
//!
//! For a linear kernel `sum(a_i * dot(sv_i, x)) - b` equals
//! `dot(sum(a_i * sv_i), x) - b`, so the whole model reduces to
//! `w = sum(a_i * sv_i)` and the bias `b`.

use thiserror::Error;
use tracing::{info, warn};

use crate::trainer::{KernelType, TrainedModel};

use super::LinearDetector;

/// Result of [`synthesize`].
#[derive(Clone, Debug, PartialEq)]
pub struct Synthesis {
    pub detector: LinearDetector,
    /// Support vectors folded into the weights.
    pub support_vectors: usize,
    /// `(index, value)` contributions dropped because the index fell outside
    /// `1..=D`.
    pub skipped_components: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Detector synthesis needs a linear kernel, model uses {0}")]
    NonLinearKernel(KernelType),
}

/// Fold the support vectors of `model` into a detector of length `dimension`.
///
/// Out-of-range indices mean the model and descriptor disagree; they are
/// logged and skipped rather than aborting.
pub fn synthesize(model: &dyn TrainedModel, dimension: usize) -> Result<Synthesis, SynthesisError> {
    if model.kernel() != KernelType::Linear {
        return Err(SynthesisError::NonLinearKernel(model.kernel()));
    }

    let mut accumulator = vec![0.0f64; dimension];
    let mut skipped_components = 0usize;
    let support_vectors = model.support_vectors();
    for (sv_idx, sv) in support_vectors.iter().enumerate() {
        for (index, value) in sv.features.iter() {
            match (index as usize)
                .checked_sub(1)
                .and_then(|slot| accumulator.get_mut(slot))
            {
                Some(slot) => *slot += sv.weight * value,
                None => {
                    skipped_components += 1;
                    warn!(
                        "Support vector {sv_idx} has feature index {index} outside 1..={dimension}, skipping"
                    );
                }
            }
        }
    }
    if skipped_components > 0 {
        warn!(
            "Model and descriptor disagree: {skipped_components} components skipped (model reports {} features, descriptor has {dimension})",
            model.feature_len()
        );
    }

    let weights = accumulator.into_iter().map(|w| w as f32).collect();
    info!(
        "Synthesized {dimension}-dimensional detector from {} support vectors ({} backend), bias {}",
        support_vectors.len(),
        model.backend(),
        model.bias()
    );
    Ok(Synthesis {
        detector: LinearDetector::new(weights, model.bias()),
        support_vectors: support_vectors.len(),
        skipped_components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::{SupportVector, SupportVectorModel};

    fn model(kernel: KernelType, vectors: &[(f64, &[(u32, f64)])], bias: f64) -> SupportVectorModel {
        SupportVectorModel {
            model_version: 1,
            backend: "test".to_string(),
            kernel,
            feature_len: 2,
            bias,
            support_vectors: vectors
                .iter()
                .map(|(weight, pairs)| SupportVector {
                    weight: *weight,
                    features: pairs.iter().copied().collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn folds_support_vectors_into_weights() {
        let model = model(
            KernelType::Linear,
            &[(0.5, &[(1, 2.0), (2, -4.0)]), (-1.0, &[(1, 1.0), (2, 1.0)])],
            0.75,
        );
        let synthesis = synthesize(&model, 2).unwrap();
        let weights = synthesis.detector.weights();
        assert!((weights[0] - 0.0).abs() < 1e-6);
        assert!((weights[1] - -3.0).abs() < 1e-6);
        assert_eq!(synthesis.detector.bias(), 0.75);
        assert_eq!(synthesis.support_vectors, 2);
        assert_eq!(synthesis.skipped_components, 0);
    }

    #[test]
    fn explicit_zero_components_still_fold() {
        let model = model(
            KernelType::Linear,
            &[(0.5, &[(1, 2.0), (2, 0.0)]), (-1.0, &[(1, 1.0), (2, 3.0)])],
            0.0,
        );
        let synthesis = synthesize(&model, 2).unwrap();
        let weights = synthesis.detector.weights();
        assert!(weights[0].abs() < 1e-6, "{weights:?}");
        assert!((weights[1] + 3.0).abs() < 1e-6, "{weights:?}");
        assert_eq!(synthesis.skipped_components, 0);
    }

    #[test]
    fn sparse_vectors_leave_missing_indices_untouched() {
        let model = model(KernelType::Linear, &[(2.0, &[(3, 1.5)])], 0.0);
        let synthesis = synthesize(&model, 4).unwrap();
        assert_eq!(synthesis.detector.weights(), &[0.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let model = model(KernelType::Linear, &[(1.0, &[(1, 1.0), (5, 9.0)])], 0.0);
        let synthesis = synthesize(&model, 2).unwrap();
        assert_eq!(synthesis.detector.weights(), &[1.0, 0.0]);
        assert_eq!(synthesis.skipped_components, 1);
    }

    #[test]
    fn no_support_vectors_gives_zero_weights() {
        let model = model(KernelType::Linear, &[], -0.5);
        let synthesis = synthesize(&model, 3).unwrap();
        assert_eq!(synthesis.detector.weights(), &[0.0; 3]);
        assert_eq!(synthesis.detector.bias(), -0.5);
    }

    #[test]
    fn rejects_non_linear_kernels() {
        let model = model(KernelType::Rbf, &[(1.0, &[(1, 1.0)])], 0.0);
        assert_eq!(
            synthesize(&model, 1),
            Err(SynthesisError::NonLinearKernel(KernelType::Rbf))
        );
    }
}
