use std::path::Path;

use linfa::traits::Fit;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use tracing::{info, warn};

use crate::dataset::{Dataset, read_dataset};

use super::model::MODEL_VERSION;
use super::{
    Hyperparameters, KernelType, SupportVector, SupportVectorModel, TrainError, TrainedModel,
    Trainer, TrainerBackend, check_trainable, default_max_iterations,
};

const BACKEND_NAME: &str = "linfa-svm";

/// Dual coefficients at or below this magnitude are not support vectors.
const ALPHA_EPSILON: f64 = 1e-12;

/// Start of linfa-svm's summary line when the solver ran out of iterations.
const ITERATION_LIMIT_PREFIX: &str = "Reached maximal iterations";

/// In-process C-SVC trainer built on `linfa-svm`.
#[derive(Clone, Debug, Default)]
pub struct LinfaTrainer {
    params: Hyperparameters,
}

impl LinfaTrainer {
    pub fn new(params: Hyperparameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    /// Fit an already loaded dataset.
    pub fn fit_dataset(&self, dataset: &Dataset) -> Result<SupportVectorModel, TrainError> {
        self.params.validate()?;
        check_trainable(dataset)?;
        if self.params.max_iterations != default_max_iterations() {
            warn!(
                "max_iterations = {} is ignored by {BACKEND_NAME}; its solver uses a built-in limit",
                self.params.max_iterations
            );
        }

        let feature_len = dataset.max_index() as usize;
        let mut records = Array2::<f64>::zeros((dataset.len(), feature_len));
        for (row, example) in dataset.examples.iter().enumerate() {
            for (index, value) in example.features.iter() {
                records[[row, index as usize - 1]] = value;
            }
        }
        let targets = Array1::from_iter(
            dataset
                .examples
                .iter()
                .map(|example| example.label.is_positive()),
        );
        let training = linfa::Dataset::new(records, targets);

        let c = self.params.c;
        let base = Svm::<f64, bool>::params()
            .pos_neg_weights(c, c)
            .eps(self.params.tolerance);
        let params = match self.params.kernel {
            KernelType::Linear => base.linear_kernel(),
            KernelType::Polynomial => {
                base.polynomial_kernel(self.params.coef0, f64::from(self.params.degree))
            }
            KernelType::Rbf => base.gaussian_kernel(1.0 / self.params.gamma),
            kernel => {
                return Err(TrainError::UnsupportedKernel {
                    backend: BACKEND_NAME,
                    kernel,
                });
            }
        };
        info!(
            "Fitting {BACKEND_NAME}: {} examples, {feature_len} features, C={c}",
            dataset.len()
        );
        let svm = params
            .fit(&training)
            .map_err(|err| TrainError::Solver(err.to_string()))?;
        check_converged(&svm.to_string())?;

        let support_vectors: Vec<SupportVector> = svm
            .alpha
            .iter()
            .zip(&dataset.examples)
            .filter(|(alpha, _)| alpha.abs() > ALPHA_EPSILON)
            .map(|(alpha, example)| SupportVector {
                weight: *alpha,
                features: example.features.clone(),
            })
            .collect();
        info!(
            "{BACKEND_NAME} finished: {} support vectors, rho={}",
            support_vectors.len(),
            svm.rho
        );
        Ok(SupportVectorModel {
            model_version: MODEL_VERSION,
            backend: BACKEND_NAME.to_string(),
            kernel: self.params.kernel,
            feature_len,
            bias: svm.rho,
            support_vectors,
        })
    }
}

impl Trainer for LinfaTrainer {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn backend(&self) -> TrainerBackend {
        TrainerBackend::Linfa
    }

    fn fit(&self, dataset_path: &Path) -> Result<Box<dyn TrainedModel>, TrainError> {
        let dataset = read_dataset(dataset_path)?;
        Ok(Box::new(self.fit_dataset(&dataset)?))
    }
}

/// linfa-svm only reports why the solver stopped through the model's
/// `Display` summary.
fn check_converged(summary: &str) -> Result<(), TrainError> {
    if summary.starts_with(ITERATION_LIMIT_PREFIX) {
        return Err(TrainError::Solver(format!(
            "{BACKEND_NAME} did not converge: {summary}"
        )));
    }
    Ok(())
}
