//! SVM trainer boundary.
//!
//! A [`Trainer`] turns a dataset file into a [`TrainedModel`]; the detector
//! synthesizer only ever sees the model's support vectors, bias and kernel.
//! Backends are plain values chosen at run time, never process-wide state.

mod linfa_backend;
mod model;
mod svmlight;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Label;
use crate::dataset::{Dataset, DatasetError, SparseFeatures};

pub use linfa_backend::LinfaTrainer;
pub use model::SupportVectorModel;
pub use svmlight::{SvmLightHeader, SvmLightModel, SvmLightTrainer};

/// Kernel families understood by the backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    #[default]
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Custom,
}

impl KernelType {
    /// Numeric kernel code used by SVMlight model files and `-t`.
    pub fn svmlight_code(self) -> i64 {
        match self {
            KernelType::Linear => 0,
            KernelType::Polynomial => 1,
            KernelType::Rbf => 2,
            KernelType::Sigmoid => 3,
            KernelType::Custom => 4,
        }
    }

    pub fn from_svmlight_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(KernelType::Linear),
            1 => Some(KernelType::Polynomial),
            2 => Some(KernelType::Rbf),
            3 => Some(KernelType::Sigmoid),
            4 => Some(KernelType::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Which backend implementation trains the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerBackend {
    /// In-process `linfa-svm` C-SVC.
    #[default]
    Linfa,
    /// External SVMlight `svm_learn` in regression mode.
    SvmLight,
}

impl TrainerBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linfa" => Some(TrainerBackend::Linfa),
            "svmlight" | "svm_light" | "svm-light" => Some(TrainerBackend::SvmLight),
            _ => None,
        }
    }
}

/// Training hyperparameters shared by all backends.
///
/// Defaults follow the classic pedestrian detector setup: a soft margin
/// `C = 0.01`, an epsilon-tube width of 0.1 and a linear kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    #[serde(default = "default_c")]
    pub c: f64,
    #[serde(default)]
    pub kernel: KernelType,
    /// Solver termination tolerance.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Regression epsilon-tube width (SVMlight only).
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Solver iteration limit passed to `svm_learn -#`. The linfa solver
    /// has its own fixed limit and only reports when it is hit.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_degree")]
    pub degree: u32,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_coef0")]
    pub coef0: f64,
}

fn default_c() -> f64 {
    0.01
}

fn default_tolerance() -> f64 {
    1e-3
}

fn default_epsilon() -> f64 {
    0.1
}

pub(crate) fn default_max_iterations() -> u64 {
    100_000
}

fn default_degree() -> u32 {
    3
}

fn default_gamma() -> f64 {
    1.0
}

fn default_coef0() -> f64 {
    1.0
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            c: default_c(),
            kernel: KernelType::default(),
            tolerance: default_tolerance(),
            epsilon: default_epsilon(),
            max_iterations: default_max_iterations(),
            degree: default_degree(),
            gamma: default_gamma(),
            coef0: default_coef0(),
        }
    }
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(TrainError::InvalidHyperparameters(format!(
                "C must be > 0 (got {})",
                self.c
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(TrainError::InvalidHyperparameters(format!(
                "tolerance must be > 0 (got {})",
                self.tolerance
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(TrainError::InvalidHyperparameters(format!(
                "epsilon must be >= 0 (got {})",
                self.epsilon
            )));
        }
        if self.max_iterations == 0 {
            return Err(TrainError::InvalidHyperparameters(
                "max_iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One support vector: signed weight (`alpha * y`) and its sparse features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportVector {
    pub weight: f64,
    pub features: SparseFeatures,
}

/// Anything that can fit a model from a dataset file.
pub trait Trainer {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Backend kind, which decides the model file format.
    fn backend(&self) -> TrainerBackend;

    /// Train on the dataset at `dataset_path`.
    fn fit(&self, dataset_path: &Path) -> Result<Box<dyn TrainedModel>, TrainError>;
}

/// Read-only view of a fitted SVM.
///
/// The decision value of a sample `x` is
/// `sum(weight_i * K(sv_i, x)) - bias()`.
pub trait TrainedModel {
    fn backend(&self) -> &str;
    fn kernel(&self) -> KernelType;
    /// Support vectors in model order.
    fn support_vectors(&self) -> &[SupportVector];
    fn bias(&self) -> f64;
    /// Highest feature index seen during training.
    fn feature_len(&self) -> usize;
    /// Persist in the backend's own format.
    fn save(&self, path: &Path) -> Result<(), TrainError>;
}

/// Errors raised while fitting, loading or saving a model.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Training dataset is empty")]
    EmptyDataset,
    #[error("Training dataset only contains {label} examples")]
    SingleClass { label: Label },
    #[error("Invalid training parameters: {0}")]
    InvalidHyperparameters(String),
    #[error("The {backend} backend does not support the {kernel} kernel")]
    UnsupportedKernel {
        backend: &'static str,
        kernel: KernelType,
    },
    #[error("SVM solver failed: {0}")]
    Solver(String),
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Failed to access model {path}: {source}")]
    ModelIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model JSON {path}: {source}")]
    ModelJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Malformed model {path} at line {line}: {message}")]
    ModelFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Reject datasets no solver can separate before any work starts.
pub fn check_trainable(dataset: &Dataset) -> Result<(), TrainError> {
    if dataset.is_empty() {
        return Err(TrainError::EmptyDataset);
    }
    match dataset.class_counts() {
        (0, _) => Err(TrainError::SingleClass {
            label: Label::Negative,
        }),
        (_, 0) => Err(TrainError::SingleClass {
            label: Label::Positive,
        }),
        _ => Ok(()),
    }
}

/// Construct the configured backend.
///
/// `model_path` is where file-based backends leave their native model.
pub fn build_trainer(
    backend: TrainerBackend,
    params: Hyperparameters,
    svm_learn: &Path,
    model_path: &Path,
) -> Box<dyn Trainer> {
    match backend {
        TrainerBackend::Linfa => Box::new(LinfaTrainer::new(params)),
        TrainerBackend::SvmLight => Box::new(SvmLightTrainer::new(svm_learn, params, model_path)),
    }
}

/// Load a model previously written by [`TrainedModel::save`].
pub fn load_model(backend: TrainerBackend, path: &Path) -> Result<Box<dyn TrainedModel>, TrainError> {
    Ok(match backend {
        TrainerBackend::Linfa => Box::new(SupportVectorModel::load_json(path)?),
        TrainerBackend::SvmLight => Box::new(SvmLightModel::load(path)?),
    })
}

#[cfg(test)]
mod tests;
