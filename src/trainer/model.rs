use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{KernelType, SupportVector, TrainError, TrainedModel};

/// Current JSON layout version.
pub const MODEL_VERSION: i64 = 1;

/// Backend-neutral support-vector model, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorModel {
    /// Model format version.
    pub model_version: i64,
    /// Backend that produced the model.
    pub backend: String,
    pub kernel: KernelType,
    /// Highest feature index seen during training.
    pub feature_len: usize,
    /// Subtracted from the kernel expansion to get the decision value.
    pub bias: f64,
    pub support_vectors: Vec<SupportVector>,
}

impl SupportVectorModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_version != MODEL_VERSION {
            return Err(format!(
                "Unsupported model_version {} (expected {MODEL_VERSION})",
                self.model_version
            ));
        }
        if !self.bias.is_finite() {
            return Err("bias must be finite".to_string());
        }
        for (idx, sv) in self.support_vectors.iter().enumerate() {
            if !sv.weight.is_finite() {
                return Err(format!("support vector {idx} has a non-finite weight"));
            }
        }
        Ok(())
    }

    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, TrainError> {
        let bytes = std::fs::read(path).map_err(|source| TrainError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|source| TrainError::ModelJson {
            path: path.to_path_buf(),
            source,
        })?;
        model.validate().map_err(|message| TrainError::ModelFormat {
            path: path.to_path_buf(),
            line: 0,
            message,
        })?;
        Ok(model)
    }

    /// Save the model as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<(), TrainError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| TrainError::ModelJson {
            path: path.to_path_buf(),
            source,
        })?;
        crate::atomic_file::write_atomic(path, &json).map_err(|source| TrainError::ModelIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl TrainedModel for SupportVectorModel {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn kernel(&self) -> KernelType {
        self.kernel
    }

    fn support_vectors(&self) -> &[SupportVector] {
        &self.support_vectors
    }

    fn bias(&self) -> f64 {
        self.bias
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn save(&self, path: &Path) -> Result<(), TrainError> {
        self.save_json(path)
    }
}
