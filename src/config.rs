//! Pipeline configuration loaded from TOML.
//!
//! Config keys: `samples`, `output`, `hog`, `trainer`, `detection`. Every
//! field has a default, so a partial (or missing) file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::catalog::DEFAULT_IMAGE_EXTENSIONS;
use crate::detector::{BiasLayout, DetectionParams};
use crate::features::HogParams;
use crate::trainer::{Hyperparameters, TrainerBackend};

/// File name of the user-level config inside the `.hogtrain` folder.
pub const CONFIG_FILE_NAME: &str = "hogtrain.toml";

/// Where training samples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSettings {
    #[serde(default = "default_positive_dir")]
    pub positive_dir: PathBuf,
    #[serde(default = "default_negative_dir")]
    pub negative_dir: PathBuf,
    /// Accepted extensions, matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_positive_dir() -> PathBuf {
    PathBuf::from("pos")
}

fn default_negative_dir() -> PathBuf {
    PathBuf::from("neg")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            positive_dir: default_positive_dir(),
            negative_dir: default_negative_dir(),
            extensions: default_extensions(),
        }
    }
}

/// Generated files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_features_file")]
    pub features_file: PathBuf,
    /// Trained model; defaults depend on the backend.
    #[serde(default)]
    pub model_file: Option<PathBuf>,
    #[serde(default = "default_detector_file")]
    pub detector_file: PathBuf,
    #[serde(default)]
    pub bias_layout: BiasLayout,
    /// Drop zero-valued components from the dataset file.
    #[serde(default)]
    pub omit_zeros: bool,
}

fn default_features_file() -> PathBuf {
    PathBuf::from("genfiles/features.dat")
}

fn default_detector_file() -> PathBuf {
    PathBuf::from("genfiles/descriptorvector.dat")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            features_file: default_features_file(),
            model_file: None,
            detector_file: default_detector_file(),
            bias_layout: BiasLayout::default(),
            omit_zeros: false,
        }
    }
}

impl OutputSettings {
    /// Model path, falling back to the backend's conventional name.
    pub fn model_path(&self, backend: TrainerBackend) -> PathBuf {
        if let Some(path) = &self.model_file {
            return path.clone();
        }
        let dir = self
            .features_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match backend {
            TrainerBackend::Linfa => dir.join("svmmodel.json"),
            TrainerBackend::SvmLight => dir.join("svmlightmodel.dat"),
        }
    }

    /// Move every generated file into `dir`, keeping file names.
    pub fn relocate(&mut self, dir: &Path) {
        fn moved(dir: &Path, path: &Path) -> PathBuf {
            match path.file_name() {
                Some(name) => dir.join(name),
                None => dir.to_path_buf(),
            }
        }
        self.features_file = moved(dir, &self.features_file);
        self.detector_file = moved(dir, &self.detector_file);
        if let Some(model) = &self.model_file {
            self.model_file = Some(moved(dir, model));
        }
    }
}

/// Training backend selection plus its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSettings {
    #[serde(default)]
    pub backend: TrainerBackend,
    /// `svm_learn` executable for the SVMlight backend.
    #[serde(default = "default_svm_learn")]
    pub svm_learn: PathBuf,
    #[serde(flatten)]
    pub params: Hyperparameters,
}

fn default_svm_learn() -> PathBuf {
    PathBuf::from("svm_learn")
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            backend: TrainerBackend::default(),
            svm_learn: default_svm_learn(),
            params: Hyperparameters::default(),
        }
    }
}

/// Detection and evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    #[serde(flatten)]
    pub params: DetectionParams,
    /// Replay the training images through the new detector.
    #[serde(default = "default_true")]
    pub evaluate_training_set: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            params: DetectionParams::default(),
            evaluate_training_set: true,
        }
    }
}

/// Aggregate pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub samples: SampleSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub hog: HogParams,
    #[serde(default)]
    pub trainer: TrainerSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

/// `<config dir>/.hogtrain/hogtrain.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

impl PipelineConfig {
    /// Load `path`, returning defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config atomically as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = toml::to_string_pretty(self).map_err(|source| ConfigError::SerializeToml {
            path: path.to_path_buf(),
            source,
        })?;
        crate::atomic_file::write_atomic(path, data.as_bytes()).map_err(|source| {
            ConfigError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "samples.extensions must list at least one extension".to_string(),
            ));
        }
        if self.hog.window_width == 0 || self.hog.window_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "hog window must be non-empty (got {})",
                self.hog.window()
            )));
        }
        if self.hog.cell_side == 0 || self.hog.block_side == 0 || self.hog.block_stride == 0 {
            return Err(ConfigError::Invalid(
                "hog cell_side, block_side and block_stride must be > 0".to_string(),
            ));
        }
        let detection = &self.detection.params;
        if detection.stride_x == 0 || detection.stride_y == 0 {
            return Err(ConfigError::Invalid(
                "detection strides must be > 0".to_string(),
            ));
        }
        if !(detection.scale_step > 1.0) {
            return Err(ConfigError::Invalid(format!(
                "detection.scale_step must be > 1 (got {})",
                detection.scale_step
            )));
        }
        self.trainer
            .params
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::KernelType;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.samples.positive_dir, PathBuf::from("pos"));
        assert_eq!(config.samples.extensions, ["jpg", "png", "ppm"]);
        assert_eq!(config.trainer.params.c, 0.01);
        assert_eq!(config.hog.window(), crate::features::WindowSize::new(64, 128));
        assert_eq!(config.detection.params.stride_x, 8);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hogtrain.toml");
        std::fs::write(
            &path,
            "[trainer]\nbackend = \"svm_light\"\nc = 0.5\n\n[output]\nbias_layout = \"appended\"\n",
        )
        .unwrap();
        let config = PipelineConfig::load_or_default(&path).unwrap();
        assert_eq!(config.trainer.backend, TrainerBackend::SvmLight);
        assert_eq!(config.trainer.params.c, 0.5);
        assert_eq!(config.trainer.params.kernel, KernelType::Linear);
        assert_eq!(config.trainer.params.epsilon, 0.1);
        assert_eq!(config.output.bias_layout, BiasLayout::Appended);
        assert_eq!(
            config.output.model_path(config.trainer.backend),
            PathBuf::from("genfiles/svmlightmodel.dat")
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hogtrain.toml");
        let mut config = PipelineConfig::default();
        config.samples.positive_dir = PathBuf::from("/data/pos");
        config.detection.params.hit_threshold = 0.25;
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = PipelineConfig::default();
        config.trainer.params.c = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.samples.extensions.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.detection.params.stride_y = 0;
        assert!(config.validate().is_err());

        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[hog]\nwindow_width = 0\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_or_default(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn relocate_keeps_file_names() {
        let mut output = OutputSettings::default();
        output.relocate(Path::new("/tmp/run"));
        assert_eq!(output.features_file, PathBuf::from("/tmp/run/features.dat"));
        assert_eq!(
            output.model_path(TrainerBackend::Linfa),
            PathBuf::from("/tmp/run/svmmodel.json")
        );
    }
}
