//! Detector vector file plus its JSON manifest.
//!
//! The vector file is a single line of space-separated numbers. With
//! [`BiasLayout::Separate`] it holds the `D` weights only; with
//! [`BiasLayout::Appended`] a final `-bias` follows, so that
//! `dot([w, -bias], [x, 1])` is the score. `<file>.json` records the
//! layout, dimension and bias so loaders never have to guess.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::atomic_file::write_atomic;
use crate::features::WindowSize;

use super::LinearDetector;

/// Score formula recorded in every manifest.
pub const SCORE_CONVENTION: &str = "dot(w, x) - bias";

const MANIFEST_VERSION: i64 = 1;

/// Where the bias lives relative to the weights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasLayout {
    /// Weights only; bias kept in the manifest.
    #[default]
    Separate,
    /// Weights followed by `-bias`.
    Appended,
}

impl BiasLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "separate" => Some(BiasLayout::Separate),
            "appended" | "append" => Some(BiasLayout::Appended),
            _ => None,
        }
    }
}

/// Sidecar metadata written next to the vector file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorManifest {
    pub manifest_version: i64,
    pub dimension: usize,
    pub bias: f64,
    pub bias_layout: BiasLayout,
    pub score_convention: String,
    #[serde(default)]
    pub window: Option<WindowSize>,
}

#[derive(Debug, Error)]
pub enum DetectorFileError {
    #[error("Error while writing detector file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read detector file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid detector manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid number '{token}' at position {position} in {path}")]
    Parse {
        path: PathBuf,
        position: usize,
        token: String,
    },
    #[error("Detector file {path} holds {actual} values, expected {expected}")]
    DimensionMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

/// `<vector file>.json`.
pub fn manifest_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Write the detector vector and its manifest.
pub fn save_detector(
    path: &Path,
    detector: &LinearDetector,
    layout: BiasLayout,
    window: Option<WindowSize>,
) -> Result<DetectorManifest, DetectorFileError> {
    let mut line = String::new();
    for (idx, weight) in detector.weights().iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{weight}");
    }
    if layout == BiasLayout::Appended {
        if !line.is_empty() {
            line.push(' ');
        }
        let _ = write!(line, "{}", -detector.bias());
    }
    line.push('\n');
    write_atomic(path, line.as_bytes()).map_err(|source| DetectorFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    let manifest = DetectorManifest {
        manifest_version: MANIFEST_VERSION,
        dimension: detector.dimension(),
        bias: detector.bias(),
        bias_layout: layout,
        score_convention: SCORE_CONVENTION.to_string(),
        window,
    };
    let sidecar = manifest_path(path);
    let json = serde_json::to_vec_pretty(&manifest).map_err(|source| {
        DetectorFileError::Manifest {
            path: sidecar.clone(),
            source,
        }
    })?;
    write_atomic(&sidecar, &json).map_err(|source| DetectorFileError::Write {
        path: sidecar.clone(),
        source,
    })?;
    info!(
        "Wrote {}-dimensional detector to {} ({layout:?} bias)",
        detector.dimension(),
        path.display()
    );
    Ok(manifest)
}

/// Load a detector written by [`save_detector`].
///
/// Without a manifest the layout is inferred from `expected_dimension`:
/// `D` values are weights with zero bias, `D + 1` carry an appended `-bias`.
pub fn load_detector(
    path: &Path,
    expected_dimension: Option<usize>,
) -> Result<LinearDetector, DetectorFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| DetectorFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut values = Vec::new();
    for (position, token) in text.split_whitespace().enumerate() {
        let value: f64 = token.parse().map_err(|_| DetectorFileError::Parse {
            path: path.to_path_buf(),
            position,
            token: token.to_string(),
        })?;
        values.push(value);
    }

    let manifest = read_manifest(path)?;
    let (dimension, layout, manifest_bias) = match &manifest {
        Some(manifest) => (manifest.dimension, manifest.bias_layout, Some(manifest.bias)),
        None => {
            let dimension = expected_dimension.unwrap_or(values.len());
            let layout = if values.len() == dimension + 1 {
                BiasLayout::Appended
            } else {
                BiasLayout::Separate
            };
            warn!(
                "No manifest next to {}, assuming {layout:?} bias layout",
                path.display()
            );
            (dimension, layout, None)
        }
    };
    if let Some(expected) = expected_dimension
        && expected != dimension
    {
        return Err(DetectorFileError::DimensionMismatch {
            path: path.to_path_buf(),
            expected,
            actual: dimension,
        });
    }
    let stored = match layout {
        BiasLayout::Separate => dimension,
        BiasLayout::Appended => dimension + 1,
    };
    if values.len() != stored {
        return Err(DetectorFileError::DimensionMismatch {
            path: path.to_path_buf(),
            expected: stored,
            actual: values.len(),
        });
    }

    let bias = match layout {
        BiasLayout::Appended => -values[dimension],
        BiasLayout::Separate => manifest_bias.unwrap_or(0.0),
    };
    let weights = values[..dimension].iter().map(|v| *v as f32).collect();
    Ok(LinearDetector::new(weights, bias))
}

fn read_manifest(path: &Path) -> Result<Option<DetectorManifest>, DetectorFileError> {
    let sidecar = manifest_path(path);
    let bytes = match std::fs::read(&sidecar) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DetectorFileError::Read {
                path: sidecar,
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| DetectorFileError::Manifest {
            path: sidecar,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn detector() -> LinearDetector {
        LinearDetector::new(vec![0.5, -3.0, 0.25], 1.5)
    }

    #[test]
    fn separate_layout_writes_weights_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genfiles").join("descriptorvector.dat");
        let manifest =
            save_detector(&path, &detector(), BiasLayout::Separate, None).unwrap();
        assert_eq!(manifest.dimension, 3);
        assert_eq!(manifest.score_convention, SCORE_CONVENTION);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.5 -3 0.25\n");
        assert_eq!(load_detector(&path, Some(3)).unwrap(), detector());
    }

    #[test]
    fn appended_layout_stores_negated_bias() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptorvector.dat");
        save_detector(&path, &detector(), BiasLayout::Appended, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.5 -3 0.25 -1.5\n");
        assert_eq!(load_detector(&path, None).unwrap(), detector());
    }

    #[test]
    fn infers_layout_without_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptorvector.dat");
        save_detector(&path, &detector(), BiasLayout::Appended, None).unwrap();
        std::fs::remove_file(manifest_path(&path)).unwrap();
        assert_eq!(load_detector(&path, Some(3)).unwrap(), detector());

        let plain = load_detector(&path, None).unwrap();
        assert_eq!(plain.dimension(), 4);
        assert_eq!(plain.bias(), 0.0);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptorvector.dat");
        save_detector(&path, &detector(), BiasLayout::Separate, None).unwrap();
        assert!(matches!(
            load_detector(&path, Some(3780)),
            Err(DetectorFileError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_tokens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptorvector.dat");
        std::fs::write(&path, "0.5 abc\n").unwrap();
        assert!(matches!(
            load_detector(&path, None),
            Err(DetectorFileError::Parse { position: 1, .. })
        ));
    }
}
