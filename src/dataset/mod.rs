//! Sparse text dataset bridging feature extraction and the trainers.
//!
//! One example per line, SVMlight style:
//!
//! ```text
//! # provenance comment (optional, ignored by the reader)
//! +1 1:0.25 2:0.5 3:0.125
//! -1 1:0.75 3:0.0625
//! ```
//!
//! Indices are 1-based and strictly increasing within a line; omitted
//! indices mean zero.

mod reader;
mod sparse;
mod writer;

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::Label;

pub(crate) use reader::parse_features;
pub use reader::{parse_dataset, read_dataset};
pub use sparse::SparseFeatures;
pub use writer::{DatasetSummary, DatasetWriter, write_dataset};

/// One signed training record.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledExample {
    pub label: Label,
    pub features: SparseFeatures,
}

/// Ordered sequence of labeled examples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub examples: Vec<LabeledExample>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Number of positive and negative examples.
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self
            .examples
            .iter()
            .filter(|example| example.label.is_positive())
            .count();
        (positives, self.examples.len() - positives)
    }

    /// Highest feature index used by any example (the implied dimension).
    pub fn max_index(&self) -> u32 {
        self.examples
            .iter()
            .filter_map(|example| example.features.max_index())
            .max()
            .unwrap_or(0)
    }
}

/// Reason a dataset line was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("missing label")]
    MissingLabel,
    #[error("invalid label '{0}' (expected +1 or -1)")]
    InvalidLabel(String),
    #[error("malformed feature token '{0}' (expected index:value)")]
    MalformedPair(String),
    #[error("invalid feature index '{0}'")]
    InvalidIndex(String),
    #[error("feature index 0 (indices are 1-based)")]
    ZeroIndex,
    #[error("feature index {index} does not increase (previous {previous})")]
    NonIncreasingIndex { previous: u32, index: u32 },
    #[error("invalid feature value '{0}'")]
    InvalidValue(String),
}

/// Errors raised while writing or reading a dataset file.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Error opening file '{path}' for writing: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write dataset {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path} at line {line}: {source}")]
    Read {
        path: PathBuf,
        line: usize,
        source: std::io::Error,
    },
    #[error("Wrong input format in {path} at line {line}: {kind}")]
    Parse {
        path: PathBuf,
        line: usize,
        kind: ParseErrorKind,
    },
}

#[cfg(test)]
mod tests;
