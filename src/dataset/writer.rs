use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::catalog::Label;

use super::{Dataset, DatasetError, LabeledExample};

/// Counts reported after a dataset file is finished.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub written: usize,
    pub positives: usize,
    pub negatives: usize,
    /// Examples dropped because they carried no features.
    pub omitted: usize,
}

/// Streaming writer for the sparse dataset format.
///
/// A single writer owns the output file; lines appear in call order.
pub struct DatasetWriter {
    out: BufWriter<File>,
    omit_zeros: bool,
    summary: DatasetSummary,
}

impl DatasetWriter {
    /// Create (truncate) `path`, creating parent directories, and write the
    /// optional provenance comment line.
    pub fn create(path: &Path, comment: Option<&str>) -> Result<Self, DatasetError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatasetError::Create {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| DatasetError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = Self {
            out: BufWriter::new(file),
            omit_zeros: false,
            summary: DatasetSummary {
                path: path.to_path_buf(),
                ..DatasetSummary::default()
            },
        };
        if let Some(comment) = comment {
            let line = comment.replace(['\r', '\n'], " ");
            writer.write_line(format_args!("# {line}"))?;
        }
        Ok(writer)
    }

    /// Drop zero-valued components instead of writing `k:0`.
    pub fn omit_zeros(mut self, omit: bool) -> Self {
        self.omit_zeros = omit;
        self
    }

    /// Append one dense feature vector; an empty vector is skipped.
    ///
    /// Returns whether a line was written.
    pub fn write_features(&mut self, label: Label, features: &[f32]) -> Result<bool, DatasetError> {
        if features.is_empty() {
            self.summary.omitted += 1;
            return Ok(false);
        }
        let omit_zeros = self.omit_zeros;
        let pairs = features
            .iter()
            .enumerate()
            .filter(|(_, value)| !omit_zeros || **value != 0.0)
            .map(|(position, value)| (position + 1, *value));
        self.write_record(label, pairs)?;
        Ok(true)
    }

    /// Append one sparse example; an example without features is skipped.
    pub fn write_example(&mut self, example: &LabeledExample) -> Result<bool, DatasetError> {
        if example.features.is_empty() {
            self.summary.omitted += 1;
            return Ok(false);
        }
        let omit_zeros = self.omit_zeros;
        let pairs = example
            .features
            .iter()
            .filter(|(_, value)| !omit_zeros || *value != 0.0);
        self.write_record(example.label, pairs)?;
        Ok(true)
    }

    /// Flush buffered lines and return the counts.
    pub fn finish(mut self) -> Result<DatasetSummary, DatasetError> {
        let path = self.summary.path.clone();
        self.out
            .flush()
            .map_err(|source| DatasetError::Write { path, source })?;
        Ok(self.summary)
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    fn write_record<I, K, V>(&mut self, label: Label, pairs: I) -> Result<(), DatasetError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: Display,
    {
        let mut line = String::from(label.as_token());
        for (index, value) in pairs {
            line.push(' ');
            line.push_str(&format!("{index}:{value}"));
        }
        self.write_line(format_args!("{line}"))?;
        self.summary.written += 1;
        if label.is_positive() {
            self.summary.positives += 1;
        } else {
            self.summary.negatives += 1;
        }
        Ok(())
    }

    fn write_line(&mut self, line: std::fmt::Arguments<'_>) -> Result<(), DatasetError> {
        writeln!(self.out, "{line}").map_err(|source| DatasetError::Write {
            path: self.summary.path.clone(),
            source,
        })
    }
}

/// Write a whole in-memory dataset to `path`.
pub fn write_dataset(
    path: &Path,
    dataset: &Dataset,
    comment: Option<&str>,
) -> Result<DatasetSummary, DatasetError> {
    let mut writer = DatasetWriter::create(path, comment)?;
    for example in &dataset.examples {
        writer.write_example(example)?;
    }
    writer.finish()
}
