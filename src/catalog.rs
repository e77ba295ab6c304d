//! Sample catalog: labeled image files from positive/negative directories.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default accepted image extensions (lowercase, without dots).
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "png", "ppm"];

/// Class of a training sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Signed encoding used by the dataset format and the trainers.
    pub fn sign(self) -> i8 {
        match self {
            Label::Positive => 1,
            Label::Negative => -1,
        }
    }

    /// Token written at the start of a dataset line.
    pub fn as_token(self) -> &'static str {
        match self {
            Label::Positive => "+1",
            Label::Negative => "-1",
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Label::Positive)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
        })
    }
}

/// A labeled image file found by a catalog scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: Label,
}

/// Result of scanning one sample directory.
#[derive(Clone, Debug, Default)]
pub struct SampleDirectory {
    /// Directory that was scanned.
    pub dir: PathBuf,
    /// Matching files, sorted by path.
    pub files: Vec<PathBuf>,
    /// Regular files rejected by the extension filter.
    pub skipped: usize,
    /// False when the directory could not be opened.
    pub readable: bool,
}

/// Return true when `file_name` ends in one of `extensions` (case-insensitive).
///
/// The extension is the text after the last `.`; names without a dot never
/// match.
pub fn has_accepted_extension(file_name: &str, extensions: &[String]) -> bool {
    let Some((_, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    extensions
        .iter()
        .any(|accepted| ext.eq_ignore_ascii_case(accepted))
}

/// List files in `dir` whose extension is in `extensions`.
///
/// Subdirectories and dot-files are skipped. An unreadable directory yields an
/// empty listing with `readable == false`; a class without samples is valid.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> SampleDirectory {
    tracing::info!("Opening directory {}", dir.display());
    let mut listing = SampleDirectory {
        dir: dir.to_path_buf(),
        ..SampleDirectory::default()
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!("Error opening directory '{}': {err}", dir.display());
            return listing;
        }
    };
    listing.readable = true;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("Skipping unreadable entry in '{}': {err}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        if has_accepted_extension(&file_name, extensions) {
            tracing::debug!("Found matching data file '{file_name}'");
            listing.files.push(path);
        } else {
            tracing::debug!("Found file does not match required file type, skipping: '{file_name}'");
            listing.skipped += 1;
        }
    }
    listing.files.sort();
    tracing::info!(
        "Directory {}: {} matching files, {} skipped",
        dir.display(),
        listing.files.len(),
        listing.skipped
    );
    listing
}

/// Positive and negative sample files for one training run.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub positives: SampleDirectory,
    pub negatives: SampleDirectory,
}

impl Catalog {
    /// Scan both sample directories with the same extension allow-list.
    pub fn scan(positive_dir: &Path, negative_dir: &Path, extensions: &[String]) -> Self {
        Self {
            positives: scan_directory(positive_dir, extensions),
            negatives: scan_directory(negative_dir, extensions),
        }
    }

    /// Total number of matching files across both classes.
    pub fn total(&self) -> usize {
        self.positives.files.len() + self.negatives.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Labeled samples in processing order: positives first, then negatives.
    pub fn samples(&self) -> Vec<Sample> {
        let positives = self.positives.files.iter().map(|path| Sample {
            path: path.clone(),
            label: Label::Positive,
        });
        let negatives = self.negatives.files.iter().map(|path| Sample {
            path: path.clone(),
            label: Label::Negative,
        });
        positives.chain(negatives).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn filters_by_extension_case_insensitively() {
        let dir = tempdir().unwrap();
        for name in ["a.JPG", "b.png", "c.txt", "d"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let listing = scan_directory(dir.path(), &exts(&["jpg", "png"]));
        let names: Vec<String> = listing
            .files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG".to_string(), "b.png".to_string()]);
        assert_eq!(listing.skipped, 2);
        assert!(listing.readable);
    }

    #[test]
    fn skips_subdirectories_and_dot_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::write(dir.path().join(".hidden.png"), b"x").unwrap();
        fs::write(dir.path().join("keep.ppm"), b"x").unwrap();
        let listing = scan_directory(dir.path(), &exts(&["png", "ppm"]));
        assert_eq!(listing.files, vec![dir.path().join("keep.ppm")]);
    }

    #[test]
    fn missing_directory_is_empty_not_fatal() {
        let dir = tempdir().unwrap();
        let listing = scan_directory(&dir.path().join("absent"), &exts(&["png"]));
        assert!(listing.files.is_empty());
        assert!(!listing.readable);
    }

    #[test]
    fn extension_is_text_after_last_dot() {
        let accepted = exts(&["jpg"]);
        assert!(has_accepted_extension("frame.0001.JpG", &accepted));
        assert!(!has_accepted_extension("jpg", &accepted));
        assert!(!has_accepted_extension("photo.jpg.bak", &accepted));
    }

    #[test]
    fn samples_list_positives_before_negatives() {
        let pos = tempdir().unwrap();
        let neg = tempdir().unwrap();
        fs::write(pos.path().join("p2.png"), b"x").unwrap();
        fs::write(pos.path().join("p1.png"), b"x").unwrap();
        fs::write(neg.path().join("n1.png"), b"x").unwrap();
        let catalog = Catalog::scan(pos.path(), neg.path(), &exts(&["png"]));
        let samples = catalog.samples();
        assert_eq!(catalog.total(), 3);
        assert_eq!(samples[0].path, pos.path().join("p1.png"));
        assert_eq!(samples[1].path, pos.path().join("p2.png"));
        assert_eq!(samples[2].label, Label::Negative);
    }
}
