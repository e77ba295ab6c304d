//! Detector evaluation.
//!
//! [`evaluate_training_set`] replays the training images through the
//! detector. It is a sanity check that training converged to something
//! sensible; a detector can score perfectly here and still generalize
//! badly. [`live`] drives the detector over a stream of frames.

pub mod live;

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::detector::WindowDetector;
use crate::features::load_gray;
use crate::progress::{ProgressCallback, progress_tick};

/// Outcome counts of a training-set replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    /// Images that could not be decoded or scanned.
    pub skipped: usize,
}

impl OutcomeTally {
    /// A positive image: the first hit is correct, extra hits count as misses.
    pub fn record_positive(&mut self, hits: usize) {
        if hits > 0 {
            self.true_positives += 1;
            self.false_negatives += hits - 1;
        } else {
            self.false_negatives += 1;
        }
    }

    /// A negative image: every hit is a false alarm.
    pub fn record_negative(&mut self, hits: usize) {
        if hits > 0 {
            self.false_positives += hits;
        } else {
            self.true_negatives += 1;
        }
    }

    /// `TP / (TP + FP)`, `None` without any positive call.
    pub fn precision(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// `TP / (TP + FN)`.
    pub fn recall(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// `(TP + TN) / (TP + TN + FP + FN)`.
    pub fn accuracy(&self) -> Option<f64> {
        ratio(
            self.true_positives + self.true_negatives,
            self.true_positives + self.true_negatives + self.false_positives + self.false_negatives,
        )
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| format!("{value:.4}"))
}

impl fmt::Display for OutcomeTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results:")?;
        writeln!(f, "  true positives:  {}", self.true_positives)?;
        writeln!(f, "  true negatives:  {}", self.true_negatives)?;
        writeln!(f, "  false positives: {}", self.false_positives)?;
        writeln!(f, "  false negatives: {}", self.false_negatives)?;
        if self.skipped > 0 {
            writeln!(f, "  skipped images:  {}", self.skipped)?;
        }
        writeln!(f, "  precision: {}", format_ratio(self.precision()))?;
        writeln!(f, "  recall:    {}", format_ratio(self.recall()))?;
        write!(f, "  accuracy:  {}", format_ratio(self.accuracy()))
    }
}

/// Run `detector` over every training image and tally the outcomes.
///
/// Each image is scanned at its native scale. Images that cannot be
/// decoded are logged and counted as skipped.
pub fn evaluate_training_set(
    detector: &dyn WindowDetector,
    positives: &[PathBuf],
    negatives: &[PathBuf],
    mut progress: ProgressCallback<'_>,
) -> OutcomeTally {
    let mut tally = OutcomeTally::default();
    let total = positives.len() + negatives.len();
    let labelled = positives
        .iter()
        .map(|path| (path, true))
        .chain(negatives.iter().map(|path| (path, false)));
    for (processed, (path, positive)) in labelled.enumerate() {
        let hits = load_gray(path).and_then(|image| detector.detect(&image));
        match hits {
            Ok(hits) if positive => tally.record_positive(hits.len()),
            Ok(hits) => tally.record_negative(hits.len()),
            Err(err) => {
                warn!("Skipping {} during evaluation: {err}", path.display());
                tally.skipped += 1;
            }
        }
        progress_tick(&mut progress, "evaluate", processed + 1, total, tally.skipped);
    }
    info!(
        "Training-set check: TP={} TN={} FP={} FN={} skipped={}",
        tally.true_positives,
        tally.true_negatives,
        tally.false_positives,
        tally.false_negatives,
        tally.skipped
    );
    tally
}
