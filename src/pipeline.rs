//! End-to-end training run: catalog, features, dataset, fit, synthesis,
//! optional training-set check.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::dataset::{DatasetError, DatasetSummary, DatasetWriter};
use crate::detector::{
    DetectorFileError, DetectorManifest, DimensionMismatch, SlidingWindowDetector,
    SynthesisError, save_detector, synthesize,
};
use crate::eval::{OutcomeTally, evaluate_training_set};
use crate::features::FeatureExtractor;
use crate::locale;
use crate::progress::{PipelineProgress, ProgressCallback, progress_tick};
use crate::trainer::{TrainError, Trainer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    DetectorFile(#[from] DetectorFileError),
    #[error("Synthesized detector does not fit the feature extractor: {0}")]
    Detector(#[from] DimensionMismatch),
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub positives: usize,
    pub negatives: usize,
    /// Samples whose features could not be extracted.
    pub skipped_samples: usize,
    pub dataset: DatasetSummary,
    pub model_path: PathBuf,
    pub support_vectors: usize,
    /// Support-vector components that fell outside the descriptor.
    pub skipped_components: usize,
    pub detector_path: PathBuf,
    pub manifest: DetectorManifest,
    pub tally: Option<OutcomeTally>,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// No sample files were found; nothing was written.
    NothingToDo,
    Trained(Box<TrainingReport>),
}

/// One configured training run.
///
/// The extractor and trainer are borrowed so callers decide which
/// implementations back a run.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    extractor: &'a dyn FeatureExtractor,
    trainer: &'a dyn Trainer,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        extractor: &'a dyn FeatureExtractor,
        trainer: &'a dyn Trainer,
    ) -> Self {
        Self {
            config,
            extractor,
            trainer,
        }
    }

    pub fn run(&self, mut progress: ProgressCallback<'_>) -> Result<PipelineOutcome, PipelineError> {
        let samples = &self.config.samples;
        let catalog = Catalog::scan(&samples.positive_dir, &samples.negative_dir, &samples.extensions);
        if catalog.is_empty() {
            info!("No training sample files found, nothing to do!");
            return Ok(PipelineOutcome::NothingToDo);
        }
        if !locale::pin_numeric_locale() {
            warn!("Could not switch the numeric locale to {}", locale::NUMERIC_LOCALE);
        }

        let (dataset, skipped_samples) = self.write_features(&catalog, &mut progress)?;

        let output = &self.config.output;
        let backend = self.trainer.backend();
        if backend != self.config.trainer.backend {
            warn!(
                "Configured backend {:?} differs from the supplied {} trainer; saving a {backend:?} model",
                self.config.trainer.backend,
                self.trainer.name()
            );
        }
        info!("Training SVM with {}", self.trainer.name());
        let model = self.trainer.fit(&output.features_file)?;
        let model_path = output.model_path(backend);
        model.save(&model_path)?;
        info!("Saved model to {}", model_path.display());

        let dimension = self.extractor.feature_len();
        let synthesis = synthesize(model.as_ref(), dimension)?;
        let manifest = save_detector(
            &output.detector_file,
            &synthesis.detector,
            output.bias_layout,
            Some(self.extractor.window()),
        )?;

        let tally = if self.config.detection.evaluate_training_set {
            let detector = SlidingWindowDetector::new(
                synthesis.detector.clone(),
                self.extractor,
                self.config.detection.params.clone(),
            )?;
            let tally = evaluate_training_set(
                &detector,
                &catalog.positives.files,
                &catalog.negatives.files,
                progress
                    .as_deref_mut()
                    .map(|callback| callback as &mut dyn FnMut(PipelineProgress)),
            );
            Some(tally)
        } else {
            None
        };

        Ok(PipelineOutcome::Trained(Box::new(TrainingReport {
            positives: catalog.positives.files.len(),
            negatives: catalog.negatives.files.len(),
            skipped_samples,
            dataset,
            model_path,
            support_vectors: synthesis.support_vectors,
            skipped_components: synthesis.skipped_components,
            detector_path: output.detector_file.clone(),
            manifest,
            tally,
        })))
    }

    fn write_features(
        &self,
        catalog: &Catalog,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<(DatasetSummary, usize), PipelineError> {
        let output = &self.config.output;
        let window = self.extractor.window();
        let comment = format!(
            "hogtrain features: {} positive, {} negative samples, window {window}, {} features per sample",
            catalog.positives.files.len(),
            catalog.negatives.files.len(),
            self.extractor.feature_len()
        );
        let mut writer =
            DatasetWriter::create(&output.features_file, Some(&comment))?.omit_zeros(output.omit_zeros);
        info!(
            "Reading files, generating HOG features and saving them to {}",
            output.features_file.display()
        );

        let samples = catalog.samples();
        let total = samples.len();
        let mut skipped = 0usize;
        for (idx, sample) in samples.iter().enumerate() {
            match self.extractor.extract(&sample.path) {
                Ok(features) => {
                    writer.write_features(sample.label, &features)?;
                }
                Err(err) => {
                    skipped += 1;
                    warn!(
                        "Skipping {} sample {}: {err}",
                        sample.label,
                        sample.path.display()
                    );
                }
            }
            progress_tick(progress, "features", idx + 1, total, skipped);
        }
        let summary = writer.finish()?;
        info!(
            "Wrote {} examples ({} positive, {} negative), {skipped} samples skipped",
            summary.written, summary.positives, summary.negatives
        );
        Ok((summary, skipped))
    }
}
