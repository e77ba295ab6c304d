//! Trains a HOG linear detector from positive and negative sample folders.

use std::path::PathBuf;

use hogtrain::config::{PipelineConfig, default_config_path};
use hogtrain::detector::BiasLayout;
use hogtrain::features::HogExtractor;
use hogtrain::logging;
use hogtrain::pipeline::{Pipeline, PipelineOutcome};
use hogtrain::progress::PipelineProgress;
use hogtrain::trainer::{TrainerBackend, build_trainer};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let config_path = match &options.config {
        Some(path) => path.clone(),
        None => default_config_path().map_err(|err| err.to_string())?,
    };
    let mut config = PipelineConfig::load_or_default(&config_path).map_err(|err| err.to_string())?;
    options.apply(&mut config);
    config.validate().map_err(|err| err.to_string())?;

    let extractor = HogExtractor::new(config.hog.clone()).map_err(|err| err.to_string())?;
    let model_path = config.output.model_path(config.trainer.backend);
    let trainer = build_trainer(
        config.trainer.backend,
        config.trainer.params.clone(),
        &config.trainer.svm_learn,
        &model_path,
    );

    let mut last_stage = "";
    let mut report_progress = |update: PipelineProgress| {
        if update.stage != last_stage || update.processed == update.total {
            println!(
                "{}: {}/{} ({} skipped)",
                update.stage, update.processed, update.total, update.skipped
            );
            last_stage = update.stage;
        }
    };
    let pipeline = Pipeline::new(&config, &extractor, trainer.as_ref());
    let outcome = pipeline
        .run(Some(&mut report_progress))
        .map_err(|err| err.to_string())?;

    match outcome {
        PipelineOutcome::NothingToDo => {
            println!("No training sample files found, nothing to do!");
        }
        PipelineOutcome::Trained(report) => {
            println!(
                "samples: {} positive, {} negative, {} skipped",
                report.positives, report.negatives, report.skipped_samples
            );
            println!(
                "dataset: {} examples in {}",
                report.dataset.written,
                report.dataset.path.display()
            );
            println!("model: {}", report.model_path.display());
            println!(
                "detector: {} ({} weights, bias {}, {} support vectors)",
                report.detector_path.display(),
                report.manifest.dimension,
                report.manifest.bias,
                report.support_vectors
            );
            if report.skipped_components > 0 {
                println!(
                    "warning: {} support-vector components were outside the descriptor",
                    report.skipped_components
                );
            }
            if let Some(tally) = &report.tally {
                println!("Training-set check (not a measure of detection quality):");
                println!("{tally}");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    positive_dir: Option<PathBuf>,
    negative_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    backend: Option<TrainerBackend>,
    svm_learn: Option<PathBuf>,
    c: Option<f64>,
    bias_layout: Option<BiasLayout>,
    no_eval: bool,
}

impl CliOptions {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.positive_dir {
            config.samples.positive_dir = dir.clone();
        }
        if let Some(dir) = &self.negative_dir {
            config.samples.negative_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.output.relocate(dir);
        }
        if let Some(backend) = self.backend {
            config.trainer.backend = backend;
        }
        if let Some(path) = &self.svm_learn {
            config.trainer.svm_learn = path.clone();
        }
        if let Some(c) = self.c {
            config.trainer.params.c = c;
        }
        if let Some(layout) = self.bias_layout {
            config.output.bias_layout = layout;
        }
        if self.no_eval {
            config.detection.evaluate_training_set = false;
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--pos" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--pos requires a value".to_string())?;
                options.positive_dir = Some(PathBuf::from(value));
            }
            "--neg" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--neg requires a value".to_string())?;
                options.negative_dir = Some(PathBuf::from(value));
            }
            "--out-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out-dir requires a value".to_string())?;
                options.out_dir = Some(PathBuf::from(value));
            }
            "--backend" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--backend requires a value".to_string())?;
                options.backend = Some(
                    TrainerBackend::parse(value)
                        .ok_or_else(|| format!("Invalid --backend value: {value}"))?,
                );
            }
            "--svm-learn" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--svm-learn requires a value".to_string())?;
                options.svm_learn = Some(PathBuf::from(value));
            }
            "--c" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--c requires a value".to_string())?;
                options.c = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --c value: {value}"))?,
                );
            }
            "--bias-layout" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--bias-layout requires a value".to_string())?;
                options.bias_layout = Some(
                    BiasLayout::parse(value)
                        .ok_or_else(|| format!("Invalid --bias-layout value: {value}"))?,
                );
            }
            "--no-eval" => {
                options.no_eval = true;
            }
            other => return Err(format!("Unknown argument: {other}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "hogtrain",
        "",
        "Extracts HOG features from sample images, trains a linear SVM and writes a",
        "single detector vector usable by a sliding-window detector.",
        "",
        "Usage:",
        "  hogtrain [--pos <dir>] [--neg <dir>] [options]",
        "",
        "Options:",
        "  --config <file>        TOML config (default: <config dir>/.hogtrain/hogtrain.toml).",
        "  --pos <dir>            Positive sample folder (default: pos/).",
        "  --neg <dir>            Negative sample folder (default: neg/).",
        "  --out-dir <dir>        Folder for generated files (default: genfiles/).",
        "  --backend <name>       linfa or svmlight (default: linfa).",
        "  --svm-learn <path>     svm_learn executable for the svmlight backend.",
        "  --c <f64>              Soft-margin constant C (default: 0.01).",
        "  --bias-layout <name>   separate or appended (default: separate).",
        "  --no-eval              Skip the training-set check.",
    ]
    .join("\n")
}
