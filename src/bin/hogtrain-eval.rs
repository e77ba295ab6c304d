//! Replays labeled sample folders through a saved detector vector.

use std::path::PathBuf;

use hogtrain::catalog::Catalog;
use hogtrain::config::{PipelineConfig, default_config_path};
use hogtrain::detector::{SlidingWindowDetector, load_detector};
use hogtrain::eval::evaluate_training_set;
use hogtrain::features::{FeatureExtractor, HogExtractor};
use hogtrain::logging;

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
    if let Some(dir) = options.positive_dir {
        config.samples.positive_dir = dir;
    }
    if let Some(dir) = options.negative_dir {
        config.samples.negative_dir = dir;
    }
    if let Some(threshold) = options.hit_threshold {
        config.detection.params.hit_threshold = threshold;
    }
    let detector_path = options
        .detector
        .unwrap_or_else(|| config.output.detector_file.clone());

    let extractor = HogExtractor::new(config.hog.clone()).map_err(|err| err.to_string())?;
    let detector = load_detector(&detector_path, Some(extractor.feature_len()))
        .map_err(|err| err.to_string())?;
    let detector = SlidingWindowDetector::new(detector, extractor, config.detection.params.clone())
        .map_err(|err| err.to_string())?;

    let samples = &config.samples;
    let catalog = Catalog::scan(&samples.positive_dir, &samples.negative_dir, &samples.extensions);
    if catalog.is_empty() {
        return Err("No sample files found, nothing to evaluate".to_string());
    }
    let tally = evaluate_training_set(
        &detector,
        &catalog.positives.files,
        &catalog.negatives.files,
        None,
    );
    println!("{tally}");
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    detector: Option<PathBuf>,
    positive_dir: Option<PathBuf>,
    negative_dir: Option<PathBuf>,
    hit_threshold: Option<f64>,
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
            "--detector" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--detector requires a value".to_string())?;
                options.detector = Some(PathBuf::from(value));
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
            "--hit-threshold" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--hit-threshold requires a value".to_string())?;
                options.hit_threshold = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --hit-threshold value: {value}"))?,
                );
            }
            other => return Err(format!("Unknown argument: {other}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "hogtrain-eval",
        "",
        "Counts true/false positives and negatives of a detector vector over",
        "labeled sample folders.",
        "",
        "Usage:",
        "  hogtrain-eval [--detector <file>] [--pos <dir>] [--neg <dir>] [options]",
        "",
        "Options:",
        "  --config <file>         TOML config (default: <config dir>/.hogtrain/hogtrain.toml).",
        "  --detector <file>       Detector vector (default: genfiles/descriptorvector.dat).",
        "  --pos <dir>             Positive sample folder (default: pos/).",
        "  --neg <dir>             Negative sample folder (default: neg/).",
        "  --hit-threshold <f64>   Score a window must exceed to count (default: 0).",
    ]
    .join("\n")
}
