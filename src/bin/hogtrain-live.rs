//! Runs multi-scale detection over a folder of frames and writes annotated
//! copies.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use hogtrain::config::{PipelineConfig, default_config_path};
use hogtrain::detector::{SlidingWindowDetector, load_detector};
use hogtrain::eval::live::{AnnotatedFrameSink, DirectoryFrameSource, run_live, stop_on_interrupt};
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
    let config = PipelineConfig::load_or_default(&config_path).map_err(|err| err.to_string())?;
    let frames_dir = options
        .frames
        .ok_or_else(|| format!("--frames is required\n\n{}", help_text()))?;
    let detector_path = options
        .detector
        .unwrap_or_else(|| config.output.detector_file.clone());

    let extractor = HogExtractor::new(config.hog.clone()).map_err(|err| err.to_string())?;
    let detector = load_detector(&detector_path, Some(extractor.feature_len()))
        .map_err(|err| err.to_string())?;
    let detector = SlidingWindowDetector::new(detector, extractor, config.detection.params.clone())
        .map_err(|err| err.to_string())?;

    let mut source = DirectoryFrameSource::open(&frames_dir, &config.samples.extensions)
        .map_err(|err| err.to_string())?;
    let mut sink = AnnotatedFrameSink::new(&options.out).map_err(|err| err.to_string())?;
    let stop = Arc::new(AtomicBool::new(false));
    stop_on_interrupt(Arc::clone(&stop))
        .map_err(|err| format!("Failed to install Ctrl-C handler: {err}"))?;
    let summary = run_live(&detector, &mut source, &mut sink, &stop, options.max_frames)
        .map_err(|err| err.to_string())?;
    println!(
        "{} frames, {} detections, annotated frames in {}",
        summary.frames,
        summary.detections,
        options.out.display()
    );
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: Option<PathBuf>,
    frames: Option<PathBuf>,
    detector: Option<PathBuf>,
    out: PathBuf,
    max_frames: Option<usize>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        config: None,
        frames: None,
        detector: None,
        out: PathBuf::from("genfiles/live"),
        max_frames: None,
    };
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--frames" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--frames requires a value".to_string())?;
                options.frames = Some(PathBuf::from(value));
            }
            "--detector" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--detector requires a value".to_string())?;
                options.detector = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                options.out = PathBuf::from(value);
            }
            "--max-frames" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--max-frames requires a value".to_string())?;
                options.max_frames = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --max-frames value: {value}"))?,
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
        "hogtrain-live",
        "",
        "Scans every frame image in a folder at multiple scales with a trained",
        "detector vector and writes annotated PNG frames.",
        "",
        "Usage:",
        "  hogtrain-live --frames <dir> [--detector <file>] [--out <dir>] [--max-frames <n>]",
        "",
        "Options:",
        "  --config <file>      TOML config (default: <config dir>/.hogtrain/hogtrain.toml).",
        "  --frames <dir>       Folder of frame images (required).",
        "  --detector <file>    Detector vector (default: genfiles/descriptorvector.dat).",
        "  --out <dir>          Output folder for annotated frames (default: genfiles/live).",
        "  --max-frames <n>     Stop after this many frames.",
        "",
        "Ctrl-C stops after the current frame.",
    ]
    .join("\n")
}
