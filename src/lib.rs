//! Library exports for the training binaries, benchmarks and tests.
/// Application directory helpers.
pub mod app_dirs;
/// Crash-safe file replacement.
pub mod atomic_file;
/// Labeled sample discovery.
pub mod catalog;
/// Pipeline configuration.
pub mod config;
/// Sparse text dataset format.
pub mod dataset;
/// Linear detector, synthesis and sliding-window scanning.
pub mod detector;
/// Training-set evaluation and live detection.
pub mod eval;
/// Feature extraction boundary and HOG implementation.
pub mod features;
/// C numeric locale pinning.
pub mod locale;
/// Logging setup.
pub mod logging;
/// Training pipeline orchestration.
pub mod pipeline;
/// Progress reporting.
pub mod progress;
/// SVM trainer backends.
pub mod trainer;
