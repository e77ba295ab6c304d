//! Feature extraction boundary: one window-sized image to one HOG descriptor.
//!
//! The gradient-histogram computation itself is delegated to
//! `imageproc::hog`; this module only fixes the window geometry and the
//! accept/reject contract around it.

use std::fmt;
use std::path::{Path, PathBuf};

use image::GrayImage;
use imageproc::hog::{HogOptions, HogSpec, hog};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dense descriptor produced for one detector window.
pub type FeatureVector = Vec<f32>;

/// Pixel dimensions of the detector window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of an image buffer.
    pub fn of(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// Why a sample produced no feature vector.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("image '{path}' could not be decoded: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("image dimensions ({actual}) do not match HOG window size ({expected})")]
    DimensionMismatch {
        expected: WindowSize,
        actual: WindowSize,
    },
    #[error("invalid HOG configuration: {0}")]
    InvalidOptions(String),
    #[error("HOG computation failed: {0}")]
    Compute(String),
    #[error("descriptor length {actual} differs from expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Converts window-sized grayscale images into fixed-length descriptors.
pub trait FeatureExtractor {
    /// Window every input must match exactly.
    fn window(&self) -> WindowSize;

    /// Descriptor length `D` shared by every vector this extractor produces.
    fn feature_len(&self) -> usize;

    /// Describe a decoded window-sized image.
    fn compute(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError>;

    /// Decode `path` as grayscale and describe it.
    ///
    /// Fails instead of returning a vector of the wrong length when the image
    /// cannot be decoded or its size differs from [`FeatureExtractor::window`].
    fn extract(&self, path: &Path) -> Result<FeatureVector, ExtractError> {
        let image = load_gray(path)?;
        self.compute(&image)
    }
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for &T {
    fn window(&self) -> WindowSize {
        (**self).window()
    }

    fn feature_len(&self) -> usize {
        (**self).feature_len()
    }

    fn compute(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        (**self).compute(image)
    }

    fn extract(&self, path: &Path) -> Result<FeatureVector, ExtractError> {
        (**self).extract(path)
    }
}

/// Decode an image file into 8-bit grayscale.
pub fn load_gray(path: &Path) -> Result<GrayImage, ExtractError> {
    image::open(path)
        .map(|decoded| decoded.to_luma8())
        .map_err(|source| ExtractError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// HOG geometry. Defaults match the Dalal-Triggs pedestrian setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HogParams {
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Cell edge length in pixels.
    #[serde(default = "default_cell_side")]
    pub cell_side: usize,
    /// Block edge length in cells.
    #[serde(default = "default_block_side")]
    pub block_side: usize,
    /// Block step in cells.
    #[serde(default = "default_block_stride")]
    pub block_stride: usize,
    #[serde(default = "default_orientations")]
    pub orientations: usize,
    /// Use 0..360 degree orientation bins instead of 0..180.
    #[serde(default)]
    pub signed: bool,
}

impl Default for HogParams {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            cell_side: default_cell_side(),
            block_side: default_block_side(),
            block_stride: default_block_stride(),
            orientations: default_orientations(),
            signed: false,
        }
    }
}

impl HogParams {
    pub fn window(&self) -> WindowSize {
        WindowSize::new(self.window_width, self.window_height)
    }

    fn options(&self) -> HogOptions {
        HogOptions::new(
            self.orientations,
            self.signed,
            self.cell_side,
            self.block_side,
            self.block_stride,
        )
    }
}

fn default_window_width() -> u32 {
    64
}

fn default_window_height() -> u32 {
    128
}

fn default_cell_side() -> usize {
    8
}

fn default_block_side() -> usize {
    2
}

fn default_block_stride() -> usize {
    1
}

fn default_orientations() -> usize {
    9
}

/// [`FeatureExtractor`] backed by `imageproc::hog`.
#[derive(Clone, Debug)]
pub struct HogExtractor {
    params: HogParams,
    feature_len: usize,
}

impl HogExtractor {
    /// Validate the geometry against the window and precompute `D`.
    pub fn new(params: HogParams) -> Result<Self, ExtractError> {
        let spec = HogSpec::from_options(params.window_width, params.window_height, params.options())
            .map_err(ExtractError::InvalidOptions)?;
        let feature_len = spec.descriptor_length();
        Ok(Self {
            params,
            feature_len,
        })
    }

    pub fn params(&self) -> &HogParams {
        &self.params
    }
}

impl FeatureExtractor for HogExtractor {
    fn window(&self) -> WindowSize {
        self.params.window()
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn compute(&self, image: &GrayImage) -> Result<FeatureVector, ExtractError> {
        let actual = WindowSize::of(image);
        if actual != self.window() {
            return Err(ExtractError::DimensionMismatch {
                expected: self.window(),
                actual,
            });
        }
        let descriptor = hog(image, self.params.options()).map_err(ExtractError::Compute)?;
        if descriptor.len() != self.feature_len {
            return Err(ExtractError::LengthMismatch {
                expected: self.feature_len,
                actual: descriptor.len(),
            });
        }
        Ok(descriptor)
    }
}
