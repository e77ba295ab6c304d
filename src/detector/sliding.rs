use image::GrayImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::{ExtractError, FeatureExtractor, WindowSize};

use super::{DimensionMismatch, LinearDetector};

/// Window placement and hit settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    #[serde(default = "default_stride")]
    pub stride_x: u32,
    #[serde(default = "default_stride")]
    pub stride_y: u32,
    /// Windows scoring strictly above this are hits.
    #[serde(default)]
    pub hit_threshold: f64,
    /// Downscale factor between pyramid levels.
    #[serde(default = "default_scale_step")]
    pub scale_step: f64,
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
}

fn default_stride() -> u32 {
    8
}

fn default_scale_step() -> f64 {
    1.05
}

fn default_max_levels() -> usize {
    64
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            stride_x: default_stride(),
            stride_y: default_stride(),
            hit_threshold: 0.0,
            scale_step: default_scale_step(),
            max_levels: default_max_levels(),
        }
    }
}

/// A hit rectangle in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl Detection {
    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Detection) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    fn same_rect(&self, other: &Detection) -> bool {
        (self.x, self.y, self.width, self.height)
            == (other.x, other.y, other.width, other.height)
    }
}

/// Finds object windows in an image.
pub trait WindowDetector {
    fn window(&self) -> WindowSize;

    /// Scan at the native scale only.
    fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>, ExtractError>;

    /// Scan a downscaled pyramid and drop nested hits.
    fn detect_multi_scale(&self, image: &GrayImage) -> Result<Vec<Detection>, ExtractError>;
}

/// Slides the extractor window over an image and scores every placement
/// with a [`LinearDetector`].
pub struct SlidingWindowDetector<E> {
    detector: LinearDetector,
    extractor: E,
    params: DetectionParams,
}

impl<E: FeatureExtractor> SlidingWindowDetector<E> {
    /// Fails when the detector and descriptor lengths differ.
    pub fn new(
        detector: LinearDetector,
        extractor: E,
        params: DetectionParams,
    ) -> Result<Self, DimensionMismatch> {
        if detector.dimension() != extractor.feature_len() {
            return Err(DimensionMismatch {
                expected: extractor.feature_len(),
                actual: detector.dimension(),
            });
        }
        Ok(Self {
            detector,
            extractor,
            params,
        })
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn detector(&self) -> &LinearDetector {
        &self.detector
    }

    fn scan(&self, image: &GrayImage, scale: f64, hits: &mut Vec<Detection>) -> Result<(), ExtractError> {
        let window = self.extractor.window();
        let (width, height) = image.dimensions();
        if width < window.width || height < window.height {
            return Ok(());
        }
        let stride_x = self.params.stride_x.max(1) as usize;
        let stride_y = self.params.stride_y.max(1) as usize;
        for y in (0..=height - window.height).step_by(stride_y) {
            for x in (0..=width - window.width).step_by(stride_x) {
                let patch = imageops::crop_imm(image, x, y, window.width, window.height).to_image();
                let features = self.extractor.compute(&patch)?;
                let score = self
                    .detector
                    .score(&features)
                    .map_err(|err| ExtractError::LengthMismatch {
                        expected: err.expected,
                        actual: err.actual,
                    })?;
                if score > self.params.hit_threshold {
                    hits.push(Detection {
                        x: (f64::from(x) * scale).round() as u32,
                        y: (f64::from(y) * scale).round() as u32,
                        width: (f64::from(window.width) * scale).round() as u32,
                        height: (f64::from(window.height) * scale).round() as u32,
                        score,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<E: FeatureExtractor> WindowDetector for SlidingWindowDetector<E> {
    fn window(&self) -> WindowSize {
        self.extractor.window()
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>, ExtractError> {
        let mut hits = Vec::new();
        self.scan(image, 1.0, &mut hits)?;
        Ok(hits)
    }

    fn detect_multi_scale(&self, image: &GrayImage) -> Result<Vec<Detection>, ExtractError> {
        let window = self.extractor.window();
        let (width, height) = image.dimensions();
        let step = if self.params.scale_step > 1.0 {
            self.params.scale_step
        } else {
            default_scale_step()
        };
        let mut hits = Vec::new();
        let mut scale = 1.0f64;
        for level in 0..self.params.max_levels.max(1) {
            let level_width = (f64::from(width) / scale).round() as u32;
            let level_height = (f64::from(height) / scale).round() as u32;
            if level_width < window.width || level_height < window.height {
                break;
            }
            if level == 0 {
                self.scan(image, scale, &mut hits)?;
            } else {
                let resized = imageops::resize(image, level_width, level_height, FilterType::Triangle);
                self.scan(&resized, scale, &mut hits)?;
            }
            scale *= step;
        }
        let kept = filter_nested(&hits);
        debug!(
            "Multi-scale scan: {} raw hits, {} after nesting filter",
            hits.len(),
            kept.len()
        );
        Ok(kept)
    }
}

/// Drop every detection that lies inside another one.
///
/// Of several identical rectangles the first is kept.
pub fn filter_nested(detections: &[Detection]) -> Vec<Detection> {
    detections
        .iter()
        .enumerate()
        .filter(|(idx, candidate)| {
            !detections.iter().enumerate().any(|(other_idx, other)| {
                other_idx != *idx
                    && other.contains(candidate)
                    && (!other.same_rect(candidate) || other_idx < *idx)
            })
        })
        .map(|(_, detection)| *detection)
        .collect()
}
