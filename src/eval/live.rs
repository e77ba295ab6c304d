//! Frame-by-frame detection loop.
//!
//! A [`FrameSource`] yields frames, every frame goes through multi-scale
//! detection, and a [`FrameSink`] presents the result. Both ends are held by
//! a [`LiveSession`] guard that releases them however the loop ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::scan_directory;
use crate::detector::{Detection, WindowDetector};
use crate::features::ExtractError;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// One captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Position in the stream, starting at 0.
    pub index: usize,
    /// Label for logs and output names.
    pub name: String,
    pub image: RgbImage,
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Frame source {path} is unavailable: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write frame {path}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Detection failed on frame {frame}: {source}")]
    Detect { frame: usize, source: ExtractError },
}

/// Supplies frames until exhausted.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, LiveError>;

    /// Give back any held device or handle.
    fn release(&mut self) {}
}

/// Consumes frames together with their detections.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), LiveError>;

    fn release(&mut self) {}
}

/// Scoped ownership of a source and sink; both are released on drop.
pub struct LiveSession<'a> {
    source: &'a mut dyn FrameSource,
    sink: &'a mut dyn FrameSink,
}

impl<'a> LiveSession<'a> {
    pub fn new(source: &'a mut dyn FrameSource, sink: &'a mut dyn FrameSink) -> Self {
        Self { source, sink }
    }
}

impl Drop for LiveSession<'_> {
    fn drop(&mut self) {
        self.source.release();
        self.sink.release();
        debug!("Live session resources released");
    }
}

/// Counts reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub frames: usize,
    pub detections: usize,
    /// True when the stop flag ended the loop.
    pub stopped: bool,
}

/// Run detection over frames until the source runs dry, `max_frames` is
/// reached or `stop` is set.
pub fn run_live(
    detector: &dyn WindowDetector,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    stop: &AtomicBool,
    max_frames: Option<usize>,
) -> Result<LiveSummary, LiveError> {
    let mut session = LiveSession::new(source, sink);
    let mut summary = LiveSummary::default();
    loop {
        if stop.load(Ordering::Relaxed) {
            summary.stopped = true;
            info!("Stop requested, leaving live loop");
            break;
        }
        if max_frames.is_some_and(|limit| summary.frames >= limit) {
            break;
        }
        let Some(frame) = session.source.next_frame()? else {
            break;
        };
        let gray = image::imageops::grayscale(&frame.image);
        let detections = detector
            .detect_multi_scale(&gray)
            .map_err(|source| LiveError::Detect {
                frame: frame.index,
                source,
            })?;
        debug!("Frame {}: {} detections", frame.name, detections.len());
        session.sink.present(&frame, &detections)?;
        summary.frames += 1;
        summary.detections += detections.len();
    }
    info!(
        "Live run finished: {} frames, {} detections",
        summary.frames, summary.detections
    );
    Ok(summary)
}

/// Set `stop` when the process receives Ctrl-C.
///
/// The signal is awaited on a background thread with its own single-threaded
/// runtime, so the detection loop itself stays synchronous.
pub fn stop_on_interrupt(stop: Arc<AtomicBool>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("hogtrain-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupt received, finishing current frame");
                        stop.store(true, Ordering::SeqCst);
                    }
                    Err(err) => warn!("Ctrl-C handler unavailable: {err}"),
                }
            })
        })?;
    Ok(())
}

/// Replays the image files of a directory as frames, in path order.
pub struct DirectoryFrameSource {
    files: std::vec::IntoIter<PathBuf>,
    next_index: usize,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path, extensions: &[String]) -> Result<Self, LiveError> {
        let listing = scan_directory(dir, extensions);
        if !listing.readable {
            return Err(LiveError::Source {
                path: dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "frame directory could not be opened",
                ),
            });
        }
        Ok(Self {
            files: listing.files.into_iter(),
            next_index: 0,
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, LiveError> {
        for path in self.files.by_ref() {
            match image::open(&path) {
                Ok(decoded) => {
                    let frame = Frame {
                        index: self.next_index,
                        name: path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        image: decoded.to_rgb8(),
                    };
                    self.next_index += 1;
                    return Ok(Some(frame));
                }
                Err(err) => warn!("Skipping unreadable frame {}: {err}", path.display()),
            }
        }
        Ok(None)
    }
}

/// Draws detection boxes and writes each frame as a PNG.
pub struct AnnotatedFrameSink {
    out_dir: PathBuf,
    written: usize,
}

impl AnnotatedFrameSink {
    pub fn new(out_dir: &Path) -> Result<Self, LiveError> {
        std::fs::create_dir_all(out_dir).map_err(|source| LiveError::Source {
            path: out_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frame_path(&self, frame: &Frame) -> PathBuf {
        self.out_dir.join(format!("frame_{:05}.png", frame.index))
    }
}

/// Draw a two-pixel box for every detection.
pub fn annotate(image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
        let outer = Rect::at(detection.x as i32, detection.y as i32)
            .of_size(detection.width.max(1), detection.height.max(1));
        draw_hollow_rect_mut(image, outer, BOX_COLOR);
        if detection.width > 2 && detection.height > 2 {
            let inner = Rect::at(detection.x as i32 + 1, detection.y as i32 + 1)
                .of_size(detection.width - 2, detection.height - 2);
            draw_hollow_rect_mut(image, inner, BOX_COLOR);
        }
    }
}

impl FrameSink for AnnotatedFrameSink {
    fn present(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), LiveError> {
        let mut canvas = frame.image.clone();
        annotate(&mut canvas, detections);
        let path = self.frame_path(frame);
        canvas
            .save(&path)
            .map_err(|source| LiveError::Save { path, source })?;
        self.written += 1;
        Ok(())
    }

    fn release(&mut self) {
        info!(
            "Wrote {} annotated frames to {}",
            self.written,
            self.out_dir.display()
        );
    }
}
