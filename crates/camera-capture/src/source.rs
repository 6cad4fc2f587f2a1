//! Capture sources
//!
//! A source is acquired once per session and released when the session ends
//! (or when it is dropped). Every frame leaving a source has been resized to
//! the configured resolution.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::frame::VideoFrame;
use crate::{CameraConfig, CameraError};

/// A video stream the sampler can pull frames from
pub trait FrameSource: Send {
    /// Whether a frame can be captured right now
    fn is_ready(&self) -> bool;

    /// Capture the current frame
    fn capture(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device; later captures fail with `NotInitialized`
    fn release(&mut self);
}

/// Cycles through a fixed set of in-memory frames
pub struct ReplaySource {
    frames: Vec<VideoFrame>,
    config: CameraConfig,
    cursor: usize,
    sequence: u32,
    started: Instant,
    released: bool,
}

impl ReplaySource {
    /// Create a replay source; fails when there is nothing to replay
    pub fn new(frames: Vec<VideoFrame>, config: CameraConfig) -> Result<Self, CameraError> {
        if frames.is_empty() {
            return Err(CameraError::Open("no frames to replay".into()));
        }
        for frame in &frames {
            frame.validate()?;
        }

        Ok(Self {
            frames,
            config,
            cursor: 0,
            sequence: 0,
            started: Instant::now(),
            released: false,
        })
    }
}

impl FrameSource for ReplaySource {
    fn is_ready(&self) -> bool {
        !self.released
    }

    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::NotInitialized);
        }

        let source = &self.frames[self.cursor % self.frames.len()];
        self.cursor = (self.cursor + 1) % self.frames.len();

        let mut frame = source.resize(self.config.width, self.config.height);
        frame.sequence = self.sequence;
        frame.timestamp_ns = self.started.elapsed().as_nanos() as u64;
        self.sequence = self.sequence.wrapping_add(1);

        Ok(frame)
    }

    fn release(&mut self) {
        if !self.released {
            debug!("Replay source released after {} frames", self.sequence);
            self.released = true;
        }
    }
}

/// Replays still images from a directory, in file-name order
///
/// Stands in for a physical camera: `device` in the camera configuration is
/// the directory path.
pub struct ImageDirSource {
    inner: ReplaySource,
}

impl ImageDirSource {
    /// Decode every readable image in `dir`
    pub fn open(dir: &Path, config: CameraConfig) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            match VideoFrame::from_image_file(path) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("Skipping unreadable frame file: {}", e),
            }
        }

        if frames.is_empty() {
            return Err(CameraError::Open(format!(
                "no decodable images in {}",
                dir.display()
            )));
        }

        info!("Opened image source {} with {} frames", dir.display(), frames.len());

        Ok(Self {
            inner: ReplaySource::new(frames, config)?,
        })
    }
}

impl FrameSource for ImageDirSource {
    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        self.inner.capture()
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

/// Acquire the source described by `config`
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if config.width == 0 || config.height == 0 {
        return Err(CameraError::Format(format!(
            "invalid resolution {}x{}",
            config.width, config.height
        )));
    }
    let source = ImageDirSource::open(Path::new(&config.device), config.clone())?;
    Ok(Box::new(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CameraConfig {
        CameraConfig {
            width: 4,
            height: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_replay_cycles_and_resizes() {
        let frames = vec![
            VideoFrame::solid(8, 8, [255, 0, 0]),
            VideoFrame::solid(8, 8, [0, 255, 0]),
        ];
        let mut source = ReplaySource::new(frames, small_config()).unwrap();

        let a = source.capture().unwrap();
        let b = source.capture().unwrap();
        let c = source.capture().unwrap();

        assert_eq!(a.width, 4);
        assert_eq!(a.get_pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(b.get_pixel(0, 0), Some([0, 255, 0]));
        assert_eq!(c.get_pixel(0, 0), Some([255, 0, 0]));
        assert_eq!(c.sequence, 2);
    }

    #[test]
    fn test_release_stops_capture() {
        let mut source =
            ReplaySource::new(vec![VideoFrame::solid(4, 4, [1, 2, 3])], small_config()).unwrap();
        assert!(source.is_ready());

        source.release();
        assert!(!source.is_ready());
        assert!(matches!(source.capture(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_empty_replay_rejected() {
        assert!(matches!(
            ReplaySource::new(Vec::new(), small_config()),
            Err(CameraError::Open(_))
        ));
    }

    #[test]
    fn test_missing_directory_fails_to_open() {
        let config = CameraConfig {
            device: "/definitely/not/a/camera/dir".into(),
            ..small_config()
        };
        assert!(matches!(open_source(&config), Err(CameraError::Open(_))));
    }

    #[test]
    fn test_image_dir_source_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbImage::from_pixel(6, 6, image::Rgb([9, 8, 7]));
        img.save(dir.path().join("frame-000.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let config = CameraConfig {
            device: dir.path().to_string_lossy().into_owned(),
            ..small_config()
        };
        let mut source = open_source(&config).unwrap();
        let frame = source.capture().unwrap();
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(frame.get_pixel(1, 1), Some([9, 8, 7]));
    }
}
