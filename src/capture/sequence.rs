//! Still-image replay track
//!
//! Plays back a file or a directory of screenshots as if it were a live
//! screen share. Used by the CLI and handy for reproducing analysis runs.

use anyhow::{Context, Result};
use image::{imageops, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use super::{ReadyState, VideoTrack};
use crate::error::PipelineError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Replays decoded images, advancing one image per `frame_interval`
pub struct ImageSequenceTrack {
    frames: Vec<RgbaImage>,
    frame_interval: Duration,
    started: Instant,
}

impl ImageSequenceTrack {
    /// Decode every image at `path` (a single file or a directory)
    pub fn open(path: &Path, frame_interval: Duration) -> Result<Self> {
        let paths = collect_image_paths(path)?;
        if paths.is_empty() {
            anyhow::bail!("No images found at {:?}", path);
        }

        let frames = paths
            .iter()
            .map(|p| {
                image::open(p)
                    .with_context(|| format!("Failed to decode {:?}", p))
                    .map(|img| img.to_rgba8())
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Replaying {} image(s) from {:?} every {:?}",
            frames.len(),
            path,
            frame_interval
        );

        Ok(Self::from_frames(frames, frame_interval))
    }

    /// Build a track from already decoded images
    pub fn from_frames(frames: Vec<RgbaImage>, frame_interval: Duration) -> Self {
        Self {
            frames,
            frame_interval,
            started: Instant::now(),
        }
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn current(&self) -> Option<&RgbaImage> {
        if self.frames.is_empty() {
            return None;
        }
        let interval_ms = self.frame_interval.as_millis().max(1);
        let index = (self.started.elapsed().as_millis() / interval_ms) as usize % self.frames.len();
        self.frames.get(index)
    }
}

impl VideoTrack for ImageSequenceTrack {
    fn ready_state(&self) -> ReadyState {
        if self.frames.is_empty() {
            ReadyState::HaveNothing
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn video_size(&self) -> (u32, u32) {
        self.current().map(|f| f.dimensions()).unwrap_or((0, 0))
    }

    fn draw(&mut self, surface: &mut RgbaImage) -> Result<(), PipelineError> {
        let current = self.current().ok_or(PipelineError::NoFrameAvailable)?;
        // The picture may have advanced since the surface was sized
        if current.dimensions() != surface.dimensions() {
            return Err(PipelineError::NoFrameAvailable);
        }
        imageops::replace(surface, current, 0, 0);
        Ok(())
    }

    fn release(&mut self) {
        self.frames.clear();
        self.frames.shrink_to_fit();
    }
}

/// List image files at `path`, sorted by file name
fn collect_image_paths(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read directory {:?}", path))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    paths.sort();

    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameGrabber, FrameSource};
    use image::Rgba;

    #[test]
    fn test_open_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(3, 1, Rgba([4, 5, 6, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let paths = collect_image_paths(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.png"));

        let track = ImageSequenceTrack::open(dir.path(), Duration::from_secs(60)).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.video_size(), (3, 1));
    }

    #[test]
    fn test_open_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequenceTrack::open(dir.path(), Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_grabber_over_sequence() {
        let frames = vec![RgbaImage::from_pixel(5, 4, Rgba([9, 9, 9, 255]))];
        let track = ImageSequenceTrack::from_frames(frames, Duration::from_secs(1));
        let mut grabber = FrameGrabber::new(track);

        let frame = grabber.capture_frame().unwrap();
        assert_eq!(frame.resolution(), "5x4");
        assert_eq!(&frame.data[0..4], &[9, 9, 9, 255]);
    }

    #[test]
    fn test_release_drops_frames() {
        let frames = vec![RgbaImage::new(2, 2)];
        let mut track = ImageSequenceTrack::from_frames(frames, Duration::from_secs(1));
        track.release();

        assert!(track.is_empty());
        assert_eq!(track.ready_state(), ReadyState::HaveNothing);
        assert_eq!(track.video_size(), (0, 0));
    }
}
