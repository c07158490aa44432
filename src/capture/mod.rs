//! Screen Capture Layer
//!
//! The shared screen arrives as a live video track owned by whoever started
//! the share. This layer only snapshots it: a [`FrameGrabber`] draws the
//! track's current picture onto one reusable surface and copies it out as a
//! [`CapturedFrame`].

pub mod frame;
pub mod sequence;

use image::RgbaImage;
use tracing::debug;

use crate::error::PipelineError;
use frame::CapturedFrame;

pub use sequence::ImageSequenceTrack;

/// How much data a video track has buffered, in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// Nothing decoded yet
    HaveNothing,
    /// Dimensions known, no picture yet
    HaveMetadata,
    /// Current picture available, nothing buffered beyond it
    HaveCurrentData,
    /// Some data beyond the current picture
    HaveFutureData,
    /// Enough buffered to play through
    HaveEnoughData,
}

/// A live video feed supplied by the screen-sharing collaborator
pub trait VideoTrack: Send {
    /// Current buffering level
    fn ready_state(&self) -> ReadyState;

    /// Native resolution as (width, height)
    fn video_size(&self) -> (u32, u32);

    /// Draw the current picture onto `surface`, which is already sized to
    /// [`VideoTrack::video_size`]
    fn draw(&mut self, surface: &mut RgbaImage) -> Result<(), PipelineError>;

    /// Stop decoding and drop any buffered pictures
    fn release(&mut self);
}

/// Something the sampler can pull frames from
pub trait FrameSource: Send {
    /// Snapshot the most recent picture
    fn capture_frame(&mut self) -> Result<CapturedFrame, PipelineError>;

    /// Release the underlying capture; no frames are produced afterwards
    fn release(&mut self);
}

/// Snapshots a [`VideoTrack`] through a single reusable drawing surface
pub struct FrameGrabber<T: VideoTrack> {
    track: T,
    surface: RgbaImage,
    released: bool,
}

impl<T: VideoTrack> FrameGrabber<T> {
    /// Attach to a track
    pub fn new(track: T) -> Self {
        Self {
            track,
            surface: RgbaImage::new(0, 0),
            released: false,
        }
    }

    /// Current surface dimensions
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// Whether [`FrameSource::release`] has been called
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<T: VideoTrack> FrameSource for FrameGrabber<T> {
    fn capture_frame(&mut self) -> Result<CapturedFrame, PipelineError> {
        if self.released || self.track.ready_state() < ReadyState::HaveEnoughData {
            return Err(PipelineError::NoFrameAvailable);
        }

        let (width, height) = self.track.video_size();
        if width == 0 || height == 0 {
            return Err(PipelineError::NoFrameAvailable);
        }

        if self.surface.dimensions() != (width, height) {
            debug!("Resizing capture surface to {}x{}", width, height);
            self.surface = RgbaImage::new(width, height);
        }

        self.track.draw(&mut self.surface)?;

        Ok(CapturedFrame::new(self.surface.as_raw().clone(), width, height))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.track.release();
        self.surface = RgbaImage::new(0, 0);
        self.released = true;
    }
}
