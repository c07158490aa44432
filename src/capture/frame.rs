//! Frame data structures for captured screen content

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::time::Instant;

use crate::error::PipelineError;

/// A captured frame from the shared screen
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resolution label, e.g. `1920x1080`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Borrow the pixels as an image buffer
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Encode the frame as PNG for hand-off to the OCR stage
    pub fn encode_png(&self) -> Result<EncodedFrame, PipelineError> {
        let image = self.to_rgba_image().ok_or_else(|| {
            PipelineError::RecognitionFailed(format!(
                "frame buffer of {} bytes does not match {}",
                self.data.len(),
                self.resolution()
            ))
        })?;

        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

        Ok(EncodedFrame {
            bytes,
            width: self.width,
            height: self.height,
        })
    }
}

/// PNG-encoded frame, the transferable form handed to text recognizers
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// PNG bytes
    pub bytes: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}
