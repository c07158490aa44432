//! One-shot capture + OCR outside the sampling loop

use std::time::Duration;
use tracing::{debug, warn};

use crate::capture::frame::CapturedFrame;
use crate::capture::FrameSource;
use crate::error::PipelineError;
use crate::vision::TextRecognizer;

const READY_POLL: Duration = Duration::from_millis(50);

/// Capture a single frame and return its text.
///
/// Returns an empty string when no frame is available or OCR fails.
pub async fn capture_and_recognize(
    source: &mut dyn FrameSource,
    recognizer: &dyn TextRecognizer,
) -> String {
    match source.capture_frame() {
        Ok(frame) => recognize_frame(&frame, recognizer).await,
        Err(e) => {
            warn!("Screen capture failed: {}", e);
            String::new()
        }
    }
}

/// Poll `source` until it produces a frame or `timeout` elapses
pub async fn wait_for_frame(
    source: &mut dyn FrameSource,
    timeout: Duration,
) -> Result<CapturedFrame, PipelineError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match source.capture_frame() {
            Err(PipelineError::NoFrameAvailable) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(READY_POLL).await;
            }
            other => return other,
        }
    }
}

async fn recognize_frame(frame: &CapturedFrame, recognizer: &dyn TextRecognizer) -> String {
    let encoded = match frame.encode_png() {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to encode frame: {}", e);
            return String::new();
        }
    };

    match recognizer.recognize(&encoded).await {
        Ok(result) => result.text,
        Err(PipelineError::NoTextDetected) => {
            debug!("No text in captured frame");
            String::new()
        }
        Err(e) => {
            warn!("OCR error: {}", e);
            String::new()
        }
    }
}
