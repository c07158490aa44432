//! Error taxonomy for the sampling pipeline

use thiserror::Error;

/// Failures a single sampling cycle can run into.
///
/// None of these ever reach the analysis consumer: the sampler either skips
/// the cycle (`NoFrameAvailable`) or emits a fallback record instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The frame source is not ready (or has been released)
    #[error("no frame available: capture source not ready")]
    NoFrameAvailable,

    /// OCR ran but produced no usable text
    #[error("no text detected in frame")]
    NoTextDetected,

    /// The OCR engine itself failed
    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),

    /// The confidence model could not be loaded
    #[error("confidence model unavailable: {0}")]
    ModelUnavailable(String),

    /// The frame could not be encoded for the OCR stage
    #[error("failed to encode frame: {0}")]
    FrameEncoding(#[from] image::ImageError),
}

impl PipelineError {
    /// Whether the cycle should be skipped without emitting anything
    pub fn is_skip(&self) -> bool {
        matches!(self, PipelineError::NoFrameAvailable)
    }
}
