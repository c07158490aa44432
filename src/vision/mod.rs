//! Vision/OCR Layer
//!
//! Turns captured frames into text and a model confidence score:
//! - Text recognition through the [`TextRecognizer`] port (ocrs backend)
//! - Optional ONNX confidence model through the [`ConfidenceScorer`] port

pub mod confidence;
pub mod models;
pub mod ocr;
pub mod preprocess;

use async_trait::async_trait;

use crate::capture::frame::EncodedFrame;
use crate::error::PipelineError;

pub use confidence::{
    ConfidenceModel, ConfidenceScorer, FixedConfidence, FrameClassifier, ModelConfidenceScorer,
    ModelLoader, OnnxModelLoader,
};
pub use models::{ModelManager, ModelType, OnnxSession};
pub use ocr::OcrsRecognizer;

/// Plain-text output of OCR for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Recognized text
    pub text: String,
}

/// Converts an encoded frame into text.
///
/// Implementations must report empty output as
/// [`PipelineError::NoTextDetected`] and engine failures as
/// [`PipelineError::RecognitionFailed`]. They never retry.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &EncodedFrame) -> Result<RecognitionResult, PipelineError>;
}

/// Reject blank OCR output
pub(crate) fn non_empty(text: String) -> Result<RecognitionResult, PipelineError> {
    if text.trim().is_empty() {
        Err(PipelineError::NoTextDetected)
    } else {
        Ok(RecognitionResult { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_no_text_detected() {
        assert!(matches!(
            non_empty(" \n\t ".to_string()),
            Err(PipelineError::NoTextDetected)
        ));
        assert!(matches!(
            non_empty(String::new()),
            Err(PipelineError::NoTextDetected)
        ));
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let result = non_empty("  let x = 1;\n".to_string()).unwrap();
        assert_eq!(result.text, "  let x = 1;\n");
    }
}
