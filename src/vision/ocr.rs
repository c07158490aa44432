//! OCR (Optical Character Recognition) module
//!
//! Uses the ocrs engine with rten text detection/recognition models.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::ImageFormat;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::models::{ModelManager, ModelType};
use super::{non_empty, RecognitionResult, TextRecognizer};
use crate::capture::frame::EncodedFrame;
use crate::config::VisionSettings;
use crate::error::PipelineError;

/// OCR engine backed by ocrs
pub struct OcrsRecognizer {
    engine: Arc<OcrEngine>,
}

impl OcrsRecognizer {
    /// Initialize OCR engine with model paths
    pub fn new(detection_model: &Path, recognition_model: &Path) -> Result<Self> {
        info!(
            "Loading OCR models: detection={:?}, recognition={:?}",
            detection_model, recognition_model
        );

        let detection_model =
            Model::load_file(detection_model).context("Failed to load text detection model")?;
        let recognition_model =
            Model::load_file(recognition_model).context("Failed to load text recognition model")?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .context("Failed to create OCR engine")?;

        info!("OCR engine initialized");
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Fetch the models if needed, then initialize the engine
    pub async fn from_manager(manager: &ModelManager, settings: &VisionSettings) -> Result<Self> {
        let det_path = manager
            .ensure_model(ModelType::TextDetection, Some(&settings.detection_model_url))
            .await?;
        let rec_path = manager
            .ensure_model(ModelType::TextRecognition, Some(&settings.recognition_model_url))
            .await?;

        tokio::task::spawn_blocking(move || Self::new(&det_path, &rec_path))
            .await
            .context("OCR init worker join failed")?
    }
}

/// Decode a PNG frame and run detection + recognition over it
fn run_ocr(engine: &OcrEngine, png: &[u8]) -> Result<String> {
    let image = image::load_from_memory_with_format(png, ImageFormat::Png)
        .context("Failed to decode frame")?
        .into_rgb8();

    let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
        .context("Unsupported frame layout")?;
    let input = engine.prepare_input(source)?;
    engine.get_text(&input)
}

#[async_trait]
impl TextRecognizer for OcrsRecognizer {
    async fn recognize(&self, frame: &EncodedFrame) -> Result<RecognitionResult, PipelineError> {
        let start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let bytes = frame.bytes.clone();

        let text = tokio::task::spawn_blocking(move || run_ocr(&engine, &bytes))
            .await
            .map_err(|e| PipelineError::RecognitionFailed(format!("OCR worker failed: {e}")))?
            .map_err(|e| PipelineError::RecognitionFailed(format!("{e:#}")))?;

        debug!(
            "OCR on {}x{} frame produced {} chars in {:?}",
            frame.width,
            frame.height,
            text.len(),
            start.elapsed()
        );

        non_empty(text)
    }
}
