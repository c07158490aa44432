//! Confidence scoring
//!
//! An optional ONNX classifier rates how code-like the shared screen looks.
//! The model is loaded at most once per scorer; if that single attempt fails
//! the scorer settles on a fixed default for the rest of the session.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::models::{ModelManager, ModelType, OnnxSession};
use super::preprocess::preprocess_for_confidence;
use crate::capture::frame::CapturedFrame;
use crate::error::PipelineError;

/// Produces a confidence value in `[0, 100]` for a frame
#[async_trait]
pub trait ConfidenceScorer: Send + Sync {
    async fn score(&self, frame: &CapturedFrame) -> u32;
}

/// A loaded model that maps a frame to a raw prediction (nominally 0-1)
pub trait FrameClassifier: Send + Sync {
    fn predict(&self, frame: &CapturedFrame) -> Result<f32>;
}

/// Loads the classifier behind a [`ModelConfidenceScorer`]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn FrameClassifier>, PipelineError>;
}

/// Outcome of the one-time model load
#[derive(Clone)]
pub enum ConfidenceModel {
    Loaded(Arc<dyn FrameClassifier>),
    Unavailable,
}

impl ConfidenceModel {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ConfidenceModel::Loaded(_))
    }
}

/// Convert a raw prediction to an integer confidence
pub fn confidence_from_prediction(prediction: f32) -> u32 {
    if !prediction.is_finite() {
        return 0;
    }
    (prediction * 100.0).floor().clamp(0.0, 100.0) as u32
}

/// The single in-flight load, shared by every caller
type LoadAttempt = Shared<BoxFuture<'static, ConfidenceModel>>;

/// Scorer backed by a lazily loaded model
pub struct ModelConfidenceScorer {
    loader: Arc<dyn ModelLoader>,
    attempt: Mutex<Option<LoadAttempt>>,
    model: OnceCell<ConfidenceModel>,
    default_confidence: u32,
}

impl ModelConfidenceScorer {
    pub fn new(loader: impl ModelLoader + 'static, default_confidence: u32) -> Self {
        Self {
            loader: Arc::new(loader),
            attempt: Mutex::new(None),
            model: OnceCell::new(),
            default_confidence,
        }
    }

    /// The model, loading it on first use.
    ///
    /// The load runs as its own task, so every caller (concurrent, or later
    /// after an earlier caller was dropped mid-load) shares one attempt.
    pub async fn model(&self) -> &ConfidenceModel {
        self.model.get_or_init(|| self.load_attempt()).await
    }

    fn load_attempt(&self) -> LoadAttempt {
        self.attempt
            .lock()
            .get_or_insert_with(|| {
                let loader = Arc::clone(&self.loader);
                let default_confidence = self.default_confidence;
                let task = tokio::spawn(async move {
                    match loader.load().await {
                        Ok(classifier) => {
                            info!("Confidence model loaded");
                            ConfidenceModel::Loaded(classifier)
                        }
                        Err(e) => {
                            warn!(
                                "{}; using confidence {} for this session",
                                e, default_confidence
                            );
                            ConfidenceModel::Unavailable
                        }
                    }
                });

                async move {
                    task.await.unwrap_or_else(|e| {
                        warn!("Confidence model load task failed: {}", e);
                        ConfidenceModel::Unavailable
                    })
                }
                .boxed()
                .shared()
            })
            .clone()
    }
}

#[async_trait]
impl ConfidenceScorer for ModelConfidenceScorer {
    async fn score(&self, frame: &CapturedFrame) -> u32 {
        let classifier = match self.model().await {
            ConfidenceModel::Loaded(classifier) => Arc::clone(classifier),
            ConfidenceModel::Unavailable => return self.default_confidence,
        };

        let frame = frame.clone();
        let prediction = tokio::task::spawn_blocking(move || classifier.predict(&frame)).await;

        match prediction {
            Ok(Ok(value)) => {
                let confidence = confidence_from_prediction(value);
                debug!("Confidence prediction {:.3} -> {}", value, confidence);
                confidence
            }
            Ok(Err(e)) => {
                warn!("Confidence inference failed: {:#}", e);
                self.default_confidence
            }
            Err(e) => {
                warn!("Confidence worker failed: {}", e);
                self.default_confidence
            }
        }
    }
}

/// Scorer that always reports the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub u32);

#[async_trait]
impl ConfidenceScorer for FixedConfidence {
    async fn score(&self, _frame: &CapturedFrame) -> u32 {
        self.0
    }
}

/// Loads `code-confidence.onnx` through the [`ModelManager`]
pub struct OnnxModelLoader {
    manager: ModelManager,
    model_url: Option<String>,
    input_size: u32,
}

impl OnnxModelLoader {
    pub fn new(manager: ModelManager, model_url: Option<String>, input_size: u32) -> Self {
        Self {
            manager,
            model_url,
            input_size,
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> Result<Arc<dyn FrameClassifier>, PipelineError> {
        let path = self
            .manager
            .ensure_model(ModelType::CodeConfidence, self.model_url.as_deref())
            .await
            .map_err(|e| PipelineError::ModelUnavailable(format!("{e:#}")))?;

        let input_size = self.input_size;
        let classifier = tokio::task::spawn_blocking(move || {
            OnnxSession::new(&path).map(|session| OnnxFrameClassifier {
                session: Mutex::new(session),
                input_size,
            })
        })
        .await
        .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?
        .map_err(|e| PipelineError::ModelUnavailable(format!("{e:#}")))?;

        Ok(Arc::new(classifier))
    }
}

/// ONNX classifier taking an NHWC `[1, size, size, 3]` input
pub struct OnnxFrameClassifier {
    session: Mutex<OnnxSession>,
    input_size: u32,
}

impl FrameClassifier for OnnxFrameClassifier {
    fn predict(&self, frame: &CapturedFrame) -> Result<f32> {
        let input = Tensor::from_array(preprocess_for_confidence(frame, self.input_size))
            .context("Failed to build input tensor")?;

        // Input and output tensors are dropped at the end of this scope
        let mut session = self.session.lock();
        let outputs = session
            .session_mut()
            .run(ort::inputs![input])
            .context("Inference failed")?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Unexpected model output")?;

        let prediction = data.first().copied();
        prediction.context("Model returned an empty output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StaticClassifier(f32);

    impl FrameClassifier for StaticClassifier {
        fn predict(&self, _frame: &CapturedFrame) -> Result<f32> {
            Ok(self.0)
        }
    }

    struct BrokenClassifier;

    impl FrameClassifier for BrokenClassifier {
        fn predict(&self, _frame: &CapturedFrame) -> Result<f32> {
            anyhow::bail!("bad tensor")
        }
    }

    /// Loader that counts attempts and yields a fixed outcome
    struct CountingLoader {
        attempts: Arc<AtomicUsize>,
        classifier: Option<Arc<dyn FrameClassifier>>,
        delay: Duration,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn FrameClassifier>, PipelineError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.classifier
                .clone()
                .ok_or_else(|| PipelineError::ModelUnavailable("HTTP 404".to_string()))
        }
    }

    fn frame() -> CapturedFrame {
        CapturedFrame::new(vec![0; 4 * 4 * 4], 4, 4)
    }

    #[test]
    fn test_confidence_from_prediction() {
        assert_eq!(confidence_from_prediction(0.87), 87);
        assert_eq!(confidence_from_prediction(0.999), 99);
        assert_eq!(confidence_from_prediction(1.5), 100);
        assert_eq!(confidence_from_prediction(-0.2), 0);
        assert_eq!(confidence_from_prediction(f32::NAN), 0);
    }

    #[tokio::test]
    async fn test_unavailable_model_is_never_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let scorer = ModelConfidenceScorer::new(
            CountingLoader {
                attempts: attempts.clone(),
                classifier: None,
                delay: Duration::from_millis(10),
            },
            50,
        );

        for _ in 0..5 {
            assert_eq!(scorer.score(&frame()).await, 50);
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!scorer.model().await.is_loaded());
    }

    #[tokio::test]
    async fn test_loaded_model_scores_frames() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let scorer = ModelConfidenceScorer::new(
            CountingLoader {
                attempts: attempts.clone(),
                classifier: Some(Arc::new(StaticClassifier(0.73))),
                delay: Duration::from_millis(10),
            },
            50,
        );

        assert_eq!(scorer.score(&frame()).await, 73);
        assert_eq!(scorer.score(&frame()).await, 73);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_loads_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let scorer = ModelConfidenceScorer::new(
            CountingLoader {
                attempts: attempts.clone(),
                classifier: None,
                delay: Duration::from_millis(10),
            },
            42,
        );

        let (frame_a, frame_b) = (frame(), frame());
        let (a, b) = tokio::join!(scorer.score(&frame_a), scorer.score(&frame_b));
        assert_eq!((a, b), (42, 42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_first_load_is_not_repeated() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let scorer = ModelConfidenceScorer::new(
            CountingLoader {
                attempts: attempts.clone(),
                classifier: None,
                delay: Duration::from_secs(5),
            },
            50,
        );

        // First caller gives up part-way through the load
        let first = tokio::time::timeout(Duration::from_secs(1), scorer.score(&frame())).await;
        assert!(first.is_err());

        assert_eq!(scorer.score(&frame()).await, 50);
        assert_eq!(scorer.score(&frame()).await, 50);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inference_error_uses_default() {
        let scorer = ModelConfidenceScorer::new(
            CountingLoader {
                attempts: Arc::new(AtomicUsize::new(0)),
                classifier: Some(Arc::new(BrokenClassifier)),
                delay: Duration::from_millis(10),
            },
            50,
        );

        assert_eq!(scorer.score(&frame()).await, 50);
        assert!(scorer.model().await.is_loaded());
    }

    #[tokio::test]
    async fn test_missing_onnx_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OnnxModelLoader::new(
            ModelManager::with_dir(dir.path().to_path_buf()).unwrap(),
            None,
            224,
        );

        assert!(matches!(
            loader.load().await,
            Err(PipelineError::ModelUnavailable(_))
        ));
    }

    /// Local HTTP server answering every request with 404, counting hits
    async fn not_found_server() -> (String, Arc<AtomicUsize>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!(
            "http://{}/code-confidence.onnx",
            listener.local_addr().unwrap()
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
                let _ = stream.shutdown().await;
            }
        });

        (url, hits)
    }

    #[tokio::test]
    async fn test_http_404_falls_back_for_the_session() {
        let (url, hits) = not_found_server().await;
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        let loader = OnnxModelLoader::new(manager, Some(url), 224);
        match loader.load().await {
            Err(PipelineError::ModelUnavailable(message)) => assert!(message.contains("404")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("a 404 must not produce a model"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("code-confidence.onnx").exists());

        let scorer = ModelConfidenceScorer::new(loader, 50);
        for _ in 0..3 {
            assert_eq!(scorer.score(&frame()).await, 50);
        }
        assert!(!scorer.model().await.is_loaded());
        // One more fetch for the scorer's own attempt, none per cycle
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fixed_confidence() {
        assert_eq!(FixedConfidence(64).score(&frame()).await, 64);
    }
}
