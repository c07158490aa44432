//! BudX screen analysis
//!
//! Periodically samples a shared screen, reads its text with OCR and turns
//! that text into a lightweight code-analysis record for the assistant UI.
//! The crate never starts a capture itself: callers hand in a video track and
//! receive [`AnalysisRecord`]s through an [`AnalysisSink`].

pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod vision;

pub use analysis::{AnalysisRecord, HeuristicAnalyzer, Language, ScreenOverview};
pub use capture::{FrameGrabber, FrameSource, ReadyState, VideoTrack};
pub use config::AppConfig;
pub use error::PipelineError;
pub use pipeline::{AnalysisSink, ChannelSink, SamplerHandle, SamplerOptions, ScreenSampler};
pub use vision::{ConfidenceScorer, TextRecognizer};
