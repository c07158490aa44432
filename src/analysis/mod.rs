//! Analysis Layer
//!
//! Lexical code heuristics over recognized text, and the [`AnalysisRecord`]
//! handed to consumers once per sampling cycle.

pub mod display;
pub mod heuristics;
pub mod overview;

use serde::{Deserialize, Serialize};

use crate::config::SamplingSettings;

pub use display::render_panel;
pub use heuristics::{HeuristicAnalyzer, HeuristicReport};
pub use overview::screen_overview;

/// Overview text shown while no usable screen content is available
pub const WAITING_FOR_CONTENT: &str =
    "Waiting for content...\nMake sure your code editor window is visible and in focus.";

/// Programming languages recognized by signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Java,
    Cpp,
}

impl Language {
    /// Detection order
    pub const ALL: [Language; 5] = [
        Language::TypeScript,
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }
}

/// Heuristic complexity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodeComplexity {
    Low,
    Medium,
    High,
}

/// Best-practices score and the number of smells behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPractices {
    pub score: u32,
    pub issues: u32,
}

/// Bounded preview of the recognized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenOverview {
    /// At most 15 trimmed, non-blank lines and 1000 characters
    pub text: String,
    /// Number of non-blank lines in the full text
    pub line_count: usize,
    /// e.g. `Lines 1-15`
    pub visible_range: String,
    /// Epoch milliseconds
    pub timestamp: u64,
}

/// The pipeline's output for one sampling cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub window: String,
    pub content_type: String,
    pub resolution: String,
    pub frame_rate: String,
    pub languages: Vec<Language>,
    pub code_complexity: CodeComplexity,
    pub potential_issues: u32,
    pub performance_score: u32,
    pub best_practices: BestPractices,
    pub screen_overview: ScreenOverview,
}

/// Fixed descriptive labels stamped on every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLabels {
    pub window: String,
    pub content_type: String,
    pub frame_rate: String,
}

impl From<&SamplingSettings> for RecordLabels {
    fn from(settings: &SamplingSettings) -> Self {
        Self {
            window: settings.window_label.clone(),
            content_type: settings.content_type.clone(),
            frame_rate: settings.frame_rate_label.clone(),
        }
    }
}

impl Default for RecordLabels {
    fn default() -> Self {
        Self::from(&SamplingSettings::default())
    }
}

impl AnalysisRecord {
    /// Merge heuristic results and model confidence into a record
    pub fn compose(
        labels: &RecordLabels,
        resolution: String,
        report: HeuristicReport,
        confidence: u32,
        screen_overview: ScreenOverview,
    ) -> Self {
        Self {
            window: labels.window.clone(),
            content_type: labels.content_type.clone(),
            resolution,
            frame_rate: labels.frame_rate.clone(),
            languages: report.languages,
            code_complexity: report.code_complexity,
            potential_issues: report.potential_issues,
            performance_score: blend_scores(report.performance_score, confidence),
            best_practices: report.best_practices,
            screen_overview,
        }
    }

    /// Placeholder emitted when a cycle fails after a frame was captured
    pub fn fallback(labels: &RecordLabels, resolution: String, timestamp: u64) -> Self {
        Self {
            window: labels.window.clone(),
            content_type: labels.content_type.clone(),
            resolution,
            frame_rate: labels.frame_rate.clone(),
            languages: Vec::new(),
            code_complexity: CodeComplexity::Low,
            potential_issues: 0,
            performance_score: 0,
            best_practices: BestPractices { score: 0, issues: 0 },
            screen_overview: ScreenOverview {
                text: WAITING_FOR_CONTENT.to_string(),
                line_count: 0,
                visible_range: "No content".to_string(),
                timestamp,
            },
        }
    }

    /// Text to copy verbatim into a prompt-composition field
    pub fn prompt_text(&self) -> &str {
        &self.screen_overview.text
    }

    /// Whether this is a fallback placeholder rather than real analysis
    pub fn is_fallback(&self) -> bool {
        self.screen_overview.line_count == 0 && self.screen_overview.text == WAITING_FOR_CONTENT
    }
}

/// Floor of the mean of the lexical score and the model confidence
pub fn blend_scores(performance: u32, confidence: u32) -> u32 {
    (performance.min(100) + confidence.min(100)) / 2
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
