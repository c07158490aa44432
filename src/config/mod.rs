//! Application Configuration
//!
//! Sampling, vision and heuristic settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sampling loop settings
    pub sampling: SamplingSettings,
    /// OCR settings
    pub vision: VisionSettings,
    /// Confidence model settings
    pub confidence: ConfidenceSettings,
    /// Heuristic thresholds and weights
    pub heuristics: HeuristicConfig,
    /// Screen overview bounds
    pub overview: OverviewSettings,
}

/// Sampling loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Fixed tick interval in milliseconds
    pub interval_ms: u64,
    /// Delay before the first cycle once a source is attached
    pub settle_delay_ms: u64,
    /// Label reported as the captured window
    pub window_label: String,
    /// Label reported as the content type
    pub content_type: String,
    /// Nominal frame rate label
    pub frame_rate_label: String,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            settle_delay_ms: 100,
            window_label: "VS Code".to_string(),
            content_type: "Code Editor".to_string(),
            frame_rate_label: "30".to_string(),
        }
    }
}

/// OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Directory holding model files (defaults to `<data_dir>/models`)
    pub models_dir: Option<PathBuf>,
    /// Where to fetch the text detection model from
    pub detection_model_url: String,
    /// Where to fetch the text recognition model from
    pub recognition_model_url: String,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            models_dir: None,
            detection_model_url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten"
                .to_string(),
            recognition_model_url:
                "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten".to_string(),
        }
    }
}

/// Confidence model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    /// Try to load the confidence model at all
    pub enabled: bool,
    /// Optional download location for the model artifact
    pub model_url: Option<String>,
    /// Square input size expected by the model
    pub input_size: u32,
    /// Confidence used whenever the model is unavailable
    pub default_confidence: u32,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_url: None,
            input_size: 224,
            default_confidence: 50,
        }
    }
}

/// Thresholds and weights for the lexical code heuristics.
///
/// These are tuning constants with no derivation behind them; the defaults
/// reproduce the scores the assistant UI was built around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Complexity above this is at least Medium
    pub medium_threshold: u32,
    /// Complexity above this is High
    pub high_threshold: u32,
    /// Minimum body length (chars) for a function to count as long
    pub long_function_min_body: u32,
    /// Performance penalty per long function
    pub long_function_penalty: u32,
    /// Performance penalty per nested loop/conditional
    pub nested_control_penalty: u32,
    /// Performance penalty per `const` declaration
    pub declaration_penalty: u32,
    /// Best-practices penalty per `: any` annotation
    pub loose_type_penalty: u32,
    /// Best-practices penalty per `console.` call
    pub debug_print_penalty: u32,
    /// Best-practices penalty per numeric literal
    pub numeric_literal_penalty: u32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 10,
            high_threshold: 20,
            long_function_min_body: 500,
            long_function_penalty: 5,
            nested_control_penalty: 3,
            declaration_penalty: 1,
            loose_type_penalty: 5,
            debug_print_penalty: 2,
            numeric_literal_penalty: 1,
        }
    }
}

/// Screen overview bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewSettings {
    /// Maximum number of preview lines
    pub max_lines: usize,
    /// Maximum number of preview characters
    pub max_chars: usize,
}

impl Default for OverviewSettings {
    fn default() -> Self {
        Self {
            max_lines: 15,
            max_chars: 1000,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
