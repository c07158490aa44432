//! budx-screen - replay a screen capture through the analysis pipeline
//!
//! Frames come from an image file or a directory of images standing in for
//! the shared screen; records are printed as panels or JSON lines.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use budx_screen::analysis::{
    now_millis, render_panel, screen_overview, AnalysisRecord, HeuristicAnalyzer, RecordLabels,
};
use budx_screen::capture::{FrameGrabber, FrameSource, ImageSequenceTrack};
use budx_screen::config::{self, AppConfig};
use budx_screen::pipeline::{
    capture_and_recognize, wait_for_frame, ChannelSink, SamplerOptions, ScreenSampler,
};
use budx_screen::storage;
use budx_screen::vision::{
    ConfidenceScorer, FixedConfidence, ModelConfidenceScorer, ModelManager, OcrsRecognizer,
    OnnxModelLoader, TextRecognizer,
};

/// BudX screen analysis
#[derive(Parser, Debug)]
#[command(name = "budx-screen")]
#[command(about = "Sample a shared screen, OCR it and report code heuristics")]
struct Args {
    /// Image file or directory of images to replay as the shared screen
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Config file (defaults to the per-user config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long to sample before stopping
    #[arg(long, default_value = "10")]
    duration_secs: u64,

    /// How long each replayed image stays on screen
    #[arg(long, default_value = "1000")]
    frame_interval_ms: u64,

    /// Capture and OCR a single frame, print the text and exit
    #[arg(long)]
    once: bool,

    /// Run the heuristics over a text file instead of sampling frames
    #[arg(long, value_name = "FILE")]
    analyze_text: Option<PathBuf>,

    /// Print records as JSON lines
    #[arg(long)]
    json: bool,

    /// Skip the confidence model and use the configured default confidence
    #[arg(long)]
    no_confidence_model: bool,

    /// Write the default configuration and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if args.write_config {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => storage::default_config_path()?,
        };
        config::save_config(&AppConfig::default(), &path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = load_or_create_config(args.config.as_deref())?;
    let analyzer =
        HeuristicAnalyzer::new(&config.heuristics).context("Invalid heuristic patterns")?;

    if let Some(path) = &args.analyze_text {
        return analyze_text_file(path, &config, &analyzer, args.json);
    }

    let Some(frames) = &args.frames else {
        bail!("--frames is required unless --analyze-text or --write-config is given");
    };

    let manager = match &config.vision.models_dir {
        Some(dir) => ModelManager::with_dir(dir.clone())?,
        None => ModelManager::new()?,
    };
    let recognizer: Arc<dyn TextRecognizer> =
        Arc::new(OcrsRecognizer::from_manager(&manager, &config.vision).await?);

    let track = ImageSequenceTrack::open(frames, Duration::from_millis(args.frame_interval_ms))?;
    let mut grabber = FrameGrabber::new(track);

    if args.once {
        if let Err(e) = wait_for_frame(&mut grabber, Duration::from_secs(2)).await {
            warn!("Screen never became ready: {}", e);
        }
        let text = capture_and_recognize(&mut grabber, recognizer.as_ref()).await;
        grabber.release();
        println!("{}", text);
        return Ok(());
    }

    let scorer: Arc<dyn ConfidenceScorer> = if args.no_confidence_model || !config.confidence.enabled
    {
        Arc::new(FixedConfidence(config.confidence.default_confidence))
    } else {
        let loader = OnnxModelLoader::new(
            manager,
            config.confidence.model_url.clone(),
            config.confidence.input_size,
        );
        Arc::new(ModelConfidenceScorer::new(
            loader,
            config.confidence.default_confidence,
        ))
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let sampler = ScreenSampler::new(
        grabber,
        recognizer,
        scorer,
        analyzer,
        ChannelSink(tx),
        SamplerOptions::from_config(&config),
    );
    let handle = sampler.start();

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);
    let mut poll = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                for record in rx.try_iter() {
                    print_record(&record, args.json, true)?;
                }
            }
        }
    }

    let sampler = handle.sampler().clone();
    handle.shutdown().await?;
    for record in rx.try_iter() {
        print_record(&record, args.json, false)?;
    }

    let stats = sampler.stats();
    info!(
        "Sampling finished: {} record(s), {} fallback(s), {} dropped tick(s), {} skipped cycle(s)",
        stats.records_emitted, stats.fallbacks_emitted, stats.ticks_dropped, stats.cycles_skipped
    );

    Ok(())
}

/// Load configuration from an explicit path, the default location, or defaults
fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {:#}", config_path, e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Heuristics-only analysis of a text file, blended with the default confidence
fn analyze_text_file(
    path: &Path,
    config: &AppConfig,
    analyzer: &HeuristicAnalyzer,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;

    let record = AnalysisRecord::compose(
        &RecordLabels::from(&config.sampling),
        "n/a".to_string(),
        analyzer.analyze(&text),
        config.confidence.default_confidence,
        screen_overview(&text, &config.overview, now_millis()),
    );
    print_record(&record, json, false)
}

fn print_record(record: &AnalysisRecord, json: bool, live: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!("{}", render_panel(record, live));
    }
    Ok(())
}
