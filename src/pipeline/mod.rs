//! Sampling Loop
//!
//! Drives capture -> OCR -> (heuristics | confidence) -> record on a fixed
//! timer. At most one cycle is ever in flight: a tick that lands while a
//! cycle is still running is dropped, not queued.

pub mod snapshot;

use crossbeam_channel::Sender;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{
    now_millis, screen_overview, AnalysisRecord, HeuristicAnalyzer, RecordLabels,
};
use crate::capture::frame::CapturedFrame;
use crate::capture::FrameSource;
use crate::config::{AppConfig, OverviewSettings};
use crate::error::PipelineError;
use crate::vision::{ConfidenceScorer, TextRecognizer};

pub use snapshot::{capture_and_recognize, wait_for_frame};

/// Receives one record per completed cycle.
///
/// Implementations may call [`ScreenSampler::stop`] from inside the callback.
pub trait AnalysisSink: Send + Sync {
    fn on_analysis_complete(&self, record: AnalysisRecord);
}

impl<F> AnalysisSink for F
where
    F: Fn(AnalysisRecord) + Send + Sync,
{
    fn on_analysis_complete(&self, record: AnalysisRecord) {
        self(record)
    }
}

/// Forwards records into a channel
pub struct ChannelSink(pub Sender<AnalysisRecord>);

impl AnalysisSink for ChannelSink {
    fn on_analysis_complete(&self, record: AnalysisRecord) {
        if self.0.send(record).is_err() {
            debug!("Analysis receiver dropped, discarding record");
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Processing,
}

/// Reentrancy guard allowing a single cycle at a time
#[derive(Debug, Default)]
pub struct CycleGate {
    busy: AtomicBool,
}

impl CycleGate {
    /// Claim the gate, or `None` if a cycle already holds it
    pub fn try_enter(self: &Arc<Self>) -> Option<CyclePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                gate: Arc::clone(self),
            })
    }

    pub fn state(&self) -> SamplerState {
        if self.busy.load(Ordering::Acquire) {
            SamplerState::Processing
        } else {
            SamplerState::Idle
        }
    }
}

/// Held for the duration of a cycle; reopens the gate when dropped
pub struct CyclePermit {
    gate: Arc<CycleGate>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Timing and labelling options
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Fixed tick interval
    pub interval: Duration,
    /// Delay before the first tick
    pub settle_delay: Duration,
    pub labels: RecordLabels,
    pub overview: OverviewSettings,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SamplerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.sampling.interval_ms.max(1)),
            settle_delay: Duration::from_millis(config.sampling.settle_delay_ms),
            labels: RecordLabels::from(&config.sampling),
            overview: config.overview.clone(),
        }
    }
}

/// Counters describing what the sampler has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub cycles_started: u64,
    pub ticks_dropped: u64,
    pub cycles_skipped: u64,
    pub records_emitted: u64,
    pub fallbacks_emitted: u64,
}

#[derive(Default)]
struct StatCounters {
    cycles_started: AtomicU64,
    ticks_dropped: AtomicU64,
    cycles_skipped: AtomicU64,
    records_emitted: AtomicU64,
    fallbacks_emitted: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SamplerStats {
        SamplerStats {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            fallbacks_emitted: self.fallbacks_emitted.load(Ordering::Relaxed),
        }
    }
}

struct SamplerInner {
    session_id: Uuid,
    source: Mutex<Box<dyn FrameSource>>,
    recognizer: Arc<dyn TextRecognizer>,
    scorer: Arc<dyn ConfidenceScorer>,
    analyzer: HeuristicAnalyzer,
    sink: Box<dyn AnalysisSink>,
    options: SamplerOptions,
    gate: Arc<CycleGate>,
    cancel: CancellationToken,
    emit_lock: ReentrantMutex<()>,
    stats: StatCounters,
}

/// Screen analysis scheduler for one shared screen
#[derive(Clone)]
pub struct ScreenSampler {
    inner: Arc<SamplerInner>,
}

impl ScreenSampler {
    pub fn new(
        source: impl FrameSource + 'static,
        recognizer: Arc<dyn TextRecognizer>,
        scorer: Arc<dyn ConfidenceScorer>,
        analyzer: HeuristicAnalyzer,
        sink: impl AnalysisSink + 'static,
        options: SamplerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SamplerInner {
                session_id: Uuid::new_v4(),
                source: Mutex::new(Box::new(source)),
                recognizer,
                scorer,
                analyzer,
                sink: Box::new(sink),
                options,
                gate: Arc::new(CycleGate::default()),
                cancel: CancellationToken::new(),
                emit_lock: ReentrantMutex::new(()),
                stats: StatCounters::default(),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn state(&self) -> SamplerState {
        self.inner.gate.state()
    }

    pub fn stats(&self) -> SamplerStats {
        self.inner.stats.snapshot()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Handle one timer tick.
    ///
    /// Spawns a cycle and returns its handle when idle; returns `None` when a
    /// cycle is already in flight or the sampler has been stopped.
    pub fn tick(&self) -> Option<JoinHandle<()>> {
        if self.is_stopped() {
            return None;
        }

        let Some(permit) = self.inner.gate.try_enter() else {
            StatCounters::bump(&self.inner.stats.ticks_dropped);
            debug!("Cycle still in flight, dropping tick");
            return None;
        };

        StatCounters::bump(&self.inner.stats.cycles_started);
        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let _permit = permit;
            inner.run_cycle().await;
        }))
    }

    /// Start the timer loop
    pub fn start(self) -> SamplerHandle {
        info!(
            "Starting screen sampler {} (interval {:?})",
            self.inner.session_id, self.inner.options.interval
        );
        let task = tokio::spawn(self.clone().sampling_loop());
        SamplerHandle {
            sampler: self,
            task: Some(task),
        }
    }

    /// Stop sampling and release the frame source.
    ///
    /// Once this returns no further records are emitted, including from a
    /// cycle that is still in flight. Safe to call from an [`AnalysisSink`].
    pub fn stop(&self) {
        let _emit = self.inner.emit_lock.lock();
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.source.lock().release();
        info!("Screen sampler {} stopped", self.inner.session_id);
    }

    /// Runs until cancelled; returns the most recently spawned cycle
    async fn sampling_loop(self) -> Option<JoinHandle<()>> {
        let cancel = self.inner.cancel.clone();

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(self.inner.options.settle_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.inner.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_cycle = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(cycle) = self.tick() {
                        last_cycle = Some(cycle);
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("Sampling loop shutting down");
                    break;
                }
            }
        }

        last_cycle
    }
}

impl SamplerInner {
    async fn run_cycle(&self) {
        let start = Instant::now();

        let captured = self.source.lock().capture_frame();
        let frame = match captured {
            Ok(frame) => frame,
            Err(e) => {
                if !e.is_skip() {
                    warn!("Frame capture failed: {}", e);
                }
                debug!("Skipping cycle: {}", e);
                StatCounters::bump(&self.stats.cycles_skipped);
                return;
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = self.analyze_frame(&frame) => outcome,
        };

        let (record, fallback) = match outcome {
            Ok(record) => (record, false),
            Err(e) => {
                warn!("Error processing frame: {}", e);
                let record = AnalysisRecord::fallback(&self.options.labels, frame.resolution(), now_millis());
                (record, true)
            }
        };

        self.emit(record, fallback);
        debug!("Cycle finished in {:?}", start.elapsed());
    }

    async fn analyze_frame(&self, frame: &CapturedFrame) -> Result<AnalysisRecord, PipelineError> {
        let encoded = frame.encode_png()?;
        let text = self.recognizer.recognize(&encoded).await?.text;
        drop(encoded);

        let (report, confidence) = tokio::join!(
            async { self.analyzer.analyze(&text) },
            self.scorer.score(frame)
        );
        let overview = screen_overview(&text, &self.options.overview, now_millis());

        Ok(AnalysisRecord::compose(
            &self.options.labels,
            frame.resolution(),
            report,
            confidence,
            overview,
        ))
    }

    fn emit(&self, record: AnalysisRecord, fallback: bool) {
        let _emit = self.emit_lock.lock();
        if self.cancel.is_cancelled() {
            debug!("Sampler stopped, discarding record");
            return;
        }

        StatCounters::bump(&self.stats.records_emitted);
        if fallback {
            StatCounters::bump(&self.stats.fallbacks_emitted);
        }
        self.sink.on_analysis_complete(record);
    }
}

/// Owns a running sampling loop; stops it when dropped
pub struct SamplerHandle {
    sampler: ScreenSampler,
    task: Option<JoinHandle<Option<JoinHandle<()>>>>,
}

impl SamplerHandle {
    pub fn sampler(&self) -> &ScreenSampler {
        &self.sampler
    }

    /// Stop the timer and release the capture (see [`ScreenSampler::stop`])
    pub fn stop(&self) {
        self.sampler.stop();
    }

    /// Stop, then wait for the timer loop and its last cycle to finish
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.sampler.stop();
        if let Some(task) = self.task.take() {
            if let Some(cycle) = task.await? {
                cycle.await?;
            }
        }
        Ok(())
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.sampler.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
