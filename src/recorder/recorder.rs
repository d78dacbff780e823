use super::backend::{CaptureBackend, SpectrumSource};
use super::volume::volume_db;
use crate::error::RecorderError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

/// Configuration for the silence-aware recorder.
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Volume at or below this level counts as silence.
    pub silence_threshold_db: f64,
    /// How long the signal must stay at/below the threshold before
    /// silence-start fires. There is no debounce on the exit edge.
    pub silence_duration: Duration,
    /// Cadence of the volume sampling loop. The backend's encoder emits
    /// chunks on the same cadence, but the two are not mutually ordered.
    pub sample_interval: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
            silence_duration: Duration::from_millis(2000),
            sample_interval: Duration::from_millis(100),
        }
    }
}

pub type VolumeHandler = Arc<dyn Fn(f64) + Send + Sync>;
pub type SilenceHandler = Arc<dyn Fn() + Send + Sync>;
pub type ChunkHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Caller-supplied callbacks, all optional.
///
/// Volume and silence callbacks fire from the sampling task; chunk delivery
/// fires from its own forwarding task.
#[derive(Default, Clone)]
pub struct RecorderCallbacks {
    /// Current volume level, pushed on every sample tick.
    pub on_volume_change: Option<VolumeHandler>,
    /// Edge-triggered: at most once per continuous below-threshold run.
    pub on_silence_start: Option<SilenceHandler>,
    /// Edge-triggered: fires immediately on the first tick back above the
    /// threshold.
    pub on_silence_end: Option<SilenceHandler>,
    /// Non-empty encoded chunks, exactly as emitted by the encoder.
    pub on_data_available: Option<ChunkHandler>,
}

/// Snapshot of the recorder's observable state.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderStats {
    pub is_recording: bool,
    pub is_silent: bool,
    pub volume_db: f64,
    pub started_at: Option<DateTime<Utc>>,
    /// Last device-access failure, if any.
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Observed {
    volume_db: f64,
    started_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// A live audio capture session that streams encoded chunks to a sink and
/// samples signal energy to raise debounced silence-start/silence-end events.
pub struct SilenceAwareRecorder {
    /// Also serializes start/stop so re-entrant lifecycle calls are absorbed
    /// instead of creating duplicate capture resources.
    backend: Mutex<Box<dyn CaptureBackend>>,
    options: RecorderOptions,
    callbacks: RecorderCallbacks,
    recording: Arc<AtomicBool>,
    silent: Arc<AtomicBool>,
    observed: Arc<Mutex<Observed>>,
    sample_task: Mutex<Option<JoinHandle<()>>>,
    chunk_task: Mutex<Option<JoinHandle<()>>>,
}

impl SilenceAwareRecorder {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        options: RecorderOptions,
        callbacks: RecorderCallbacks,
    ) -> Self {
        Self {
            backend: Mutex::new(backend),
            options,
            callbacks,
            recording: Arc::new(AtomicBool::new(false)),
            silent: Arc::new(AtomicBool::new(false)),
            observed: Arc::new(Mutex::new(Observed::default())),
            sample_task: Mutex::new(None),
            chunk_task: Mutex::new(None),
        }
    }

    /// Request capture-device access and begin the session: chunk delivery
    /// and volume sampling both run at the configured cadence.
    ///
    /// A no-op success while already recording. Device denial surfaces as
    /// `RecorderError::DeviceAccess` with no retry.
    pub async fn start_recording(&self) -> Result<(), RecorderError> {
        let mut backend = self.backend.lock().await;
        if self.recording.load(Ordering::SeqCst) {
            warn!("Recording already started");
            return Ok(());
        }

        info!("Starting capture via {}", backend.name());
        let session = match backend.start().await {
            Ok(session) => session,
            Err(e) => {
                self.observed.lock().await.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        {
            let mut obs = self.observed.lock().await;
            obs.last_error = None;
            obs.started_at = Some(Utc::now());
        }

        let mut chunks = session.chunks;
        let on_data = self.callbacks.on_data_available.clone();
        let chunk_task = tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if let Some(cb) = &on_data {
                    cb(chunk);
                }
            }
            debug!("Chunk stream ended");
        });

        let sample_task = tokio::spawn(Self::sample_loop(
            session.spectrum,
            self.options.clone(),
            self.callbacks.clone(),
            Arc::clone(&self.silent),
            Arc::clone(&self.observed),
        ));

        *self.sample_task.lock().await = Some(sample_task);
        *self.chunk_task.lock().await = Some(chunk_task);
        self.recording.store(true, Ordering::SeqCst);

        info!("Recording started");
        Ok(())
    }

    /// Tear the session down: sampling loop first (so no volume or silence
    /// callback fires mid-teardown, and its pending debounce window dies
    /// with it), then chunk delivery, then the capture backend.
    ///
    /// Idempotent; safe against repeated or out-of-order calls.
    pub async fn stop_recording(&self) -> Result<(), RecorderError> {
        let mut backend = self.backend.lock().await;
        if !self.recording.load(Ordering::SeqCst) {
            debug!("stop_recording while not recording; nothing to do");
            return Ok(());
        }

        if let Some(task) = self.sample_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(task) = self.chunk_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        if let Err(e) = backend.stop().await {
            warn!("Capture backend stop failed: {}", e);
        }

        self.recording.store(false, Ordering::SeqCst);
        self.silent.store(false, Ordering::SeqCst);
        self.observed.lock().await.started_at = None;

        info!("Recording stopped");
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::SeqCst)
    }

    pub async fn current_volume_db(&self) -> f64 {
        self.observed.lock().await.volume_db
    }

    /// Current observable state, for a UI layer to poll.
    pub async fn stats(&self) -> RecorderStats {
        let obs = self.observed.lock().await;
        RecorderStats {
            is_recording: self.recording.load(Ordering::SeqCst),
            is_silent: self.silent.load(Ordering::SeqCst),
            volume_db: obs.volume_db,
            started_at: obs.started_at,
            last_error: obs.last_error.clone(),
        }
    }

    /// Sample the signal energy every tick and run the silence debounce.
    ///
    /// The debounce window is a one-shot timer armed only on the transition
    /// into sub-threshold territory; quiet ticks while it is pending leave
    /// it running, and any tick back above the threshold cancels it.
    async fn sample_loop(
        spectrum: Box<dyn SpectrumSource>,
        options: RecorderOptions,
        callbacks: RecorderCallbacks,
        silent: Arc<AtomicBool>,
        observed: Arc<Mutex<Observed>>,
    ) {
        let mut ticker = tokio::time::interval(options.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut debounce: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let db = volume_db(&spectrum.magnitudes());
                    observed.lock().await.volume_db = db;
                    if let Some(cb) = &callbacks.on_volume_change {
                        cb(db);
                    }

                    if db <= options.silence_threshold_db {
                        if !silent.load(Ordering::SeqCst) && debounce.is_none() {
                            debounce =
                                Some(Box::pin(tokio::time::sleep(options.silence_duration)));
                        }
                    } else {
                        debounce = None;
                        if silent.swap(false, Ordering::SeqCst) {
                            debug!("Silence ended at {:.1} dB", db);
                            if let Some(cb) = &callbacks.on_silence_end {
                                cb();
                            }
                        }
                    }
                }
                _ = async { debounce.as_mut().expect("window armed").await },
                        if debounce.is_some() => {
                    debounce = None;
                    silent.store(true, Ordering::SeqCst);
                    debug!("Silence started");
                    if let Some(cb) = &callbacks.on_silence_start {
                        cb();
                    }
                }
            }
        }
    }
}
