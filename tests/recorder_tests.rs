// Integration tests for the silence-aware recorder.
//
// The mock backend fulfils the capture contract: device access on start, a
// spectrum source the test can steer, and a chunk channel the test can feed.
// The spectrum is scripted in decibels and converted back into a magnitude
// buffer, so the recorder's own volume computation reproduces the scripted
// level. Tests run on paused time so the debounce window is deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use voicelink::recorder::{CaptureBackend, CaptureSession, SpectrumSource};
use voicelink::{RecorderCallbacks, RecorderError, RecorderOptions, SilenceAwareRecorder};

/// Magnitude buffer whose mean maps back to the given level through
/// `20 * log10(mean + 1)`.
fn magnitudes_for_db(db: f64) -> Vec<f32> {
    vec![(10f64.powf(db / 20.0) - 1.0) as f32]
}

struct SteeredSpectrum {
    level_db: Arc<Mutex<f64>>,
}

impl SpectrumSource for SteeredSpectrum {
    fn magnitudes(&self) -> Vec<f32> {
        magnitudes_for_db(*self.level_db.lock().unwrap())
    }
}

/// Test handle for steering the mock backend from outside the recorder.
#[derive(Clone)]
struct BackendControl {
    level_db: Arc<Mutex<f64>>,
    chunk_tx: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    capturing: Arc<AtomicBool>,
}

impl BackendControl {
    fn set_level(&self, db: f64) {
        *self.level_db.lock().unwrap() = db;
    }

    async fn feed_chunk(&self, chunk: Vec<u8>) {
        let tx = self
            .chunk_tx
            .lock()
            .unwrap()
            .as_ref()
            .expect("backend not started")
            .clone();
        let _ = tx.send(chunk).await;
    }
}

struct MockBackend {
    control: BackendControl,
    deny: Option<&'static str>,
}

impl MockBackend {
    fn working(initial_db: f64) -> (Box<dyn CaptureBackend>, BackendControl) {
        let control = BackendControl {
            level_db: Arc::new(Mutex::new(initial_db)),
            chunk_tx: Arc::new(Mutex::new(None)),
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            capturing: Arc::new(AtomicBool::new(false)),
        };
        let backend = Self {
            control: control.clone(),
            deny: None,
        };
        (Box::new(backend), control)
    }

    fn denying(reason: &'static str) -> Box<dyn CaptureBackend> {
        let (_, control) = Self::working(0.0);
        Box::new(Self {
            control,
            deny: Some(reason),
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MockBackend {
    async fn start(&mut self) -> Result<CaptureSession, RecorderError> {
        if let Some(reason) = self.deny {
            return Err(RecorderError::DeviceAccess(reason.to_string()));
        }

        self.control.starts.fetch_add(1, Ordering::SeqCst);
        self.control.capturing.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        *self.control.chunk_tx.lock().unwrap() = Some(tx);

        Ok(CaptureSession {
            spectrum: Box::new(SteeredSpectrum {
                level_db: Arc::clone(&self.control.level_db),
            }),
            chunks: rx,
        })
    }

    async fn stop(&mut self) -> Result<(), RecorderError> {
        self.control.stops.fetch_add(1, Ordering::SeqCst);
        self.control.capturing.store(false, Ordering::SeqCst);
        self.control.chunk_tx.lock().unwrap().take();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.control.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct Counters {
    silence_starts: Arc<AtomicUsize>,
    silence_ends: Arc<AtomicUsize>,
    volumes: Arc<Mutex<Vec<f64>>>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

fn counting_callbacks() -> (RecorderCallbacks, Counters) {
    let counters = Counters {
        silence_starts: Arc::new(AtomicUsize::new(0)),
        silence_ends: Arc::new(AtomicUsize::new(0)),
        volumes: Arc::new(Mutex::new(Vec::new())),
        chunks: Arc::new(Mutex::new(Vec::new())),
    };

    let callbacks = RecorderCallbacks {
        on_volume_change: Some({
            let volumes = Arc::clone(&counters.volumes);
            Arc::new(move |db| volumes.lock().unwrap().push(db))
        }),
        on_silence_start: Some({
            let starts = Arc::clone(&counters.silence_starts);
            Arc::new(move || {
                starts.fetch_add(1, Ordering::SeqCst);
            })
        }),
        on_silence_end: Some({
            let ends = Arc::clone(&counters.silence_ends);
            Arc::new(move || {
                ends.fetch_add(1, Ordering::SeqCst);
            })
        }),
        on_data_available: Some({
            let chunks = Arc::clone(&counters.chunks);
            Arc::new(move |chunk| chunks.lock().unwrap().push(chunk))
        }),
    };

    (callbacks, counters)
}

#[tokio::test(start_paused = true)]
async fn test_device_denial_surfaces_without_retry() {
    let (callbacks, _counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(
        MockBackend::denying("permission denied"),
        RecorderOptions::default(),
        callbacks,
    );

    let err = recorder.start_recording().await.unwrap_err();
    assert!(matches!(err, RecorderError::DeviceAccess(_)));
    assert!(!recorder.is_recording());
    assert!(!recorder.is_silent());

    let stats = recorder.stats().await;
    assert!(stats.last_error.unwrap().contains("permission denied"));
}

#[tokio::test(start_paused = true)]
async fn test_volume_is_sampled_each_tick() {
    let (backend, _control) = MockBackend::working(-10.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    recorder.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    // First tick fires immediately, then one per 100 ms.
    let volumes = counters.volumes.lock().unwrap().clone();
    assert_eq!(volumes.len(), 11);
    for v in volumes {
        assert!((v + 10.0).abs() < 0.01, "expected ~-10 dB, got {v}");
    }
    assert!((recorder.current_volume_db().await + 10.0).abs() < 0.01);

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silence_start_fires_once_after_debounce() {
    let (backend, _control) = MockBackend::working(-60.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    recorder.start_recording().await.unwrap();

    // Not before the window elapses.
    tokio::time::sleep(Duration::from_millis(1950)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 0);
    assert!(!recorder.is_silent());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 1);
    assert!(recorder.is_silent());

    // Staying below the threshold is one continuous run: no further events.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 1);
    assert_eq!(counters.silence_ends.load(Ordering::SeqCst), 0);

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_short_dip_below_threshold_never_fires() {
    let (backend, control) = MockBackend::working(-60.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    recorder.start_recording().await.unwrap();

    // Rise back above the threshold before the 2000 ms window elapses.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    control.set_level(-10.0);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 0);
    assert_eq!(counters.silence_ends.load(Ordering::SeqCst), 0);
    assert!(!recorder.is_silent());

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silence_end_fires_immediately_on_exit_edge() {
    // -60 dB for ~2100 ms then -10 dB: start fires once at ~2000 ms,
    // end fires once on the first loud tick.
    let (backend, control) = MockBackend::working(-60.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    let t0 = tokio::time::Instant::now();
    recorder.start_recording().await.unwrap();

    // Poll until the start edge fires, noting when.
    let mut fired = None;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if counters.silence_starts.load(Ordering::SeqCst) == 1 {
            fired = Some(t0.elapsed());
            break;
        }
    }
    let started_at = fired.expect("silence start never fired");
    assert!(
        started_at >= Duration::from_millis(2000) && started_at <= Duration::from_millis(2100),
        "silence start at {started_at:?}"
    );

    control.set_level(-10.0);
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Exit edge has no debounce and fires exactly once.
    assert_eq!(counters.silence_ends.load(Ordering::SeqCst), 1);
    assert!(!recorder.is_silent());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 1);
    assert_eq!(counters.silence_ends.load(Ordering::SeqCst), 1);

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_nonempty_chunks_reach_sink() {
    let (backend, control) = MockBackend::working(-10.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    recorder.start_recording().await.unwrap();

    control.feed_chunk(vec![1, 2, 3]).await;
    control.feed_chunk(Vec::new()).await;
    control.feed_chunk(vec![4]).await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Empty chunks are skipped; the rest arrive unmodified.
    assert_eq!(
        counters.chunks.lock().unwrap().clone(),
        vec![vec![1, 2, 3], vec![4]]
    );

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_resets_state() {
    let (backend, control) = MockBackend::working(-60.0);
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, RecorderOptions::default(), callbacks);

    recorder.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(recorder.is_silent());

    recorder.stop_recording().await.unwrap();
    recorder.stop_recording().await.unwrap();

    assert!(!recorder.is_recording());
    assert!(!recorder.is_silent());
    assert_eq!(control.stops.load(Ordering::SeqCst), 1);

    // No callback fires after teardown.
    let volumes_at_stop = counters.volumes.lock().unwrap().len();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(counters.volumes.lock().unwrap().len(), volumes_at_stop);
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_is_a_noop() {
    let (backend, control) = MockBackend::working(0.0);
    let recorder = SilenceAwareRecorder::new(
        backend,
        RecorderOptions::default(),
        RecorderCallbacks::default(),
    );

    recorder.stop_recording().await.unwrap();
    assert!(!recorder.is_recording());
    assert_eq!(control.stops.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reentrant_start_is_absorbed() {
    let (backend, control) = MockBackend::working(-10.0);
    let recorder = SilenceAwareRecorder::new(
        backend,
        RecorderOptions::default(),
        RecorderCallbacks::default(),
    );

    recorder.start_recording().await.unwrap();
    recorder.start_recording().await.unwrap();

    assert_eq!(control.starts.load(Ordering::SeqCst), 1);
    assert!(recorder.is_recording());

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_session_can_restart_after_stop() {
    let (backend, control) = MockBackend::working(-10.0);
    let recorder = SilenceAwareRecorder::new(
        backend,
        RecorderOptions::default(),
        RecorderCallbacks::default(),
    );

    recorder.start_recording().await.unwrap();
    recorder.stop_recording().await.unwrap();
    recorder.start_recording().await.unwrap();

    assert!(recorder.is_recording());
    assert_eq!(control.starts.load(Ordering::SeqCst), 2);

    recorder.stop_recording().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_custom_debounce_window() {
    let (backend, _control) = MockBackend::working(-60.0);
    let options = RecorderOptions {
        silence_duration: Duration::from_millis(500),
        ..Default::default()
    };
    let (callbacks, counters) = counting_callbacks();
    let recorder = SilenceAwareRecorder::new(backend, options, callbacks);

    recorder.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counters.silence_starts.load(Ordering::SeqCst), 1);

    recorder.stop_recording().await.unwrap();
}
