//! Test helpers and fixtures for Pitchline integration tests
//!
//! - [`ManualSource`]: a signal source driven by the test through a
//!   [`SourceHandle`], standing in for hardware or a file
//! - [`RecordingListener`]: collects callbacks into a channel
//! - [`ManualPermission`]: a permission provider answered by the test
//! - Fixed, silent and panicking estimators for pipeline behaviour tests

#![allow(dead_code)]

pub mod tolerances;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use pitchline::prelude::*;
use pitchline::{
    AnalysisBuffer, AudioTimestamp, BufferObserver, FrequencyEstimator, PermissionCallback,
    PermissionStatus, RawAudioBuffer, SourceKind,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 1024;

/// How long to wait for an expected callback.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to watch for callbacks that must not happen.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Opt-in log output: `RUST_LOG=pitchline=trace cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (0.8 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// Generate silence (zero samples).
pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Mono buffer at [`TEST_SAMPLE_RATE`].
pub fn mono_buffer(samples: Vec<f32>, frame_position: u64) -> RawAudioBuffer {
    RawAudioBuffer::mono(samples, AudioTimestamp::new(TEST_SAMPLE_RATE, frame_position))
}

/// Write mono 16-bit PCM.
pub fn write_wav(dir: &Path, name: &str, samples: &[f32], sample_rate: u32) -> PathBuf {
    write_wav_channels(dir, name, samples, 1, sample_rate)
}

/// Write interleaved 16-bit PCM.
pub fn write_wav_channels(
    dir: &Path,
    name: &str,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

// =============================================================================
// Listener
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Pitch(Pitch),
    Error(Error),
    Finished,
}

impl Event {
    pub fn pitch(&self) -> Option<&Pitch> {
        match self {
            Self::Pitch(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Collects every callback, plus the name of the thread it ran on.
pub struct RecordingListener {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    threads: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(Self {
            tx,
            rx,
            threads: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, event: Event) {
        let name = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();
        self.threads.lock().push(name);
        let _ = self.tx.send(event);
    }

    pub fn next(&self) -> Option<Event> {
        self.rx.recv_timeout(CALLBACK_TIMEOUT).ok()
    }

    /// Wait for exactly `n` events. Panics on timeout.
    pub fn take(&self, n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| {
                self.next()
                    .unwrap_or_else(|| panic!("timed out waiting for event {} of {n}", i + 1))
            })
            .collect()
    }

    /// Collect until `Finished`, inclusive. Panics on timeout.
    pub fn until_finished(&self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let event = self
                .next()
                .unwrap_or_else(|| panic!("timed out after {} events", events.len()));
            let done = event == Event::Finished;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    /// Panics if any callback arrives within [`QUIET_PERIOD`].
    pub fn assert_quiet(&self) {
        if let Ok(event) = self.rx.recv_timeout(QUIET_PERIOD) {
            panic!("unexpected callback: {event:?}");
        }
    }

    pub fn thread_names(&self) -> Vec<String> {
        self.threads.lock().clone()
    }
}

impl PitchListener for RecordingListener {
    fn on_pitch(&self, pitch: Pitch) {
        self.record(Event::Pitch(pitch));
    }

    fn on_error(&self, error: Error) {
        self.record(Event::Error(error));
    }

    fn on_finished(&self) {
        self.record(Event::Finished);
    }
}

// =============================================================================
// Source
// =============================================================================

#[derive(Default)]
struct SourceShared {
    observer: Mutex<Option<Arc<dyn BufferObserver>>>,
    running: Mutex<bool>,
    fail_start: Mutex<Option<Error>>,
    stop_gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// Source driven by the test through its [`SourceHandle`].
///
/// The last observer is kept after `stop()` so tests can simulate a
/// buffer arriving late. Like the real sources, `start()` on a running
/// source keeps its current observer.
pub struct ManualSource {
    kind: SourceKind,
    shared: Arc<SourceShared>,
}

/// Test-side controls of a [`ManualSource`].
#[derive(Clone)]
pub struct SourceHandle {
    shared: Arc<SourceShared>,
}

impl ManualSource {
    pub fn new(kind: SourceKind) -> (Box<dyn SignalSource>, SourceHandle) {
        let shared = Arc::new(SourceShared::default());
        let source: Box<dyn SignalSource> = Box::new(Self {
            kind,
            shared: Arc::clone(&shared),
        });
        (source, SourceHandle { shared })
    }

    pub fn file() -> (Box<dyn SignalSource>, SourceHandle) {
        Self::new(SourceKind::File)
    }

    pub fn input() -> (Box<dyn SignalSource>, SourceHandle) {
        Self::new(SourceKind::Input)
    }
}

impl SignalSource for ManualSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn start(&mut self, observer: Arc<dyn BufferObserver>) -> pitchline::Result<()> {
        if let Some(error) = self.shared.fail_start.lock().take() {
            return Err(error);
        }
        if *self.shared.running.lock() {
            return Ok(());
        }
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        *self.shared.observer.lock() = Some(observer);
        *self.shared.running.lock() = true;
        Ok(())
    }

    fn stop(&mut self) {
        let gate = self.shared.stop_gate.lock().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv();
        }
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        *self.shared.running.lock() = false;
    }

    fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }
}

impl SourceHandle {
    fn observer(&self) -> Arc<dyn BufferObserver> {
        self.shared
            .observer
            .lock()
            .clone()
            .expect("source was never started")
    }

    /// Deliver a buffer as the acquisition thread would.
    pub fn push(&self, buffer: RawAudioBuffer) {
        self.observer().on_buffer(buffer);
    }

    /// Push `count` buffers of `frames` samples at `value`.
    pub fn push_constant(&self, count: usize, frames: usize, value: f32) {
        for i in 0..count {
            self.push(mono_buffer(vec![value; frames], (i * frames) as u64));
        }
    }

    pub fn end_of_stream(&self) {
        *self.shared.running.lock() = false;
        self.observer().on_end_of_stream();
    }

    pub fn fail(&self, error: Error) {
        *self.shared.running.lock() = false;
        self.observer().on_source_error(error);
    }

    /// Make the next `stop()` block until the returned gate is released.
    pub fn hold_next_stop(&self) -> StopGate {
        let (entered_tx, entered) = unbounded();
        let (release, release_rx) = unbounded();
        *self.shared.stop_gate.lock() = Some((entered_tx, release_rx));
        StopGate { entered, release }
    }

    pub fn fail_next_start(&self, error: Error) {
        *self.shared.fail_start.lock() = Some(error);
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.lock()
    }
}

/// A `stop()` held inside the source.
pub struct StopGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl StopGate {
    /// Block until some thread is inside the held `stop()`.
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(CALLBACK_TIMEOUT)
            .expect("stop() was never called");
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

// =============================================================================
// Permission
// =============================================================================

/// Permission provider whose requests wait for [`ManualPermission::answer`].
pub struct ManualPermission {
    status: Mutex<PermissionStatus>,
    pending: Mutex<Vec<PermissionCallback>>,
    requests: AtomicUsize,
}

impl ManualPermission {
    pub fn new(status: PermissionStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            pending: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
        })
    }

    /// Resolve every outstanding request, as the user would.
    pub fn answer(&self, granted: bool) {
        *self.status.lock() = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        let pending = std::mem::take(&mut *self.pending.lock());
        for callback in pending {
            callback(granted);
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for ManualPermission {
    fn status(&self) -> PermissionStatus {
        *self.status.lock()
    }

    fn request(&self, on_result: PermissionCallback) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.status() {
            PermissionStatus::Granted => on_result(true),
            PermissionStatus::Denied => on_result(false),
            PermissionStatus::Undetermined => self.pending.lock().push(on_result),
        }
    }
}

// =============================================================================
// Estimators
// =============================================================================

/// Always reports the same frequency.
pub struct FixedEstimator(pub f32);

impl FrequencyEstimator for FixedEstimator {
    fn estimate(&self, _sample_rate: f64, _buffer: &AnalysisBuffer) -> pitchline::Result<f32> {
        Ok(self.0)
    }
}

/// Never finds a pitch.
pub struct SilentEstimator;

impl FrequencyEstimator for SilentEstimator {
    fn estimate(&self, _sample_rate: f64, _buffer: &AnalysisBuffer) -> pitchline::Result<f32> {
        Err(Error::NoPitchDetected)
    }
}

/// Panics on buffers whose first sample is negative.
pub struct PanickyEstimator;

impl FrequencyEstimator for PanickyEstimator {
    fn estimate(&self, _sample_rate: f64, buffer: &AnalysisBuffer) -> pitchline::Result<f32> {
        if buffer.samples.first().copied().unwrap_or(0.0) < 0.0 {
            panic!("negative input");
        }
        Ok(440.0)
    }
}

/// Engine over a [`ManualSource`] with identity transform and `estimator`.
pub fn manual_engine(
    source: Box<dyn SignalSource>,
    estimator: Arc<dyn FrequencyEstimator>,
    listener: &Arc<RecordingListener>,
) -> PitchEngine {
    PitchEngine::builder()
        .buffer_size(TEST_BUFFER_SIZE)
        .transform(TransformStrategy::Passthrough)
        .custom_estimator(estimator)
        .worker_threads(2)
        .source(source)
        .listener(listener)
        .build()
        .expect("Failed to create test engine")
}
