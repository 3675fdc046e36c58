//! PitchEngine that coordinates acquisition, processing and delivery

use crate::executor::DeliveryExecutor;
use crate::listener::{ListenerSlot, PitchListener};
use crate::sequencer::Sequencer;
use crate::{
    BufferObserver, EngineConfig, Error, Estimator, Mode, PermissionProvider, PermissionStatus,
    Pitch, PipelineState, RawAudioBuffer, Result, SignalSource, SourceKind, Transform,
};
use parking_lot::Mutex;
use pitchline_core::AtomicPipelineState;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// No playback is waiting for its final outcomes.
const NOT_FINISHING: u64 = 0;

/// Real-time pitch detection pipeline.
///
/// Buffers from the signal source are transformed and analysed on the
/// processing pool, and each outcome is handed to the [`PitchListener`] on
/// the delivery thread. Exactly one `on_pitch` or `on_error` follows every
/// buffer accepted while the pipeline is active.
///
/// # Example
///
/// ```ignore
/// use pitchline::prelude::*;
///
/// struct Printer;
/// impl PitchListener for Printer {
///     fn on_pitch(&self, pitch: Pitch) {
///         println!("{} ({:+.0} cents)", pitch.note().name(), pitch.cents_offset());
///     }
///     fn on_error(&self, error: Error) {
///         eprintln!("{error}");
///     }
/// }
///
/// let printer = Arc::new(Printer);
/// let engine = PitchEngine::builder()
///     .audio_file("a440.wav")
///     .listener(&printer)
///     .build()?;
///
/// engine.start()?;
/// ```
pub struct PitchEngine {
    shared: Arc<EngineShared>,
}

/// State shared by the engine handle, the source observer, pool jobs and
/// delivery tasks. Everything but the handle holds it weakly.
pub(crate) struct EngineShared {
    config: EngineConfig,
    kind: SourceKind,
    state: AtomicPipelineState,
    /// Session generation. Advanced by `start()`, `stop()` and source failure.
    generation: AtomicU64,
    /// Next per-session buffer sequence number.
    sequence: AtomicU64,
    in_flight: AtomicUsize,
    /// Generation whose playback ended and awaits `on_finished`.
    finishing: AtomicU64,
    transform: Transform,
    estimator: Estimator,
    source: Mutex<Box<dyn SignalSource>>,
    permission: Arc<dyn PermissionProvider>,
    listener: ListenerSlot,
    pool: rayon::ThreadPool,
    delivery: DeliveryExecutor,
    /// Touched only on the delivery thread.
    sequencer: Option<Mutex<Sequencer<Result<Pitch>>>>,
}

/// Everything the builder resolved.
pub(crate) struct EngineParts {
    pub config: EngineConfig,
    pub transform: Transform,
    pub estimator: Estimator,
    pub source: Box<dyn SignalSource>,
    pub permission: Arc<dyn PermissionProvider>,
    pub listener: Option<Weak<dyn PitchListener>>,
    pub pool: rayon::ThreadPool,
    pub delivery: DeliveryExecutor,
}

impl PitchEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::PitchEngineBuilder {
        crate::PitchEngineBuilder::default()
    }

    pub(crate) fn from_parts(parts: EngineParts) -> Self {
        let kind = parts.source.kind();
        let listener = ListenerSlot::default();
        if let Some(weak) = parts.listener {
            listener.set(weak);
        }
        let sequencer = parts
            .config
            .ordered_delivery
            .then(|| Mutex::new(Sequencer::default()));

        Self {
            shared: Arc::new(EngineShared {
                config: parts.config,
                kind,
                state: AtomicPipelineState::default(),
                generation: AtomicU64::new(0),
                sequence: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                finishing: AtomicU64::new(NOT_FINISHING),
                transform: parts.transform,
                estimator: parts.estimator,
                source: Mutex::new(parts.source),
                permission: parts.permission,
                listener,
                pool: parts.pool,
                delivery: parts.delivery,
                sequencer,
            }),
        }
    }

    /// Begin acquisition.
    ///
    /// A no-op unless the pipeline is [`PipelineState::Inactive`].
    ///
    /// Playback starts the file source on the calling thread. Record first
    /// asks the permission provider and starts capture on the delivery
    /// thread once granted; if permission was already denied this returns
    /// [`Error::PermissionDenied`] without prompting.
    ///
    /// Source failures after this point are reported through
    /// [`PitchListener::on_error`], never as the return value.
    pub fn start(&self) -> Result<()> {
        let shared = &self.shared;
        match self.mode() {
            Mode::Playback => {
                if !shared
                    .state
                    .transition(PipelineState::Inactive, PipelineState::Active)
                {
                    return Ok(());
                }
                let generation = shared.begin_session();
                tracing::info!(generation, "starting playback");
                shared.start_source(generation);
                Ok(())
            }
            Mode::Record => {
                if shared.state.load() != PipelineState::Inactive {
                    return Ok(());
                }
                if shared.permission.status() == PermissionStatus::Denied {
                    tracing::warn!("record permission previously denied");
                    return Err(Error::PermissionDenied);
                }
                if !shared
                    .state
                    .transition(PipelineState::Inactive, PipelineState::AwaitingPermission)
                {
                    return Ok(());
                }
                let generation = shared.begin_session();
                tracing::info!(generation, "requesting record permission");

                let weak = Arc::downgrade(shared);
                shared.permission.request(Box::new(move |granted| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_permission(generation, granted);
                    }
                }));
                Ok(())
            }
        }
    }

    /// Halt acquisition.
    ///
    /// Idempotent and silent: no callback results from stopping, and
    /// outcomes still in flight are discarded. A callback already running
    /// on the delivery thread is allowed to finish.
    pub fn stop(&self) {
        let shared = &self.shared;
        let was = shared.state.load();
        {
            // `start_source` checks the generation under the same lock.
            let mut source = shared.source.lock();
            source.stop();
            shared.state.store(PipelineState::Inactive);
            shared.generation.fetch_add(1, Ordering::AcqRel);
        }
        if was != PipelineState::Inactive {
            tracing::info!("pipeline stopped");
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state.load()
    }

    pub fn is_active(&self) -> bool {
        self.state() == PipelineState::Active
    }

    /// Playback for file sources, Record for live input.
    pub fn mode(&self) -> Mode {
        self.shared.kind.mode()
    }

    pub fn buffer_size(&self) -> usize {
        self.shared.config.buffer_size
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Replace the listener. Held weakly.
    pub fn set_listener<L: PitchListener + 'static>(&self, listener: &Arc<L>) {
        let weak: Weak<dyn PitchListener> = Arc::downgrade(listener) as Weak<dyn PitchListener>;
        self.shared.listener.set(weak);
    }

    pub fn clear_listener(&self) {
        self.shared.listener.clear();
    }
}

impl Drop for PitchEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PitchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchEngine")
            .field("mode", &self.mode())
            .field("state", &self.state())
            .field("transform", &self.shared.transform)
            .field("estimator", &self.shared.estimator)
            .finish()
    }
}

impl EngineShared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Open a new session and return its generation.
    fn begin_session(&self) -> u64 {
        self.sequence.store(0, Ordering::Relaxed);
        self.finishing.store(NOT_FINISHING, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Start the source for session `generation`, unless a `stop()` has
    /// retired the session since it was marked Active.
    fn start_source(self: &Arc<Self>, generation: u64) {
        let observer: Arc<dyn BufferObserver> = Arc::new(SessionObserver {
            shared: Arc::downgrade(self),
            generation,
        });

        let mut source = self.source.lock();
        if !self.is_current(generation) || self.state.load() != PipelineState::Active {
            tracing::debug!(generation, "session stopped before its source started");
            return;
        }
        let result = source.start(observer);
        drop(source);

        if let Err(error) = result {
            tracing::warn!("source failed to start: {error}");
            if self.is_current(generation) {
                self.state
                    .transition(PipelineState::Active, PipelineState::Inactive);
            }
            self.report(generation, error);
        }
    }

    fn on_permission(self: &Arc<Self>, generation: u64, granted: bool) {
        if !granted {
            if self.is_current(generation)
                && self
                    .state
                    .transition(PipelineState::AwaitingPermission, PipelineState::Inactive)
            {
                tracing::warn!("record permission denied");
                self.report(generation, Error::PermissionDenied);
            }
            return;
        }

        let weak = Arc::downgrade(self);
        self.delivery.submit(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(generation)
                || !shared
                    .state
                    .transition(PipelineState::AwaitingPermission, PipelineState::Active)
            {
                tracing::debug!(generation, "permission granted to a stale session");
                return;
            }
            tracing::info!(generation, "record permission granted, starting capture");
            shared.start_source(generation);
        }));
    }

    fn dispatch(self: &Arc<Self>, generation: u64, buffer: RawAudioBuffer) {
        if self.state.load() != PipelineState::Active || !self.is_current(generation) {
            tracing::trace!(
                frames = buffer.frames(),
                "pipeline inactive, dropping buffer"
            );
            return;
        }

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let weak = Arc::downgrade(self);
        self.pool.spawn(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let outcome = shared.process(&buffer);
            shared.deliver_outcome(generation, seq, outcome);

            if shared.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                shared.check_finished();
            }
        });
    }

    /// Transform then estimate one buffer. Stage panics become errors.
    fn process(&self, buffer: &RawAudioBuffer) -> Result<Pitch> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let analysed = self.transform.transform(buffer)?;
            let hz = self.estimator.estimate(buffer.sample_rate(), &analysed)?;
            Pitch::new(hz as f64)
        }));

        result.unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("processing stage panicked: {message}");
            Err(Error::StagePanicked(message))
        })
    }

    fn deliver_outcome(self: &Arc<Self>, generation: u64, seq: u64, outcome: Result<Pitch>) {
        let weak = Arc::downgrade(self);
        self.delivery.submit(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(generation) {
                tracing::trace!(generation, seq, "discarding outcome of stale session");
                return;
            }
            match &shared.sequencer {
                Some(sequencer) => {
                    let ready = sequencer.lock().push(generation, seq, outcome);
                    for outcome in ready {
                        shared.notify(outcome);
                    }
                }
                None => shared.notify(outcome),
            }
        }));
    }

    /// Deliver `error` once, unless the session has since been stopped.
    fn report(self: &Arc<Self>, generation: u64, error: Error) {
        let weak = Arc::downgrade(self);
        self.delivery.submit(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                if shared.is_current(generation) {
                    shared.notify(Err(error));
                }
            }
        }));
    }

    fn notify(&self, outcome: Result<Pitch>) {
        let Some(listener) = self.listener.get() else {
            tracing::trace!("no listener, outcome dropped");
            return;
        };
        match outcome {
            Ok(pitch) => listener.on_pitch(pitch),
            Err(error) => listener.on_error(error),
        }
    }

    fn on_end_of_stream(self: &Arc<Self>, generation: u64) {
        if !self.is_current(generation)
            || !self
                .state
                .transition(PipelineState::Active, PipelineState::Inactive)
        {
            return;
        }
        tracing::info!(generation, "end of stream");
        self.finishing.store(generation, Ordering::SeqCst);
        self.check_finished();
    }

    /// Queue `on_finished` once the ended session has no buffers in flight.
    fn check_finished(self: &Arc<Self>) {
        let generation = self.finishing.load(Ordering::SeqCst);
        if generation == NOT_FINISHING || self.in_flight.load(Ordering::SeqCst) != 0 {
            return;
        }
        if self
            .finishing
            .compare_exchange(generation, NOT_FINISHING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let weak = Arc::downgrade(self);
        self.delivery.submit(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(generation) {
                return;
            }
            if let Some(listener) = shared.listener.get() {
                listener.on_finished();
            }
        }));
    }

    fn on_source_error(self: &Arc<Self>, generation: u64, error: Error) {
        let stopped = generation + 1;
        if self
            .generation
            .compare_exchange(generation, stopped, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("source error from stale session: {error}");
            return;
        }
        self.state.store(PipelineState::Inactive);
        tracing::error!("source failed: {error}");

        let weak = Arc::downgrade(self);
        self.delivery.submit(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            // A newer session may already own the source.
            let mut source = shared.source.lock();
            if shared.is_current(stopped) {
                source.stop();
            }
            drop(source);
            shared.notify(Err(error));
        }));
    }
}

/// The observer handed to the source for one session.
struct SessionObserver {
    shared: Weak<EngineShared>,
    generation: u64,
}

impl BufferObserver for SessionObserver {
    fn on_buffer(&self, buffer: RawAudioBuffer) {
        if let Some(shared) = self.shared.upgrade() {
            shared.dispatch(self.generation, buffer);
        }
    }

    fn on_end_of_stream(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_end_of_stream(self.generation);
        }
    }

    fn on_source_error(&self, error: Error) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_source_error(self.generation, error);
        }
    }
}
