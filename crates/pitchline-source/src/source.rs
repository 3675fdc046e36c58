//! Source and observer traits shared by every acquisition backend.

use pitchline_core::{Error, Mode, RawAudioBuffer, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What a source reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live hardware input.
    Input,
    /// A pre-recorded file.
    File,
}

impl SourceKind {
    pub fn mode(self) -> Mode {
        match self {
            Self::Input => Mode::Record,
            Self::File => Mode::Playback,
        }
    }
}

/// Receives everything a running source produces.
///
/// Called from the source's acquisition thread, so implementations must
/// return quickly.
pub trait BufferObserver: Send + Sync {
    fn on_buffer(&self, buffer: RawAudioBuffer);

    /// The medium is exhausted. Not an error.
    fn on_end_of_stream(&self) {}

    /// Acquisition failed after a successful start. Reported at most once
    /// per start; the source produces nothing afterwards.
    fn on_source_error(&self, _error: Error) {}
}

/// Producer of raw audio buffers.
pub trait SignalSource: Send {
    fn kind(&self) -> SourceKind;

    /// Begin acquisition. Setup failures are returned here rather than
    /// through the observer. Starting a running source is a no-op.
    fn start(&mut self, observer: Arc<dyn BufferObserver>) -> Result<()>;

    /// Halt acquisition. Idempotent; once it returns the observer receives
    /// nothing further.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Running flag plus join handle of an acquisition thread.
#[derive(Debug, Default)]
pub(crate) struct AcquisitionThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AcquisitionThread {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Join any previous thread, then mark running.
    pub(crate) fn begin(&mut self) {
        self.reap();
        self.running.store(true, Ordering::Release);
    }

    pub(crate) fn attach(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.reap();
    }

    /// Join a finished or stopping thread. Never joins the calling thread.
    fn reap(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("acquisition thread panicked");
        }
    }
}

impl Drop for AcquisitionThread {
    fn drop(&mut self) {
        self.stop();
    }
}
