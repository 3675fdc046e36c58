//! Result listener.

use crate::{Error, Pitch};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Receives pipeline results.
///
/// Every method runs on the `pitchline-delivery` thread, one call at a time.
/// The engine holds the listener weakly: once the host drops its `Arc`,
/// notifications are silently discarded.
pub trait PitchListener: Send + Sync {
    /// A buffer produced a pitch.
    fn on_pitch(&self, pitch: Pitch);

    /// A buffer produced no pitch, or acquisition failed.
    ///
    /// Per-buffer failures satisfy [`Error::is_recoverable`]; the pipeline
    /// keeps running. Source errors ([`Error::is_source_error`]) mean the
    /// pipeline has become inactive.
    fn on_error(&self, error: Error);

    /// A playback file has been fully analysed. Follows the outcome of
    /// every buffer of the file.
    fn on_finished(&self) {}
}

/// Weak listener registration, replaceable at any time.
#[derive(Default)]
pub(crate) struct ListenerSlot {
    inner: RwLock<Option<Weak<dyn PitchListener>>>,
}

impl ListenerSlot {
    pub(crate) fn set(&self, listener: Weak<dyn PitchListener>) {
        *self.inner.write() = Some(listener);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = None;
    }

    /// The listener, if registered and still alive.
    pub(crate) fn get(&self) -> Option<Arc<dyn PitchListener>> {
        self.inner.read().as_ref().and_then(|w| w.upgrade())
    }
}
