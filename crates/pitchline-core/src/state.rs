//! Pipeline state machine storage.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PipelineState {
    #[default]
    Inactive = 0,
    AwaitingPermission = 1,
    Active = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::AwaitingPermission,
            2 => Self::Active,
            _ => Self::Inactive,
        }
    }
}

/// Acquisition mode, derived from the signal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Record,
    Playback,
}

/// Cache-line aligned atomic [`PipelineState`].
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicPipelineState {
    value: AtomicU8,
}

impl AtomicPipelineState {
    pub fn new(state: PipelineState) -> Self {
        Self {
            value: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn load(&self) -> PipelineState {
        PipelineState::from_u8(self.value.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, state: PipelineState) {
        self.value.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to` if the current state is `from`.
    #[inline]
    pub fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicPipelineState {
    fn default() -> Self {
        Self::new(PipelineState::Inactive)
    }
}
