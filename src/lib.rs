//! # Pitchline - Real-time Pitch Detection
//!
//! Detects the fundamental frequency of live or recorded audio and reports
//! it as a musical note.
//!
//! ## Architecture
//!
//! Pitchline is an umbrella crate that coordinates:
//! - **pitchline-core** - Buffers, pitch values, configuration, state, errors
//! - **pitchline-analysis** - Transform (Hann, FFT) and estimation (spectral peaks, HPS, YIN)
//! - **pitchline-source** - WAV playback, hardware capture, record permission
//!
//! Work runs on three named executors:
//! - the source's acquisition thread (`pitchline-playback` / `pitchline-capture`)
//! - the processing pool (`pitchline-worker-N`), one job per buffer
//! - the delivery thread (`pitchline-delivery`), where every listener callback runs
//!
//! ## Quick Start
//!
//! ```ignore
//! use pitchline::prelude::*;
//!
//! struct Tuner;
//! impl PitchListener for Tuner {
//!     fn on_pitch(&self, pitch: Pitch) {
//!         println!("{:.1} Hz = {}", pitch.frequency(), pitch.note().name());
//!     }
//!     fn on_error(&self, _error: Error) {}
//! }
//!
//! let tuner = Arc::new(Tuner);
//! let engine = PitchEngine::builder()
//!     .estimation(EstimationStrategy::Quadratic)
//!     .listener(&tuner)
//!     .build()?;
//!
//! engine.start()?;
//! // ...
//! engine.stop();
//! ```
//!
//! ## Feature Flags
//!
//! - `input` (default) - Hardware capture via CPAL. Without it only file
//!   playback and custom sources are available.

/// Re-export of pitchline-core for direct access
pub use pitchline_core as core;

pub use pitchline_analysis as analysis;

pub use pitchline_source as source;

// Core types
pub use pitchline_core::{
    freq_to_midi, midi_to_freq, AnalysisBuffer, AudioTimestamp, Domain, EngineConfig, Error,
    EstimationStrategy, Mode, Note, Pitch, PipelineState, RawAudioBuffer, Result,
    TransformStrategy, MIN_BUFFER_SIZE, SPEED_OF_SOUND,
};

// Processing stages
pub use pitchline_analysis::{
    BufferTransform, Estimator, FrequencyEstimator, PeakRefinement, Transform, Yin,
};

// Sources
pub use pitchline_source::{
    AlwaysGranted, BufferObserver, FileSource, PermissionCallback, PermissionProvider,
    PermissionStatus, PromptPermission, SignalSource, SourceKind,
};

#[cfg(feature = "input")]
pub use pitchline_source::InputSource;

mod builder;
mod engine;
mod executor;
mod listener;
mod sequencer;

pub use builder::PitchEngineBuilder;
pub use engine::PitchEngine;
pub use listener::PitchListener;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{PitchEngine, PitchEngineBuilder, PitchListener};

    pub use crate::{
        EngineConfig, Error, EstimationStrategy, Mode, Note, Pitch, PipelineState, Result,
        TransformStrategy,
    };

    pub use crate::{PermissionProvider, PromptPermission, SignalSource};

    pub use std::sync::Arc;
}
