//! Shared types for the pitchline pipeline.
//!
//! # Primary API
//!
//! - [`RawAudioBuffer`] / [`AnalysisBuffer`]: data moving between stages
//! - [`Pitch`] / [`Note`]: detection results
//! - [`EngineConfig`]: construction-time options
//! - [`AtomicPipelineState`]: lock-free lifecycle state
//! - [`Error`]: the pipeline-wide error taxonomy

pub mod buffer;
pub mod config;
pub mod error;
pub mod pitch;
pub mod state;

pub use buffer::{AnalysisBuffer, AudioTimestamp, Domain, RawAudioBuffer};
pub use config::{EngineConfig, EstimationStrategy, TransformStrategy, MIN_BUFFER_SIZE};
pub use error::{Error, Result};
pub use pitch::{freq_to_midi, midi_to_freq, Note, Pitch, SPEED_OF_SOUND};
pub use state::{AtomicPipelineState, Mode, PipelineState};
