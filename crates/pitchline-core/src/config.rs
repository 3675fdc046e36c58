//! Pipeline configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest analysis window the estimators can work with.
pub const MIN_BUFFER_SIZE: usize = 64;

/// Transform stage selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStrategy {
    /// Mono downmix, no further processing.
    Passthrough,
    /// Mono downmix with a Hann window applied.
    Hann,
    /// Hann-windowed magnitude spectrum.
    #[default]
    Fft,
}

impl TransformStrategy {
    /// Whether this transform produces a spectrum.
    pub fn is_spectral(&self) -> bool {
        matches!(self, Self::Fft)
    }
}

/// Estimation stage selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationStrategy {
    /// Loudest spectrum bin.
    MaxValue,
    /// Loudest bin refined by parabolic interpolation.
    Quadratic,
    /// Loudest bin refined by the barycentric method.
    Barycentric,
    /// Loudest bin refined by Jain's method.
    Jains,
    /// Harmonic product spectrum.
    #[default]
    Hps,
    /// YIN, time domain.
    Yin,
}

impl EstimationStrategy {
    /// Whether this estimator expects a spectrum.
    pub fn is_spectral(&self) -> bool {
        !matches!(self, Self::Yin)
    }
}

/// Immutable configuration chosen at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per analysis window (default: 4096).
    pub buffer_size: usize,
    pub transform: TransformStrategy,
    pub estimation: EstimationStrategy,
    /// File to analyse. `None` records from the input device.
    pub audio_file: Option<PathBuf>,
    /// Input device name. `None` uses the host default.
    pub input_device: Option<String>,
    /// Processing pool size. `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    /// Deliver results in capture order (default: false).
    pub ordered_delivery: bool,
    /// Pace file decoding at the file's sample rate (default: true).
    pub realtime_playback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            transform: TransformStrategy::default(),
            estimation: EstimationStrategy::default(),
            audio_file: None,
            input_device: None,
            worker_threads: None,
            ordered_delivery: false,
            realtime_playback: true,
        }
    }
}

impl EngineConfig {
    /// Check option ranges and the transform/estimation pairing.
    ///
    /// Skip the pairing check with [`EngineConfig::validate_sizes`] when a
    /// custom stage replaces one of the built-in strategies.
    pub fn validate(&self) -> Result<()> {
        self.validate_sizes()?;

        if self.transform.is_spectral() != self.estimation.is_spectral() {
            return Err(Error::InvalidConfig(format!(
                "{:?} estimation cannot consume {:?} transform output",
                self.estimation, self.transform
            )));
        }
        Ok(())
    }

    pub fn validate_sizes(&self) -> Result<()> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "buffer_size {} below minimum {}",
                self.buffer_size, MIN_BUFFER_SIZE
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
