//! Estimation stage: analysis buffer → fundamental frequency.

mod spectral;
mod yin;

pub use spectral::{
    estimate_hps, estimate_peak, PeakRefinement, MAGNITUDE_FLOOR, MAX_PEAK_HZ, MIN_PEAK_HZ,
};
pub use yin::Yin;

use pitchline_core::{AnalysisBuffer, EstimationStrategy, Result};
use std::fmt;
use std::sync::Arc;

/// A host-supplied estimation stage.
///
/// Implementations must be pure per call and safe to invoke concurrently.
/// Return [`pitchline_core::Error::NoPitchDetected`] when the buffer holds
/// no usable pitch.
pub trait FrequencyEstimator: Send + Sync {
    fn estimate(&self, sample_rate: f64, buffer: &AnalysisBuffer) -> Result<f32>;
}

/// The estimation stage used by the pipeline.
#[derive(Clone)]
pub enum Estimator {
    MaxValue,
    Quadratic,
    Barycentric,
    Jains,
    Hps,
    Yin(Yin),
    Custom(Arc<dyn FrequencyEstimator>),
}

impl Estimator {
    pub fn from_strategy(strategy: EstimationStrategy) -> Self {
        match strategy {
            EstimationStrategy::MaxValue => Self::MaxValue,
            EstimationStrategy::Quadratic => Self::Quadratic,
            EstimationStrategy::Barycentric => Self::Barycentric,
            EstimationStrategy::Jains => Self::Jains,
            EstimationStrategy::Hps => Self::Hps,
            EstimationStrategy::Yin => Self::Yin(Yin::default()),
        }
    }

    pub fn custom(estimator: Arc<dyn FrequencyEstimator>) -> Self {
        Self::Custom(estimator)
    }

    /// Whether this estimator expects a spectrum. `None` for custom stages.
    pub fn is_spectral(&self) -> Option<bool> {
        match self {
            Self::Yin(_) => Some(false),
            Self::Custom(_) => None,
            _ => Some(true),
        }
    }

    pub fn estimate(&self, sample_rate: f64, buffer: &AnalysisBuffer) -> Result<f32> {
        match self {
            Self::MaxValue => estimate_peak(sample_rate, buffer, PeakRefinement::None),
            Self::Quadratic => estimate_peak(sample_rate, buffer, PeakRefinement::Quadratic),
            Self::Barycentric => estimate_peak(sample_rate, buffer, PeakRefinement::Barycentric),
            Self::Jains => estimate_peak(sample_rate, buffer, PeakRefinement::Jains),
            Self::Hps => estimate_hps(sample_rate, buffer),
            Self::Yin(yin) => yin.estimate(sample_rate, buffer),
            Self::Custom(custom) => custom.estimate(sample_rate, buffer),
        }
    }
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxValue => f.write_str("MaxValue"),
            Self::Quadratic => f.write_str("Quadratic"),
            Self::Barycentric => f.write_str("Barycentric"),
            Self::Jains => f.write_str("Jains"),
            Self::Hps => f.write_str("Hps"),
            Self::Yin(yin) => f.debug_tuple("Yin").field(yin).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}
