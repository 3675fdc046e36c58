//! # Pitchline Analysis
//!
//! The two processing stages of the pitch pipeline:
//! - **Transform**: mono downmix, optional Hann window, optional magnitude FFT
//! - **Estimation**: spectral peak search (max bin, quadratic, barycentric,
//!   Jain's), harmonic product spectrum, or YIN in the time domain
//!
//! Both stages are pure per call and hold only read-only state, so one
//! instance is shared by every worker thread.
//!
//! ## Example
//!
//! ```rust
//! use pitchline_analysis::{Estimator, Transform};
//! use pitchline_core::{AudioTimestamp, EstimationStrategy, RawAudioBuffer, TransformStrategy};
//!
//! let samples: Vec<f32> = (0..4096)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//! let raw = RawAudioBuffer::mono(samples, AudioTimestamp::new(44100.0, 0));
//!
//! let transform = Transform::from_strategy(TransformStrategy::Fft, 4096);
//! let estimator = Estimator::from_strategy(EstimationStrategy::Quadratic);
//!
//! let spectrum = transform.transform(&raw).unwrap();
//! let hz = estimator.estimate(44100.0, &spectrum).unwrap();
//! assert!((hz - 440.0).abs() < 2.0);
//! ```

pub mod estimate;
pub mod transform;

pub use estimate::{Estimator, FrequencyEstimator, PeakRefinement, Yin};
pub use transform::{BufferTransform, HannWindow, SpectrumTransform, Transform};
