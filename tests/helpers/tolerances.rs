//! Tolerance constants for pitch testing.
//!
//! Spectral estimators are limited by bin width (44100 / 4096 ≈ 10.8 Hz);
//! interpolation and time-domain methods do much better.

/// Exact frequency passthrough (custom estimators, note math).
pub const FREQ_EPSILON: f64 = 1e-3;

/// Interpolated spectral peak or YIN on a clean sine, in Hz.
pub const REFINED_HZ: f64 = 3.0;

/// Uninterpolated spectral peak: half a bin at 4096 frames / 44.1 kHz.
pub const BIN_HZ: f64 = 5.4;

/// Largest acceptable deviation from the nearest note, in cents.
pub const CENTS: f64 = 15.0;
