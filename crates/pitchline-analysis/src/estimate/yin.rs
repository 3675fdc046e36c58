//! Pitch estimation using the YIN algorithm
//!
//! YIN (de Cheveigné & Kawahara, 2002) works on the difference between a
//! window and lagged copies of itself. The difference is normalised by its
//! running mean, the first lag dipping under the threshold is taken as the
//! period, and a parabola through the trough gives the fractional lag.
//!
//! Scratch buffers are allocated per call so a single [`Yin`] can serve
//! every worker thread at once.

use pitchline_core::{AnalysisBuffer, Domain, Error, Result};

/// YIN estimator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yin {
    min_freq: f32,
    max_freq: f32,
    threshold: f32,
}

impl Default for Yin {
    fn default() -> Self {
        Self::with_range(50.0, 2000.0)
    }
}

impl Yin {
    /// Create with custom frequency range
    ///
    /// # Arguments
    /// * `min_freq` - Minimum detectable frequency (default: 50 Hz)
    /// * `max_freq` - Maximum detectable frequency (default: 2000 Hz)
    pub fn with_range(min_freq: f32, max_freq: f32) -> Self {
        Self {
            min_freq,
            max_freq,
            threshold: 0.1,
        }
    }

    /// Set YIN threshold (0.01 - 0.5)
    ///
    /// Lower values are stricter and may miss quiet notes.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.01, 0.5);
        self
    }

    pub fn estimate(&self, sample_rate: f64, buffer: &AnalysisBuffer) -> Result<f32> {
        if buffer.domain != Domain::Time {
            return Err(Error::TransformFailure(
                "YIN received a spectrum instead of time-domain samples".into(),
            ));
        }
        let samples = &buffer.samples;

        let min_period = ((sample_rate / self.max_freq as f64) as usize).max(2);
        let max_period = ((sample_rate / self.min_freq as f64) as usize).min(samples.len() / 2);

        if max_period <= min_period {
            return Err(Error::InsufficientSignal {
                required: 2 * (min_period + 1),
                actual: samples.len(),
            });
        }

        let difference = difference(samples, max_period);
        let cumulative = cumulative_mean(&difference);

        let Some((period, aperiodicity)) =
            best_period(&cumulative, min_period, max_period, self.threshold)
        else {
            return Err(Error::NoPitchDetected);
        };

        let refined = parabolic_interpolation(&cumulative, period, max_period);
        let frequency = (sample_rate / refined) as f32;

        if !frequency.is_finite() || aperiodicity >= 0.5 {
            return Err(Error::NoPitchDetected);
        }
        Ok(frequency)
    }
}

/// Squared distance between the first `max_period` samples and the same
/// window shifted by each lag.
///
/// Expanded as `E(0) + E(lag) - 2 * cross(lag)`, where the shifted window's
/// energy `E(lag)` slides by one sample per lag. Requires
/// `samples.len() >= 2 * max_period`.
fn difference(samples: &[f32], max_period: usize) -> Vec<f32> {
    let square = |x: f32| (x as f64) * (x as f64);
    let window = &samples[..max_period];
    let base: f64 = window.iter().copied().map(square).sum();

    let mut shifted = base;
    let mut out = Vec::with_capacity(max_period + 1);
    out.push(0.0);
    for lag in 1..=max_period {
        shifted += square(samples[lag + max_period - 1]) - square(samples[lag - 1]);
        let cross: f64 = window
            .iter()
            .zip(&samples[lag..])
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum();
        out.push((base + shifted - 2.0 * cross).max(0.0) as f32);
    }
    out
}

/// Each lag's difference divided by the mean difference over lags `1..=lag`.
/// Lag zero, and any lag preceded only by silence, is pinned to 1.
fn cumulative_mean(difference: &[f32]) -> Vec<f32> {
    let mut total = 0.0f32;
    std::iter::once(1.0)
        .chain(difference.iter().enumerate().skip(1).map(|(lag, &d)| {
            total += d;
            if total > 1e-10 {
                d * lag as f32 / total
            } else {
                1.0
            }
        }))
        .collect()
}

/// Earliest dip under `threshold`, followed down to its trough. Without
/// one, the deepest lag in range if it is under 0.5.
fn best_period(
    cumulative: &[f32],
    min_period: usize,
    max_period: usize,
    threshold: f32,
) -> Option<(usize, f32)> {
    if let Some(mut lag) = (min_period..max_period).find(|&lag| cumulative[lag] < threshold) {
        while lag + 1 < max_period && cumulative[lag + 1] < cumulative[lag] {
            lag += 1;
        }
        return Some((lag, cumulative[lag]));
    }

    (min_period..=max_period)
        .map(|lag| (lag, cumulative[lag]))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|&(_, value)| value < 0.5)
}

/// Fractional lag at the vertex of the parabola fitted to the trough and
/// its two neighbours.
fn parabolic_interpolation(cumulative: &[f32], lag: usize, max_period: usize) -> f64 {
    if lag == 0 || lag >= max_period {
        return lag as f64;
    }

    let (left, mid, right) = (
        cumulative[lag - 1] as f64,
        cumulative[lag] as f64,
        cumulative[lag + 1] as f64,
    );
    let curvature = left + right - 2.0 * mid;
    if curvature.abs() > 1e-10 {
        lag as f64 + 0.5 * (left - right) / curvature
    } else {
        lag as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(sample_rate: f64, freq: f32, len: usize) -> AnalysisBuffer {
        AnalysisBuffer::time(
            (0..len)
                .map(|i| {
                    let t = i as f32 / sample_rate as f32;
                    (2.0 * std::f32::consts::PI * freq * t).sin()
                })
                .collect(),
        )
    }

    #[test]
    fn test_detect_a440() {
        let hz = Yin::default()
            .estimate(44100.0, &generate_sine(44100.0, 440.0, 4096))
            .unwrap();
        approx::assert_abs_diff_eq!(hz, 440.0, epsilon = 5.0);
    }

    #[test]
    fn test_detect_various_frequencies() {
        let yin = Yin::default();
        for freq in [100.0, 220.0, 440.0, 880.0, 1000.0] {
            let hz = yin
                .estimate(44100.0, &generate_sine(44100.0, freq, 4096))
                .unwrap();
            let error_percent = ((hz - freq) / freq).abs() * 100.0;
            assert!(error_percent < 2.0, "Expected {freq}Hz, got {hz}Hz");
        }
    }

    #[test]
    fn test_silence_is_no_pitch() {
        let silence = AnalysisBuffer::time(vec![0.0; 4096]);
        assert_eq!(
            Yin::default().estimate(44100.0, &silence),
            Err(Error::NoPitchDetected)
        );
    }

    #[test]
    fn test_short_buffer_is_insufficient() {
        let short = AnalysisBuffer::time(vec![0.1; 32]);
        assert!(matches!(
            Yin::default().estimate(44100.0, &short),
            Err(Error::InsufficientSignal { .. })
        ));
    }

    #[test]
    fn test_spectrum_rejected() {
        let spectrum = AnalysisBuffer::spectrum(vec![0.0; 513], 1024);
        assert!(matches!(
            Yin::default().estimate(44100.0, &spectrum),
            Err(Error::TransformFailure(_))
        ));
    }

    #[test]
    fn test_difference_matches_direct_sum() {
        let samples: Vec<f32> = (0..64).map(|i| ((i * 7919) % 31) as f32 / 31.0 - 0.5).collect();
        let max_period = 32;
        let fast = difference(&samples, max_period);

        for lag in 0..=max_period {
            let direct: f32 = (0..max_period)
                .map(|j| (samples[j] - samples[j + lag]).powi(2))
                .sum();
            approx::assert_abs_diff_eq!(fast[lag], direct, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_threshold_clamped() {
        let yin = Yin::default().threshold(5.0);
        assert_eq!(yin.threshold, 0.5);
    }
}
