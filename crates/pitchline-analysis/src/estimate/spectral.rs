//! Spectral peak estimators.
//!
//! All of them locate the loudest bin of a magnitude spectrum inside the
//! search band and differ only in how the bin is refined into a frequency.

use pitchline_core::{AnalysisBuffer, Domain, Error, Result};

/// Lowest frequency searched, in Hz.
pub const MIN_PEAK_HZ: f64 = 20.0;
/// Highest frequency searched, in Hz.
pub const MAX_PEAK_HZ: f64 = 4200.0;
/// Peaks quieter than this are treated as silence.
pub const MAGNITUDE_FLOOR: f32 = 1e-3;

/// Harmonics multiplied together by the HPS estimator.
const HPS_HARMONICS: usize = 5;

/// How the loudest bin is refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakRefinement {
    None,
    Quadratic,
    Barycentric,
    Jains,
}

/// Spectrum bins plus FFT size, validated for peak search.
struct Spectrum<'a> {
    bins: &'a [f32],
    fft_size: usize,
}

impl<'a> Spectrum<'a> {
    fn from_buffer(buffer: &'a AnalysisBuffer) -> Result<Self> {
        let Domain::Spectrum { fft_size } = buffer.domain else {
            return Err(Error::TransformFailure(
                "spectral estimator received time-domain buffer".into(),
            ));
        };
        if buffer.len() < 3 {
            return Err(Error::InsufficientSignal {
                required: 3,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            bins: &buffer.samples,
            fft_size,
        })
    }

    /// Inclusive bin range for the search band, leaving one neighbour on each side.
    fn search_range(&self, sample_rate: f64, highest: usize) -> Result<(usize, usize)> {
        let per_bin = sample_rate / self.fft_size as f64;
        let lo = ((MIN_PEAK_HZ / per_bin).ceil() as usize).max(1);
        let hi = ((MAX_PEAK_HZ / per_bin).floor() as usize)
            .min(self.bins.len() - 2)
            .min(highest);

        if lo > hi {
            return Err(Error::InsufficientSignal {
                required: lo + 2,
                actual: self.bins.len(),
            });
        }
        Ok((lo, hi))
    }

    fn loudest(&self, lo: usize, hi: usize) -> usize {
        let mut best = lo;
        for i in lo..=hi {
            if self.bins[i] > self.bins[best] {
                best = i;
            }
        }
        best
    }

    fn to_hz(&self, bin: f64, sample_rate: f64) -> f32 {
        (bin * sample_rate / self.fft_size as f64) as f32
    }
}

/// Loudest bin in the search band, refined by `refinement`.
pub fn estimate_peak(
    sample_rate: f64,
    buffer: &AnalysisBuffer,
    refinement: PeakRefinement,
) -> Result<f32> {
    let spectrum = Spectrum::from_buffer(buffer)?;
    let (lo, hi) = spectrum.search_range(sample_rate, usize::MAX)?;
    let peak = spectrum.loudest(lo, hi);

    if spectrum.bins[peak] < MAGNITUDE_FLOOR {
        return Err(Error::NoPitchDetected);
    }

    let bin = refine(spectrum.bins, peak, refinement);
    Ok(spectrum.to_hz(bin, sample_rate))
}

/// Harmonic product spectrum.
///
/// Sums log magnitudes at `k, 2k, ..., 5k` and returns the best `k`.
pub fn estimate_hps(sample_rate: f64, buffer: &AnalysisBuffer) -> Result<f32> {
    let spectrum = Spectrum::from_buffer(buffer)?;
    let highest = (spectrum.bins.len() - 1) / HPS_HARMONICS;
    let (lo, hi) = spectrum.search_range(sample_rate, highest)?;

    let score = |k: usize| -> f32 {
        (1..=HPS_HARMONICS)
            .map(|h| (spectrum.bins[k * h] + 1e-12).ln())
            .sum()
    };

    let mut best = lo;
    let mut best_score = score(lo);
    for k in lo + 1..=hi {
        let s = score(k);
        if s > best_score {
            best = k;
            best_score = s;
        }
    }

    if spectrum.bins[best] < MAGNITUDE_FLOOR {
        return Err(Error::NoPitchDetected);
    }

    Ok(spectrum.to_hz(best as f64, sample_rate))
}

fn refine(bins: &[f32], peak: usize, refinement: PeakRefinement) -> f64 {
    let l = bins[peak - 1] as f64;
    let c = bins[peak] as f64;
    let r = bins[peak + 1] as f64;
    let peak = peak as f64;

    match refinement {
        PeakRefinement::None => peak,
        PeakRefinement::Quadratic => {
            let denom = l - 2.0 * c + r;
            if denom.abs() < 1e-12 {
                peak
            } else {
                peak + 0.5 * (l - r) / denom
            }
        }
        PeakRefinement::Barycentric => {
            let sum = l + c + r;
            if sum <= 0.0 {
                peak
            } else {
                peak + (r - l) / sum
            }
        }
        PeakRefinement::Jains => {
            if l > r {
                let a = c / l;
                peak - 1.0 + a / (1.0 + a)
            } else {
                let a = r / c;
                peak + a / (1.0 + a)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::SpectrumTransform;
    use pitchline_core::{AudioTimestamp, RawAudioBuffer};

    const SR: f64 = 44100.0;
    const N: usize = 4096;

    fn spectrum_of(partials: &[(f64, f32)]) -> AnalysisBuffer {
        let samples: Vec<f32> = (0..N)
            .map(|i| {
                partials
                    .iter()
                    .map(|&(f, a)| a * (2.0 * std::f64::consts::PI * f * i as f64 / SR).sin() as f32)
                    .sum()
            })
            .collect();
        let raw = RawAudioBuffer::mono(samples, AudioTimestamp::new(SR, 0));
        SpectrumTransform::new(N).transform(&raw).unwrap()
    }

    #[test]
    fn test_refinements_track_a440() {
        let spectrum = spectrum_of(&[(440.0, 1.0)]);
        let bin_width = (SR / N as f64) as f32;

        for (refinement, tolerance) in [
            (PeakRefinement::None, bin_width / 2.0),
            (PeakRefinement::Quadratic, 2.0),
            (PeakRefinement::Barycentric, bin_width / 2.0),
            (PeakRefinement::Jains, bin_width / 2.0),
        ] {
            let hz = estimate_peak(SR, &spectrum, refinement).unwrap();
            assert!(
                (hz - 440.0).abs() < tolerance,
                "{refinement:?}: expected ~440 Hz, got {hz} Hz"
            );
        }
    }

    #[test]
    fn test_hps_prefers_fundamental() {
        // Fundamental exactly on bin 40 so every harmonic lands on a bin
        let f0 = 40.0 * SR / N as f64;
        let partials: Vec<(f64, f32)> = (1..=6).map(|h| (f0 * h as f64, 1.0 / h as f32)).collect();
        let spectrum = spectrum_of(&partials);

        let hz = estimate_hps(SR, &spectrum).unwrap();
        assert!((hz as f64 - f0).abs() < 1.0, "expected {f0} Hz, got {hz} Hz");
    }

    #[test]
    fn test_silence_is_no_pitch() {
        let spectrum = AnalysisBuffer::spectrum(vec![0.0; N / 2 + 1], N);
        assert_eq!(
            estimate_peak(SR, &spectrum, PeakRefinement::Quadratic),
            Err(Error::NoPitchDetected)
        );
        assert_eq!(estimate_hps(SR, &spectrum), Err(Error::NoPitchDetected));
    }

    #[test]
    fn test_tiny_spectrum_is_insufficient() {
        let spectrum = AnalysisBuffer::spectrum(vec![1.0, 2.0], 2);
        assert!(matches!(
            estimate_peak(SR, &spectrum, PeakRefinement::None),
            Err(Error::InsufficientSignal { .. })
        ));
    }

    #[test]
    fn test_time_domain_rejected() {
        let buffer = AnalysisBuffer::time(vec![0.0; 64]);
        assert!(matches!(
            estimate_peak(SR, &buffer, PeakRefinement::None),
            Err(Error::TransformFailure(_))
        ));
    }
}
