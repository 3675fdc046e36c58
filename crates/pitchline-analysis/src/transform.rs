//! Transform stage: raw capture buffer → analysis buffer.
//!
//! Every built-in transform first downmixes to mono. Transforms hold only
//! read-only precomputed state (window, FFT plan) so one instance can be
//! shared by every worker in the processing pool.

use pitchline_core::{AnalysisBuffer, Error, RawAudioBuffer, Result, TransformStrategy};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner, Length};
use std::fmt;
use std::sync::Arc;

/// A host-supplied transform stage.
///
/// Implementations must be pure per call and safe to invoke concurrently.
pub trait BufferTransform: Send + Sync {
    fn transform(&self, buffer: &RawAudioBuffer) -> Result<AnalysisBuffer>;
}

/// The transform stage used by the pipeline.
#[derive(Clone)]
pub enum Transform {
    Passthrough,
    Hann(HannWindow),
    Fft(SpectrumTransform),
    Custom(Arc<dyn BufferTransform>),
}

impl Transform {
    /// Build the transform selected by `strategy` for `buffer_size`-frame buffers.
    pub fn from_strategy(strategy: TransformStrategy, buffer_size: usize) -> Self {
        match strategy {
            TransformStrategy::Passthrough => Self::Passthrough,
            TransformStrategy::Hann => Self::Hann(HannWindow::new(buffer_size)),
            TransformStrategy::Fft => Self::Fft(SpectrumTransform::new(buffer_size)),
        }
    }

    pub fn custom(transform: Arc<dyn BufferTransform>) -> Self {
        Self::Custom(transform)
    }

    pub fn transform(&self, buffer: &RawAudioBuffer) -> Result<AnalysisBuffer> {
        match self {
            Self::Passthrough => Ok(AnalysisBuffer::time(checked_mono(buffer)?)),
            Self::Hann(window) => {
                let mut samples = checked_mono(buffer)?;
                window.apply(&mut samples);
                Ok(AnalysisBuffer::time(samples))
            }
            Self::Fft(spectrum) => spectrum.transform(buffer),
            Self::Custom(custom) => custom.transform(buffer),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => f.write_str("Passthrough"),
            Self::Hann(w) => write!(f, "Hann({})", w.len()),
            Self::Fft(s) => write!(f, "Fft({})", s.fft_size()),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Mono downmix, rejecting empty buffers and non-finite samples.
fn checked_mono(buffer: &RawAudioBuffer) -> Result<Vec<f32>> {
    if buffer.is_empty() {
        return Err(Error::TransformFailure("empty buffer".into()));
    }
    if let Some(pos) = buffer.samples().iter().position(|s| !s.is_finite()) {
        return Err(Error::TransformFailure(format!(
            "non-finite sample at index {pos}"
        )));
    }
    Ok(buffer.to_mono())
}

/// Precomputed Hann window.
#[derive(Debug, Clone)]
pub struct HannWindow {
    coefficients: Arc<[f32]>,
}

impl HannWindow {
    pub fn new(size: usize) -> Self {
        let denom = size.saturating_sub(1).max(1) as f32;
        let coefficients = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();
        Self { coefficients }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Multiply in place. Samples past the window length are zeroed.
    pub fn apply(&self, samples: &mut [f32]) {
        for (i, s) in samples.iter_mut().enumerate() {
            *s *= self.coefficients.get(i).copied().unwrap_or(0.0);
        }
    }
}

/// Hann window followed by a forward FFT; outputs the magnitude spectrum.
#[derive(Clone)]
pub struct SpectrumTransform {
    window: HannWindow,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumTransform {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            window: HannWindow::new(fft_size),
            fft: planner.plan_fft_forward(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft.len()
    }

    /// Shorter buffers are zero-padded to the FFT size.
    pub fn transform(&self, buffer: &RawAudioBuffer) -> Result<AnalysisBuffer> {
        let fft_size = self.fft_size();
        let mut mono = checked_mono(buffer)?;
        if mono.len() > fft_size {
            return Err(Error::TransformFailure(format!(
                "buffer of {} frames exceeds FFT size {}",
                mono.len(),
                fft_size
            )));
        }

        self.window.apply(&mut mono);

        let mut spectrum: Vec<Complex<f32>> = mono
            .iter()
            .map(|&re| Complex { re, im: 0.0 })
            .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
            .take(fft_size)
            .collect();
        let mut scratch = vec![Complex { re: 0.0, im: 0.0 }; self.fft.get_inplace_scratch_len()];
        self.fft.process_with_scratch(&mut spectrum, &mut scratch);

        let magnitudes = spectrum[..=fft_size / 2]
            .iter()
            .map(|c| c.norm())
            .collect();

        Ok(AnalysisBuffer::spectrum(magnitudes, fft_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchline_core::{AudioTimestamp, Domain};

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn buffer(samples: Vec<f32>) -> RawAudioBuffer {
        RawAudioBuffer::mono(samples, AudioTimestamp::new(44100.0, 0))
    }

    #[test]
    fn test_passthrough_is_identity_for_mono() {
        let samples = vec![0.25, -0.5, 0.75];
        let out = Transform::Passthrough.transform(&buffer(samples.clone())).unwrap();
        assert_eq!(out.samples, samples);
        assert_eq!(out.domain, Domain::Time);
    }

    #[test]
    fn test_hann_tapers_edges() {
        let transform = Transform::from_strategy(TransformStrategy::Hann, 64);
        let out = transform.transform(&buffer(vec![1.0; 64])).unwrap();
        assert!(out.samples[0].abs() < 1e-6);
        assert!(out.samples[63].abs() < 1e-6);
        assert!(out.samples[32] > 0.99);
    }

    #[test]
    fn test_fft_peak_bin() {
        let size = 1024;
        // Bin 20 exactly
        let freq = 20.0 * 44100.0 / size as f32;
        let transform = Transform::from_strategy(TransformStrategy::Fft, size);
        let out = transform.transform(&buffer(sine(freq, 44100.0, size))).unwrap();

        assert_eq!(out.domain, Domain::Spectrum { fft_size: size });
        assert_eq!(out.len(), size / 2 + 1);

        let peak = out
            .samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 20);
    }

    #[test]
    fn test_fft_zero_pads_short_buffers() {
        let transform = SpectrumTransform::new(256);
        let out = transform.transform(&buffer(vec![0.5; 100])).unwrap();
        assert_eq!(out.len(), 129);
    }

    #[test]
    fn test_fft_rejects_oversized_buffer() {
        let transform = SpectrumTransform::new(128);
        let err = transform.transform(&buffer(vec![0.0; 256])).unwrap_err();
        assert!(matches!(err, Error::TransformFailure(_)));
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        let transform = Transform::Passthrough;
        assert!(matches!(
            transform.transform(&buffer(Vec::new())),
            Err(Error::TransformFailure(_))
        ));
        assert!(matches!(
            transform.transform(&buffer(vec![0.0, f32::NAN])),
            Err(Error::TransformFailure(_))
        ));
    }

    #[test]
    fn test_custom_transform() {
        struct Reverse;
        impl BufferTransform for Reverse {
            fn transform(&self, buffer: &RawAudioBuffer) -> Result<AnalysisBuffer> {
                let mut samples = buffer.to_mono();
                samples.reverse();
                Ok(AnalysisBuffer::time(samples))
            }
        }

        let transform = Transform::custom(Arc::new(Reverse));
        let out = transform.transform(&buffer(vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(out.samples, vec![3.0, 2.0, 1.0]);
    }
}
