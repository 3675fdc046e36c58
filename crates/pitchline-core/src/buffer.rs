//! Audio buffers flowing through the pipeline.
//!
//! A [`RawAudioBuffer`] is produced by a signal source and shared read-only
//! with the processing pool. An [`AnalysisBuffer`] is the transform stage's
//! output and lives for exactly one pipeline pass.

use std::sync::Arc;
use std::time::Instant;

/// Capture time of a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTimestamp {
    /// Sample rate of the medium the buffer came from, in Hz.
    pub sample_rate: f64,
    /// Index of the buffer's first frame since the source started.
    pub frame_position: u64,
    /// Wall-clock instant the buffer was handed off.
    pub captured_at: Instant,
}

impl AudioTimestamp {
    pub fn new(sample_rate: f64, frame_position: u64) -> Self {
        Self {
            sample_rate,
            frame_position,
            captured_at: Instant::now(),
        }
    }

    /// Position of the first frame in seconds.
    pub fn seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.frame_position as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Immutable block of interleaved samples plus format metadata.
///
/// Cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct RawAudioBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    timestamp: AudioTimestamp,
}

impl RawAudioBuffer {
    /// `samples` are interleaved; a zero channel count is treated as mono.
    pub fn new(samples: impl Into<Arc<[f32]>>, channels: u16, timestamp: AudioTimestamp) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            timestamp,
        }
    }

    pub fn mono(samples: impl Into<Arc<[f32]>>, timestamp: AudioTimestamp) -> Self {
        Self::new(samples, 1, timestamp)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn timestamp(&self) -> &AudioTimestamp {
        &self.timestamp
    }

    pub fn sample_rate(&self) -> f64 {
        self.timestamp.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Downmix to one channel by averaging each frame.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        if channels == 1 {
            return self.samples.to_vec();
        }

        let scale = 1.0 / channels as f32;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }
}

/// Representation an analysis buffer is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Time-domain mono samples.
    Time,
    /// Magnitude spectrum, bins `0..=fft_size / 2`.
    Spectrum { fft_size: usize },
}

/// Output of the transform stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBuffer {
    pub samples: Vec<f32>,
    pub domain: Domain,
}

impl AnalysisBuffer {
    pub fn time(samples: Vec<f32>) -> Self {
        Self {
            samples,
            domain: Domain::Time,
        }
    }

    pub fn spectrum(magnitudes: Vec<f32>, fft_size: usize) -> Self {
        Self {
            samples: magnitudes,
            domain: Domain::Spectrum { fft_size },
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Centre frequency of a (possibly fractional) spectrum bin.
    ///
    /// Returns `None` for time-domain buffers.
    pub fn bin_frequency(&self, bin: f64, sample_rate: f64) -> Option<f64> {
        match self.domain {
            Domain::Spectrum { fft_size } if fft_size > 0 => {
                Some(bin * sample_rate / fft_size as f64)
            }
            _ => None,
        }
    }
}
