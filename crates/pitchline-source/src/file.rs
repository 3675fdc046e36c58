//! WAV file playback source.

use crate::source::{AcquisitionThread, BufferObserver, SignalSource, SourceKind};
use hound::{SampleFormat, WavReader};
use pitchline_core::{AudioTimestamp, Error, RawAudioBuffer, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep while pacing, so `stop()` is honoured promptly.
const PACING_STEP: Duration = Duration::from_millis(10);

type SampleIter = Box<dyn Iterator<Item = hound::Result<f32>> + Send>;

/// Decodes a WAV file into fixed-size buffers on a `pitchline-playback` thread.
///
/// Buffers carry the file's native sample rate. The last buffer is shorter
/// when the file length is not a multiple of the buffer size.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    buffer_size: usize,
    realtime: bool,
    thread: AcquisitionThread,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, buffer_size: usize) -> Self {
        Self {
            path: path.into(),
            buffer_size: buffer_size.max(1),
            realtime: true,
            thread: AcquisitionThread::default(),
        }
    }

    /// Deliver buffers no faster than the file would play (default: true).
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn start(&mut self, observer: Arc<dyn BufferObserver>) -> Result<()> {
        if self.thread.is_running() {
            return Ok(());
        }

        let reader =
            WavReader::open(&self.path).map_err(|e| Error::file_unreadable(&self.path, e))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(Error::file_unreadable(&self.path, "invalid WAV header"));
        }
        tracing::info!(
            path = %self.path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            frames = reader.duration(),
            "starting file playback"
        );

        self.thread.begin();
        let playback = Playback {
            path: self.path.clone(),
            samples: decode(reader),
            channels: spec.channels,
            sample_rate: spec.sample_rate as f64,
            buffer_size: self.buffer_size,
            realtime: self.realtime,
            running: self.thread.running_flag(),
            observer,
        };

        let handle = thread::Builder::new()
            .name("pitchline-playback".into())
            .spawn(move || playback.run())
            .map_err(|e| {
                self.thread.stop();
                Error::ThreadSpawn(format!("pitchline-playback: {e}"))
            })?;
        self.thread.attach(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.thread.stop();
    }

    fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}

/// Normalised sample stream. Integer formats are scaled by `1 / 2^(bits-1)`.
fn decode(reader: WavReader<BufReader<File>>) -> SampleIter {
    let spec = reader.spec();
    match spec.sample_format {
        SampleFormat::Float => Box::new(reader.into_samples::<f32>()),
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << spec.bits_per_sample.saturating_sub(1)) as f32;
            Box::new(
                reader
                    .into_samples::<i32>()
                    .map(move |s| s.map(|v| v as f32 * scale)),
            )
        }
    }
}

struct Playback {
    path: PathBuf,
    samples: SampleIter,
    channels: u16,
    sample_rate: f64,
    buffer_size: usize,
    realtime: bool,
    running: Arc<AtomicBool>,
    observer: Arc<dyn BufferObserver>,
}

impl Playback {
    fn run(mut self) {
        let channels = self.channels as usize;
        let chunk_len = self.buffer_size * channels;
        let started = Instant::now();
        let mut frame_position = 0u64;

        loop {
            if !self.running.load(Ordering::Acquire) {
                tracing::debug!("file playback stopped");
                return;
            }

            let mut chunk = Vec::with_capacity(chunk_len);
            for sample in self.samples.by_ref().take(chunk_len) {
                match sample {
                    Ok(s) => chunk.push(s),
                    Err(e) => {
                        if self.running.swap(false, Ordering::AcqRel) {
                            tracing::warn!("decode failed at frame {frame_position}: {e}");
                            self.observer
                                .on_source_error(Error::file_unreadable(&self.path, e));
                        }
                        return;
                    }
                }
            }
            // A trailing partial frame cannot be analysed.
            chunk.truncate(chunk.len() - chunk.len() % channels);
            if chunk.is_empty() {
                break;
            }

            let frames = chunk.len() / channels;
            if self.realtime {
                let end = (frame_position + frames as u64) as f64 / self.sample_rate;
                if !self.pace_until(started + Duration::from_secs_f64(end)) {
                    return;
                }
            }

            let timestamp = AudioTimestamp::new(self.sample_rate, frame_position);
            self.observer
                .on_buffer(RawAudioBuffer::new(chunk, self.channels, timestamp));
            frame_position += frames as u64;

            if frames < self.buffer_size {
                break;
            }
        }

        if self.running.swap(false, Ordering::AcqRel) {
            tracing::info!(frames = frame_position, "file playback finished");
            self.observer.on_end_of_stream();
        }
    }

    /// Sleep until `deadline`. Returns false if stopped meanwhile.
    fn pace_until(&self, deadline: Instant) -> bool {
        loop {
            if !self.running.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(PACING_STEP));
        }
    }
}
