//! Hardware input capture via CPAL.

use crate::permission::{PermissionProvider, PermissionStatus};
use crate::source::{AcquisitionThread, BufferObserver, SignalSource, SourceKind};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use pitchline_core::{AudioTimestamp, Error, RawAudioBuffer, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thread_priority::ThreadPriority;

/// How long the capture loop waits for samples before re-checking `stop()`.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Records from an input device and slices the stream into fixed-size buffers.
///
/// The device callback pushes samples into a bounded channel holding one
/// second of audio; when the capture thread falls behind, samples are
/// dropped and counted rather than blocking the device.
pub struct InputSource {
    device_name: Option<String>,
    buffer_size: usize,
    permission: Arc<dyn PermissionProvider>,
    dropped_samples: Arc<AtomicU32>,
    thread: AcquisitionThread,
}

impl InputSource {
    /// `device_name` of `None` uses the host's default input device.
    pub fn new(
        device_name: Option<String>,
        buffer_size: usize,
        permission: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            device_name,
            buffer_size: buffer_size.max(1),
            permission,
            dropped_samples: Arc::new(AtomicU32::new(0)),
            thread: AcquisitionThread::default(),
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Samples lost to channel overflow since the source was created.
    pub fn dropped_samples(&self) -> u32 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    /// Names of the host's input devices.
    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .input_devices()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .map(|d| d.name().map_err(|e| Error::DeviceUnavailable(e.to_string())))
            .collect()
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("device_name", &self.device_name)
            .field("buffer_size", &self.buffer_size)
            .field("running", &self.thread.is_running())
            .finish()
    }
}

impl SignalSource for InputSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Input
    }

    fn start(&mut self, observer: Arc<dyn BufferObserver>) -> Result<()> {
        if self.thread.is_running() {
            return Ok(());
        }
        if self.permission.status() == PermissionStatus::Denied {
            return Err(Error::PermissionDenied);
        }

        self.thread.begin();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let capture = Capture {
            device_name: self.device_name.clone(),
            buffer_size: self.buffer_size,
            running: self.thread.running_flag(),
            dropped_samples: Arc::clone(&self.dropped_samples),
            observer,
        };

        let handle = thread::Builder::new()
            .name("pitchline-capture".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                capture.run(ready_tx);
            })
            .map_err(|e| {
                self.thread.stop();
                Error::ThreadSpawn(format!("pitchline-capture: {e}"))
            })?;
        self.thread.attach(handle);

        // Stream setup happens on the capture thread; wait for its verdict.
        let setup = ready_rx.recv().unwrap_or_else(|_| {
            Err(Error::DeviceUnavailable(
                "capture thread exited during setup".into(),
            ))
        });
        if setup.is_err() {
            self.thread.stop();
        }
        setup
    }

    fn stop(&mut self) {
        if self.thread.is_running() {
            tracing::info!(
                dropped_samples = self.dropped_samples(),
                "stopping input capture"
            );
        }
        self.thread.stop();
    }

    fn is_running(&self) -> bool {
        self.thread.is_running()
    }
}

struct Capture {
    device_name: Option<String>,
    buffer_size: usize,
    running: Arc<AtomicBool>,
    dropped_samples: Arc<AtomicU32>,
    observer: Arc<dyn BufferObserver>,
}

/// An open stream plus the receiving ends of its sample and error channels.
struct OpenStream {
    stream: cpal::Stream,
    samples: Receiver<f32>,
    errors: Receiver<String>,
    channels: u16,
    sample_rate: f64,
}

impl Capture {
    fn run(self, ready: Sender<Result<()>>) {
        let open = match self.open() {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!("input setup failed: {e}");
                let _ = ready.send(Err(e));
                return;
            }
        };
        tracing::info!(
            device = self.device_name.as_deref().unwrap_or("default"),
            sample_rate = open.sample_rate,
            channels = open.channels,
            "input capture started"
        );
        let _ = ready.send(Ok(()));

        self.capture_loop(&open);
        drop(open.stream);
    }

    fn open(&self) -> Result<OpenStream> {
        let device = find_device(self.device_name.as_deref())?;
        let supported = device
            .default_input_config()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        let config: cpal::StreamConfig = supported.config();
        let channels = config.channels;
        let sample_rate = config.sample_rate.0 as f64;

        let capacity = (config.sample_rate.0 as usize * channels as usize).max(1);
        let (sample_tx, samples) = bounded(capacity);
        let (error_tx, errors) = bounded(1);
        let dropped = Arc::clone(&self.dropped_samples);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, sample_tx, error_tx, dropped)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, sample_tx, error_tx, dropped)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, sample_tx, error_tx, dropped)?
            }
            format => {
                return Err(Error::DeviceUnavailable(format!(
                    "Unsupported sample format: {format:?}"
                )));
            }
        };
        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        Ok(OpenStream {
            stream,
            samples,
            errors,
            channels,
            sample_rate,
        })
    }

    fn capture_loop(&self, open: &OpenStream) {
        let chunk_len = self.buffer_size * open.channels as usize;
        let mut pending = Vec::with_capacity(chunk_len);
        let mut frame_position = 0u64;
        let mut reported_drops = 0u32;

        while self.running.load(Ordering::Acquire) {
            if let Ok(message) = open.errors.try_recv() {
                if self.running.swap(false, Ordering::AcqRel) {
                    tracing::warn!("input stream error: {message}");
                    self.observer
                        .on_source_error(Error::DeviceUnavailable(message));
                }
                return;
            }

            match open.samples.recv_timeout(POLL_INTERVAL) {
                Ok(sample) => {
                    pending.push(sample);
                    while pending.len() < chunk_len {
                        match open.samples.try_recv() {
                            Ok(sample) => pending.push(sample),
                            Err(_) => break,
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }

            if pending.len() == chunk_len {
                let samples = std::mem::replace(&mut pending, Vec::with_capacity(chunk_len));
                let timestamp = AudioTimestamp::new(open.sample_rate, frame_position);
                frame_position += self.buffer_size as u64;
                self.observer
                    .on_buffer(RawAudioBuffer::new(samples, open.channels, timestamp));
            }

            let dropped = self.dropped_samples.load(Ordering::Relaxed);
            if dropped != reported_drops {
                tracing::warn!(
                    dropped = dropped.wrapping_sub(reported_drops),
                    "input overflow, samples dropped"
                );
                reported_drops = dropped;
            }
        }
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::DeviceUnavailable(format!("No input device named {name:?}"))),
        None => host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("No input device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Sender<f32>,
    errors: Sender<String>,
    dropped: Arc<AtomicU32>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    for &sample in data {
                        let value = <f32 as cpal::FromSample<T>>::from_sample_(sample);
                        if samples.try_send(value).is_err() {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }));
            },
            move |err| {
                let _ = errors.try_send(err.to_string());
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))
}
