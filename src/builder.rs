//! Builder for configuring and constructing a `PitchEngine`.

use crate::engine::EngineParts;
use crate::executor::{default_worker_count, processing_pool, DeliveryExecutor};
use crate::{
    AlwaysGranted, BufferTransform, EngineConfig, EstimationStrategy, Estimator,
    FileSource, FrequencyEstimator, PermissionProvider, PitchEngine, PitchListener, Result,
    SignalSource, Transform, TransformStrategy,
};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

/// Without an explicit [`source`](Self::source), the engine plays
/// [`audio_file`](Self::audio_file) when one is set and records from the
/// input device otherwise.
///
/// # Example
///
/// ```ignore
/// use pitchline::prelude::*;
///
/// let engine = PitchEngine::builder()
///     .buffer_size(2048)
///     .transform(TransformStrategy::Passthrough)
///     .estimation(EstimationStrategy::Yin)
///     .listener(&my_listener)
///     .build()?;
///
/// assert_eq!(engine.mode(), Mode::Record);
/// ```
#[derive(Default)]
pub struct PitchEngineBuilder {
    config: EngineConfig,
    listener: Option<Weak<dyn PitchListener>>,
    permission: Option<Arc<dyn PermissionProvider>>,
    source: Option<Box<dyn SignalSource>>,
    custom_transform: Option<Arc<dyn BufferTransform>>,
    custom_estimator: Option<Arc<dyn FrequencyEstimator>>,
}

impl PitchEngineBuilder {
    /// Replace every option at once, e.g. with a config loaded from disk.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Frames per analysis window. Default: 4096
    pub fn buffer_size(mut self, frames: usize) -> Self {
        self.config.buffer_size = frames;
        self
    }

    /// Default: [`TransformStrategy::Fft`]
    pub fn transform(mut self, strategy: TransformStrategy) -> Self {
        self.config.transform = strategy;
        self
    }

    /// Default: [`EstimationStrategy::Hps`]
    pub fn estimation(mut self, strategy: EstimationStrategy) -> Self {
        self.config.estimation = strategy;
        self
    }

    /// Analyse a WAV file instead of recording.
    pub fn audio_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.audio_file = Some(path.into());
        self
    }

    pub fn input_device(mut self, name: impl Into<String>) -> Self {
        self.config.input_device = Some(name.into());
        self
    }

    /// Default: available parallelism
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = Some(threads);
        self
    }

    /// Deliver outcomes in capture order. Default: false
    pub fn ordered_delivery(mut self, ordered: bool) -> Self {
        self.config.ordered_delivery = ordered;
        self
    }

    /// Pace file playback at the file's sample rate. Default: true
    pub fn realtime_playback(mut self, realtime: bool) -> Self {
        self.config.realtime_playback = realtime;
        self
    }

    /// Held weakly; the caller keeps the listener alive.
    pub fn listener<L: PitchListener + 'static>(mut self, listener: &Arc<L>) -> Self {
        self.listener = Some(Arc::downgrade(listener) as Weak<dyn PitchListener>);
        self
    }

    /// Default: [`AlwaysGranted`]
    pub fn permission(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permission = Some(provider);
        self
    }

    /// Use a custom source instead of the file or input device.
    pub fn source(mut self, source: Box<dyn SignalSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replaces the configured transform strategy.
    pub fn custom_transform(mut self, transform: Arc<dyn BufferTransform>) -> Self {
        self.custom_transform = Some(transform);
        self
    }

    /// Replaces the configured estimation strategy.
    pub fn custom_estimator(mut self, estimator: Arc<dyn FrequencyEstimator>) -> Self {
        self.custom_estimator = Some(estimator);
        self
    }

    pub fn build(self) -> Result<PitchEngine> {
        let config = self.config;
        // Custom stages declare no domain, so only the pairing of two
        // built-in strategies can be checked.
        if self.custom_transform.is_some() || self.custom_estimator.is_some() {
            config.validate_sizes()?;
        } else {
            config.validate()?;
        }

        let permission = self
            .permission
            .unwrap_or_else(|| Arc::new(AlwaysGranted) as Arc<dyn PermissionProvider>);

        let source = match self.source {
            Some(source) => source,
            None => default_source(&config, &permission)?,
        };

        let transform = match self.custom_transform {
            Some(custom) => Transform::custom(custom),
            None => Transform::from_strategy(config.transform, config.buffer_size),
        };
        let estimator = match self.custom_estimator {
            Some(custom) => Estimator::custom(custom),
            None => Estimator::from_strategy(config.estimation),
        };

        let workers = config.worker_threads.unwrap_or_else(default_worker_count);
        let pool = processing_pool(workers)?;
        let delivery = DeliveryExecutor::start()?;

        tracing::info!(
            mode = ?source.kind().mode(),
            buffer_size = config.buffer_size,
            transform = ?transform,
            estimator = ?estimator,
            workers,
            ordered = config.ordered_delivery,
            "pitch engine built"
        );

        Ok(PitchEngine::from_parts(EngineParts {
            config,
            transform,
            estimator,
            source,
            permission,
            listener: self.listener,
            pool,
            delivery,
        }))
    }
}

fn default_source(
    config: &EngineConfig,
    permission: &Arc<dyn PermissionProvider>,
) -> Result<Box<dyn SignalSource>> {
    if let Some(path) = &config.audio_file {
        return Ok(Box::new(
            FileSource::new(path.clone(), config.buffer_size)
                .realtime(config.realtime_playback),
        ));
    }

    #[cfg(feature = "input")]
    {
        Ok(Box::new(crate::InputSource::new(
            config.input_device.clone(),
            config.buffer_size,
            Arc::clone(permission),
        )))
    }

    #[cfg(not(feature = "input"))]
    {
        let _ = permission;
        Err(crate::Error::InvalidConfig(
            "no audio_file configured and input capture is disabled".into(),
        ))
    }
}
