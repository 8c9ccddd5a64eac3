//! Handle to the external conversion toolkit.
//!
//! The toolkit is loaded at most once per process (a failed load can be
//! retried) and services one conversion at a time. Exclusive access is a
//! [`Slot`]: whoever holds it may run conversions, everyone else either
//! waits ([`Toolkit::acquire`]) or is turned away with [`Error::Busy`]
//! ([`Toolkit::try_acquire`]).

mod ffmpeg;
mod progress;

pub use ffmpeg::FfmpegConverter;
pub use progress::ProgressReporter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use gifcut_common::events::{EventBus, EventPayload};
use gifcut_common::{ConversionParameters, Error, Result};
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Default delay before a running load is reported as slow.
pub const DEFAULT_SLOW_LOAD_NOTICE: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// The opaque collaborator that actually produces GIFs.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Prepare the converter, reporting progress from 0 to 100.
    async fn load(&self, progress: &ProgressReporter) -> Result<()>;

    /// Convert `input` (a video named `input_name`) into GIF bytes.
    async fn convert(
        &self,
        input: Bytes,
        input_name: &str,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes>;
}

/// Human-readable phase of a toolkit load, derived from its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Locating,
    Inspecting,
    Initializing,
    Ready,
}

impl LoadStage {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0..=29 => Self::Locating,
            30..=89 => Self::Inspecting,
            90..=99 => Self::Initializing,
            _ => Self::Ready,
        }
    }
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locating => write!(f, "locating encoder"),
            Self::Inspecting => write!(f, "locating probe"),
            Self::Initializing => write!(f, "initializing encoder"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

// ---------------------------------------------------------------------------
// Toolkit
// ---------------------------------------------------------------------------

/// Shared, lazily loaded converter with single-slot access.
pub struct Toolkit {
    converter: Arc<dyn Converter>,
    loaded: OnceCell<()>,
    slot: Semaphore,
    slow_load_notice: Duration,
    events: Option<Arc<EventBus>>,
}

impl Toolkit {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            loaded: OnceCell::new(),
            slot: Semaphore::new(1),
            slow_load_notice: DEFAULT_SLOW_LOAD_NOTICE,
            events: None,
        }
    }

    pub fn with_slow_load_notice(mut self, after: Duration) -> Self {
        self.slow_load_notice = after;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Whether a conversion slot is free right now.
    pub fn is_idle(&self) -> bool {
        self.slot.available_permits() > 0
    }

    /// Load the converter. Concurrent and repeated calls share one
    /// successful load; after a failure the next call tries again.
    pub async fn load(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                let result = self.load_once().await;
                match &result {
                    Ok(()) => {
                        tracing::info!("Toolkit loaded");
                        self.broadcast(EventPayload::ToolkitLoaded);
                    }
                    Err(e) => {
                        tracing::error!("Toolkit failed to load: {e}");
                        self.broadcast(EventPayload::ToolkitLoadFailed {
                            error: e.to_string(),
                        });
                    }
                }
                result
            })
            .await
            .map(|_| ())
    }

    async fn load_once(&self) -> Result<()> {
        let events = self.events.clone();
        let reporter = ProgressReporter::new(move |progress| {
            tracing::debug!("Toolkit load {progress}% ({})", LoadStage::from_progress(progress));
            if let Some(events) = &events {
                events.broadcast(EventPayload::ToolkitLoadProgress { progress });
            }
        });

        let load = self.converter.load(&reporter);
        tokio::pin!(load);

        let result = match tokio::time::timeout(self.slow_load_notice, &mut load).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Toolkit load still running after {:?}; continuing to wait",
                    self.slow_load_notice
                );
                self.broadcast(EventPayload::ToolkitLoadSlow);
                load.await
            }
        };

        result.map_err(|e| match e {
            Error::Load(_) => e,
            other => Error::Load(other.to_string()),
        })
    }

    /// Wait for the conversion slot.
    pub async fn acquire(&self) -> Result<Slot<'_>> {
        let permit = self
            .slot
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("toolkit slot closed: {e}")))?;
        Ok(Slot {
            toolkit: self,
            _permit: permit,
        })
    }

    /// Take the conversion slot if it is free.
    pub fn try_acquire(&self) -> Result<Slot<'_>> {
        let permit = self.slot.try_acquire().map_err(|_| Error::Busy)?;
        Ok(Slot {
            toolkit: self,
            _permit: permit,
        })
    }

    /// Wait for the slot, then convert.
    pub async fn convert(
        &self,
        input: Bytes,
        input_name: &str,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        self.acquire()
            .await?
            .convert(input, input_name, params, progress)
            .await
    }

    /// Convert only if no other conversion is running.
    pub async fn try_convert(
        &self,
        input: Bytes,
        input_name: &str,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        self.try_acquire()?
            .convert(input, input_name, params, progress)
            .await
    }

    /// Start a conversion in the background and return its progress stream
    /// and result. The stream ends when the conversion finishes.
    pub fn start_conversion(
        self: &Arc<Self>,
        input: Bytes,
        input_name: impl Into<String>,
        params: ConversionParameters,
    ) -> ConversionRun {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let toolkit = Arc::clone(self);
        let input_name = input_name.into();

        let handle = tokio::spawn(async move {
            let reporter = ProgressReporter::new(move |p| {
                let _ = tx.send(p);
            });
            toolkit
                .convert(input, &input_name, &params, &reporter)
                .await
        });

        ConversionRun {
            progress: UnboundedReceiverStream::new(rx),
            result: handle
                .map(|joined| {
                    joined.unwrap_or_else(|e| {
                        Err(Error::Internal(format!("conversion task failed: {e}")))
                    })
                })
                .boxed(),
        }
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field("loaded", &self.is_loaded())
            .field("idle", &self.is_idle())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Exclusive right to run conversions. Released on drop.
pub struct Slot<'a> {
    toolkit: &'a Toolkit,
    _permit: SemaphorePermit<'a>,
}

impl Slot<'_> {
    /// Load the toolkit if needed, then convert. Load failures surface as
    /// [`Error::Load`]; everything after that as [`Error::Conversion`].
    pub async fn convert(
        &self,
        input: Bytes,
        input_name: &str,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        self.toolkit.load().await?;
        tracing::debug!("Converting {input_name} ({} bytes)", input.len());
        self.toolkit
            .converter
            .convert(input, input_name, params, progress)
            .await
            .map_err(|e| match e {
                Error::Conversion(_) => e,
                other => Error::Conversion(other.to_string()),
            })
    }
}

impl std::fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ConversionRun
// ---------------------------------------------------------------------------

/// A conversion running in the background.
pub struct ConversionRun {
    /// Rising progress values; ends when the conversion finishes.
    pub progress: UnboundedReceiverStream<u8>,
    /// The GIF bytes or the error.
    pub result: BoxFuture<'static, Result<Bytes>>,
}

impl std::fmt::Debug for ConversionRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRun").finish_non_exhaustive()
    }
}
