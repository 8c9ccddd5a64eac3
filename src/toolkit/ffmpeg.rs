//! [`Converter`] backed by the ffmpeg CLI.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gifcut_av::{ToolRegistry, Workspace};
use gifcut_common::config::{ToolkitConfig, ToolsConfig};
use gifcut_common::{ConversionParameters, Error, Result};
use parking_lot::RwLock;

use super::{Converter, ProgressReporter};

/// Converts through `ffmpeg` processes. Loading locates the binaries and
/// checks that ffmpeg runs.
#[derive(Debug)]
pub struct FfmpegConverter {
    tools_config: ToolsConfig,
    encode_timeout: Duration,
    registry: RwLock<Option<ToolRegistry>>,
}

impl FfmpegConverter {
    pub fn new(tools_config: ToolsConfig, toolkit_config: &ToolkitConfig) -> Self {
        Self {
            tools_config,
            encode_timeout: Duration::from_secs(toolkit_config.encode_timeout_secs),
            registry: RwLock::new(None),
        }
    }

    /// Tools discovered by the last successful load.
    pub fn tools(&self) -> Option<ToolRegistry> {
        self.registry.read().clone()
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    async fn load(&self, progress: &ProgressReporter) -> Result<()> {
        progress.report(2.0);

        let ffmpeg = ToolRegistry::locate("ffmpeg", &self.tools_config)
            .ok_or_else(|| Error::Load("ffmpeg not found; is it installed and in PATH?".into()))?;
        let mut registry = ToolRegistry::default();
        registry.insert("ffmpeg", ffmpeg.clone());
        progress.report(28.0);

        match ToolRegistry::locate("ffprobe", &self.tools_config) {
            Some(path) => registry.insert("ffprobe", path),
            None => tracing::warn!("ffprobe not found; durations cannot be read"),
        }
        progress.report(90.0);

        let version = tokio::task::spawn_blocking(move || gifcut_av::tools::detect_version(&ffmpeg))
            .await
            .map_err(|e| Error::Load(format!("version check panicked: {e}")))?
            .ok_or_else(|| Error::Load("ffmpeg did not report a version".into()))?;
        tracing::info!("Using {version}");

        *self.registry.write() = Some(registry);
        progress.report(100.0);
        Ok(())
    }

    async fn convert(
        &self,
        input: Bytes,
        input_name: &str,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        let tools = self
            .tools()
            .ok_or_else(|| Error::conversion("toolkit is not loaded"))?;

        let run = async {
            let ws = Workspace::new(input_name)?;
            let input_path = ws.write_input(&input)?;
            progress.report(0.0);

            gifcut_av::encode_gif(
                &tools,
                &input_path,
                &ws.output(),
                params,
                self.encode_timeout,
                |p| {
                    progress.report(p.pct * 100.0);
                },
            )
            .await?;

            let gif = ws.read_output()?;
            progress.report(100.0);
            Ok::<_, Error>(Bytes::from(gif))
        };

        run.await.map_err(|e| match e {
            Error::Conversion(_) => e,
            other => Error::Conversion(other.to_string()),
        })
    }
}
