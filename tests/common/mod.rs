//! Shared fixtures for integration tests.
//!
//! [`TestHarness`] owns a temp directory of fake videos, an [`Intake`] with
//! their durations already resolved, and a [`Toolkit`] backed by
//! [`FakeConverter`] so no external tools are needed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gifcut::intake::{Candidate, Intake};
use gifcut::toolkit::{Converter, ProgressReporter, Toolkit};
use gifcut_common::config::IntakeConfig;
use gifcut_common::events::EventBus;
use gifcut_common::{ConversionParameters, Error, Result};

/// Converter that "encodes" by prefixing a GIF header. Inputs starting with
/// `fail` are rejected the way ffmpeg rejects garbage.
pub struct FakeConverter {
    pub delay: Duration,
}

#[async_trait]
impl Converter for FakeConverter {
    async fn load(&self, progress: &ProgressReporter) -> Result<()> {
        for pct in [2.0, 28.0, 90.0, 100.0] {
            progress.report(pct);
        }
        Ok(())
    }

    async fn convert(
        &self,
        input: Bytes,
        _input_name: &str,
        _params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        if input.starts_with(b"fail") {
            return Err(Error::tool("ffmpeg", "Invalid data found when processing input"));
        }
        for pct in [25.0, 50.0, 75.0] {
            progress.report(pct);
            tokio::time::sleep(self.delay).await;
        }
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&input);
        Ok(Bytes::from(gif))
    }
}

pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub intake: Intake,
    pub toolkit: Arc<Toolkit>,
    pub events: Arc<EventBus>,
}

impl TestHarness {
    /// One video per `(name, contents)` pair, each 10 seconds long.
    pub fn with_videos(videos: &[(&str, &[u8])]) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let events = Arc::new(EventBus::default());
        let mut intake = Intake::new(IntakeConfig::default()).with_events(Arc::clone(&events));

        for (name, body) in videos {
            let path = dir.path().join(name);
            std::fs::write(&path, body).expect("failed to write fixture");
            let id = intake
                .add(Candidate::from_path(&path).expect("fixture metadata"))
                .expect("fixture rejected");
            intake
                .resolve_duration(id, Ok(10.0))
                .expect("fixture not registered");
        }

        let toolkit = Toolkit::new(Arc::new(FakeConverter {
            delay: Duration::ZERO,
        }))
        .with_events(Arc::clone(&events));

        Self {
            dir,
            intake,
            toolkit: Arc::new(toolkit),
            events,
        }
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}
