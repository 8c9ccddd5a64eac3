//! Sequential batch conversion.
//!
//! [`BatchOrchestrator::run_batch`] turns every media item into a
//! [`ConversionTask`] and converts them one after another, in order, through
//! the shared [`Toolkit`]. A failed task records its error and the batch
//! moves on. Tasks stay in the list until [`BatchOrchestrator::clear`].
//!
//! The orchestrator also fronts single-item conversions so the two paths
//! exclude each other: a single conversion is refused while a batch runs,
//! and a batch cannot start while a single conversion holds the toolkit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use gifcut_common::events::{EventBus, EventPayload};
use gifcut_common::{ConversionParameters, Error, MediaId, Result, TaskId, TaskStatus};
use parking_lot::RwLock;
use serde::Serialize;

use crate::intake::MediaItem;
use crate::toolkit::{ProgressReporter, Slot, Toolkit};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One media item's trip through the converter.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionTask {
    pub id: TaskId,
    pub media_id: MediaId,
    pub name: String,
    pub status: TaskStatus,
    /// 0 to 100.
    pub progress: u8,
    #[serde(skip)]
    pub result: Option<Bytes>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    source: PathBuf,
    #[serde(skip)]
    ready: bool,
}

impl ConversionTask {
    fn pending(item: &MediaItem) -> Self {
        Self {
            id: TaskId::new(),
            media_id: item.id,
            name: item.name.clone(),
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
            source: item.path.clone(),
            ready: item.is_ready(),
        }
    }

    /// Size of the produced GIF, if any.
    pub fn output_size(&self) -> Option<usize> {
        self.result.as_ref().map(Bytes::len)
    }
}

/// Whether a batch is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Idle,
    Running,
}

/// Task counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} completed", self.completed, self.total)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Resets the running flag however the batch ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// BatchOrchestrator
// ---------------------------------------------------------------------------

/// Owns the task list and serialises conversions through the toolkit.
pub struct BatchOrchestrator {
    toolkit: Arc<Toolkit>,
    tasks: Arc<RwLock<Vec<ConversionTask>>>,
    running: AtomicBool,
    events: Option<Arc<EventBus>>,
}

impl BatchOrchestrator {
    pub fn new(toolkit: Arc<Toolkit>) -> Self {
        Self {
            toolkit,
            tasks: Arc::new(RwLock::new(Vec::new())),
            running: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> BatchState {
        if self.running.load(Ordering::SeqCst) {
            BatchState::Running
        } else {
            BatchState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == BatchState::Running
    }

    /// Convert every item in order with the same parameters. The previous
    /// task list is replaced.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if a batch is already running or a single conversion
    /// holds the toolkit. Individual task failures are not errors; they are
    /// recorded on the task.
    pub async fn run_batch(
        &self,
        items: &[MediaItem],
        params: &ConversionParameters,
    ) -> Result<BatchSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::Busy);
        }
        let _running = RunningGuard(&self.running);
        let slot = self.toolkit.try_acquire()?;

        let queued: Vec<TaskId> = {
            let mut tasks = self.tasks.write();
            *tasks = items.iter().map(ConversionTask::pending).collect();
            tasks.iter().map(|t| t.id).collect()
        };

        tracing::info!("Batch started: {} item(s)", queued.len());
        self.broadcast(EventPayload::BatchStarted {
            total: queued.len(),
        });
        for task in self.tasks.read().iter() {
            self.broadcast(EventPayload::TaskQueued {
                task_id: task.id,
                media_id: task.media_id,
            });
        }

        for task_id in queued {
            self.run_task(&slot, task_id, params).await;
        }

        let summary = self.summary();
        tracing::info!("Batch finished: {summary}");
        self.broadcast(EventPayload::BatchFinished {
            completed: summary.completed,
            failed: summary.failed,
        });
        Ok(summary)
    }

    async fn run_task(&self, slot: &Slot<'_>, task_id: TaskId, params: &ConversionParameters) {
        // Removed while waiting its turn.
        let Some((name, source, ready)) = self.update(task_id, |t| {
            t.status = TaskStatus::Processing;
            t.progress = 0;
            (t.name.clone(), t.source.clone(), t.ready)
        }) else {
            return;
        };
        self.broadcast(EventPayload::TaskStarted { task_id });

        let outcome = if ready {
            self.convert_task(slot, task_id, &name, &source, params).await
        } else {
            Err(Error::conversion("duration unknown; item is not ready"))
        };

        match outcome {
            Ok(gif) => {
                let output_size = gif.len();
                tracing::info!("{name}: converted ({output_size} bytes)");
                self.update(task_id, |t| {
                    t.status = TaskStatus::Completed;
                    t.progress = 100;
                    t.result = Some(gif);
                    t.finished_at = Some(Utc::now());
                });
                self.broadcast(EventPayload::TaskCompleted {
                    task_id,
                    output_size,
                });
            }
            Err(e) => {
                tracing::warn!("{name}: {e}");
                let error = e.to_string();
                self.update(task_id, |t| {
                    t.status = TaskStatus::Error;
                    t.error = Some(error.clone());
                    t.finished_at = Some(Utc::now());
                });
                self.broadcast(EventPayload::TaskFailed { task_id, error });
            }
        }
    }

    async fn convert_task(
        &self,
        slot: &Slot<'_>,
        task_id: TaskId,
        name: &str,
        source: &std::path::Path,
        params: &ConversionParameters,
    ) -> Result<Bytes> {
        let input = tokio::fs::read(source)
            .await
            .map_err(|e| Error::conversion(format!("failed to read {}: {e}", source.display())))?;

        let tasks = Arc::clone(&self.tasks);
        let events = self.events.clone();
        let reporter = ProgressReporter::new(move |progress| {
            if let Some(t) = tasks.write().iter_mut().find(|t| t.id == task_id) {
                t.progress = progress;
            }
            if let Some(events) = &events {
                events.broadcast(EventPayload::TaskProgress { task_id, progress });
            }
        });

        slot.convert(Bytes::from(input), name, params, &reporter).await
    }

    /// Convert one item outside a batch.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] while a batch runs or another single conversion holds
    /// the toolkit.
    pub async fn convert_single(
        &self,
        item: &MediaItem,
        params: &ConversionParameters,
        progress: &ProgressReporter,
    ) -> Result<Bytes> {
        if self.is_running() {
            return Err(Error::Busy);
        }
        let slot = self.toolkit.try_acquire()?;
        if !item.is_ready() {
            return Err(Error::conversion(format!(
                "{}: duration unknown; item is not ready",
                item.name
            )));
        }
        let input = item.read_bytes().await?;
        slot.convert(input, &item.name, params, progress).await
    }

    /// Snapshot of every task in order.
    pub fn tasks(&self) -> Vec<ConversionTask> {
        self.tasks.read().clone()
    }

    pub fn task(&self, id: TaskId) -> Option<ConversionTask> {
        self.tasks.read().iter().find(|t| t.id == id).cloned()
    }

    /// Completed tasks that hold a result.
    pub fn completed(&self) -> Vec<ConversionTask> {
        self.tasks
            .read()
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && t.result.is_some())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let tasks = self.tasks.read();
        let mut summary = BatchSummary {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks.iter() {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::Processing => summary.processing += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Error => summary.failed += 1,
            }
        }
        summary
    }

    /// Drop one task. The task being converted cannot be removed.
    pub fn remove_task(&self, id: TaskId) -> Result<ConversionTask> {
        let mut tasks = self.tasks.write();
        let index = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::not_found("task", id))?;
        if tasks[index].status == TaskStatus::Processing {
            return Err(Error::Busy);
        }
        Ok(tasks.remove(index))
    }

    /// Drop every task. Refused while a batch runs.
    pub fn clear(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::Busy);
        }
        self.tasks.write().clear();
        Ok(())
    }

    fn update<T>(&self, id: TaskId, f: impl FnOnce(&mut ConversionTask) -> T) -> Option<T> {
        self.tasks.write().iter_mut().find(|t| t.id == id).map(f)
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("state", &self.state())
            .field("summary", &self.summary())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{Candidate, Intake};
    use crate::toolkit::Converter;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use gifcut_common::config::IntakeConfig;
    use std::time::Duration;

    /// Fails any input whose bytes start with `fail`.
    struct ScriptedConverter {
        delay: Duration,
    }

    #[async_trait]
    impl Converter for ScriptedConverter {
        async fn load(&self, progress: &ProgressReporter) -> Result<()> {
            progress.report(100.0);
            Ok(())
        }

        async fn convert(
            &self,
            input: Bytes,
            _input_name: &str,
            _params: &ConversionParameters,
            progress: &ProgressReporter,
        ) -> Result<Bytes> {
            progress.report(50.0);
            tokio::time::sleep(self.delay).await;
            if input.starts_with(b"fail") {
                return Err(Error::tool("ffmpeg", "invalid data found"));
            }
            let mut gif = b"GIF89a".to_vec();
            gif.extend_from_slice(&input);
            Ok(Bytes::from(gif))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        intake: Intake,
        orchestrator: Arc<BatchOrchestrator>,
    }

    fn fixture(contents: &[&[u8]], delay: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut intake = Intake::new(IntakeConfig::default());
        for (i, body) in contents.iter().enumerate() {
            let path = dir.path().join(format!("clip{i}.mp4"));
            std::fs::write(&path, body).unwrap();
            let id = intake.add(Candidate::from_path(&path).unwrap()).unwrap();
            intake.resolve_duration(id, Ok(10.0)).unwrap();
        }
        let toolkit = Arc::new(Toolkit::new(Arc::new(ScriptedConverter { delay })));
        Fixture {
            dir,
            intake,
            orchestrator: Arc::new(BatchOrchestrator::new(toolkit)),
        }
    }

    #[tokio::test]
    async fn failure_does_not_halt_batch() {
        let fx = fixture(&[b"one", b"fail-two", b"three"], Duration::ZERO);
        let summary = fx
            .orchestrator
            .run_batch(fx.intake.items(), &ConversionParameters::default())
            .await
            .unwrap();

        let statuses: Vec<TaskStatus> = fx.orchestrator.tasks().iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Completed, TaskStatus::Error, TaskStatus::Completed]
        );
        assert_eq!(fx.orchestrator.state(), BatchState::Idle);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(fx.orchestrator.completed().len(), 2);

        let failed = &fx.orchestrator.tasks()[1];
        assert!(failed.error.as_deref().unwrap().contains("invalid data"));
        assert!(failed.result.is_none());

        let done = &fx.orchestrator.tasks()[0];
        assert_eq!(done.progress, 100);
        assert_eq!(done.result.as_deref(), Some(&b"GIF89aone"[..]));
    }

    #[tokio::test]
    async fn unready_item_fails_without_converting() {
        let mut fx = fixture(&[b"one"], Duration::ZERO);
        let path = fx.dir.path().join("late.webm");
        std::fs::write(&path, b"two").unwrap();
        fx.intake.add(Candidate::from_path(&path).unwrap()).unwrap();

        let summary = fx
            .orchestrator
            .run_batch(fx.intake.items(), &ConversionParameters::default())
            .await
            .unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert!(fx.orchestrator.tasks()[1]
            .error
            .as_deref()
            .unwrap()
            .contains("not ready"));
    }

    #[tokio::test]
    async fn single_conversion_refused_while_batch_runs() {
        let fx = fixture(&[b"one", b"two"], Duration::from_millis(50));
        let orchestrator = Arc::clone(&fx.orchestrator);
        let items = fx.intake.items().to_vec();

        let batch = tokio::spawn(async move {
            orchestrator
                .run_batch(&items, &ConversionParameters::default())
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(fx.orchestrator.is_running());
        let err = fx
            .orchestrator
            .convert_single(
                fx.intake.get(0).unwrap(),
                &ConversionParameters::default(),
                &ProgressReporter::noop(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::Busy);
        assert_matches!(fx.orchestrator.clear(), Err(Error::Busy));

        batch.await.unwrap().unwrap();
        assert!(!fx.orchestrator.is_running());
    }

    #[tokio::test]
    async fn batch_refused_while_single_conversion_runs() {
        let fx = fixture(&[b"one"], Duration::from_millis(50));
        let orchestrator = Arc::clone(&fx.orchestrator);
        let item = fx.intake.get(0).unwrap().clone();

        let single = tokio::spawn(async move {
            orchestrator
                .convert_single(&item, &ConversionParameters::default(), &ProgressReporter::noop())
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = fx
            .orchestrator
            .run_batch(fx.intake.items(), &ConversionParameters::default())
            .await
            .unwrap_err();
        assert_matches!(err, Error::Busy);
        assert_eq!(fx.orchestrator.state(), BatchState::Idle);

        let gif = single.await.unwrap().unwrap();
        assert_eq!(&gif[..], b"GIF89aone");
    }

    #[tokio::test]
    async fn tasks_survive_until_cleared() {
        let fx = fixture(&[b"one", b"two"], Duration::ZERO);
        fx.orchestrator
            .run_batch(fx.intake.items(), &ConversionParameters::default())
            .await
            .unwrap();
        assert_eq!(fx.orchestrator.summary().total, 2);

        let first = fx.orchestrator.tasks()[0].id;
        let removed = fx.orchestrator.remove_task(first).unwrap();
        assert_eq!(removed.name, "clip0.mp4");
        assert_eq!(fx.orchestrator.summary().total, 1);
        assert_matches!(fx.orchestrator.remove_task(first), Err(Error::NotFound { .. }));

        fx.orchestrator.clear().unwrap();
        assert!(fx.orchestrator.tasks().is_empty());
    }

    #[tokio::test]
    async fn batch_events_in_order() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let fx = fixture(&[b"one"], Duration::ZERO);
        let toolkit = Arc::new(Toolkit::new(Arc::new(ScriptedConverter {
            delay: Duration::ZERO,
        })));
        let orchestrator = BatchOrchestrator::new(toolkit).with_events(bus);

        orchestrator
            .run_batch(fx.intake.items(), &ConversionParameters::default())
            .await
            .unwrap();
        let task_id = orchestrator.tasks()[0].id;

        let mut payloads = Vec::new();
        while let Ok(event) = rx.try_recv() {
            payloads.push(event.payload);
        }
        assert_eq!(
            payloads,
            vec![
                EventPayload::BatchStarted { total: 1 },
                EventPayload::TaskQueued {
                    task_id,
                    media_id: fx.intake.get(0).unwrap().id
                },
                EventPayload::TaskStarted { task_id },
                EventPayload::TaskProgress {
                    task_id,
                    progress: 50
                },
                EventPayload::TaskCompleted {
                    task_id,
                    output_size: 9
                },
                EventPayload::BatchFinished {
                    completed: 1,
                    failed: 0
                },
            ]
        );
    }

    #[test]
    fn summary_display() {
        let summary = BatchSummary {
            total: 3,
            completed: 2,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(summary.to_string(), "2/3 completed, 1 failed");
    }
}
