//! File intake: validation, registration and duration back-fill.
//!
//! Files are checked against the accepted MIME list and the size ceiling
//! before they are registered. A registered [`MediaItem`] starts with a
//! duration of 0; [`Intake::resolve_duration`] fills it in once the
//! container has been probed. Every item holds a `preview://` URL that stays
//! valid until the item is removed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use gifcut_av::ToolRegistry;
use gifcut_common::config::IntakeConfig;
use gifcut_common::events::{EventBus, EventPayload};
use gifcut_common::{Error, MediaId, Result};
use serde::Serialize;
use uuid::Uuid;

/// MIME type reported for extensions we don't recognise.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Guess a video MIME type from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv" | "ogg") => "video/ogg",
        Some("mov" | "qt") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        _ => UNKNOWN_MIME,
    }
}

// ---------------------------------------------------------------------------
// Candidate / MediaItem
// ---------------------------------------------------------------------------

/// A file offered for intake, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime: String,
}

impl Candidate {
    /// Describe a file on disk. The MIME type comes from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            mime: mime_for_path(path).to_string(),
        })
    }
}

/// A registered video.
#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub mime: String,
    /// Seconds; 0 until resolved.
    pub duration: f64,
    pub preview_url: String,
    #[serde(skip)]
    duration_resolved: bool,
}

impl MediaItem {
    /// Ready for conversion once a positive duration is known.
    pub fn is_ready(&self) -> bool {
        self.duration > 0.0
    }

    pub fn duration_resolved(&self) -> bool {
        self.duration_resolved
    }

    /// Read the whole file into memory.
    pub async fn read_bytes(&self) -> Result<Bytes> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(Bytes::from(data))
    }
}

/// Per-file result of [`Intake::ingest`].
#[derive(Debug)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub result: Result<MediaId>,
}

// ---------------------------------------------------------------------------
// Preview URLs
// ---------------------------------------------------------------------------

/// Issues and revokes `preview://` handles.
#[derive(Debug, Default)]
pub struct PreviewUrls {
    live: HashSet<String>,
}

impl PreviewUrls {
    pub fn mint(&mut self) -> String {
        let url = format!("preview://{}", Uuid::new_v4());
        self.live.insert(url.clone());
        url
    }

    /// Returns `false` if the URL was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        self.live.remove(url)
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains(url)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// The ordered list of registered media items.
#[derive(Debug)]
pub struct Intake {
    config: IntakeConfig,
    items: Vec<MediaItem>,
    previews: PreviewUrls,
    events: Option<Arc<EventBus>>,
}

impl Intake {
    pub fn new(config: IntakeConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            previews: PreviewUrls::default(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Check format and size. Format is checked first.
    pub fn validate(&self, candidate: &Candidate) -> Result<()> {
        if !self
            .config
            .accepted_mime_types
            .iter()
            .any(|m| m == &candidate.mime)
        {
            return Err(Error::UnsupportedFormat {
                mime: candidate.mime.clone(),
            });
        }
        if candidate.size > self.config.max_file_size {
            return Err(Error::FileTooLarge {
                size: candidate.size,
                limit: self.config.max_file_size,
            });
        }
        Ok(())
    }

    /// Append a validated candidate with duration 0 and a fresh preview URL.
    pub fn register(&mut self, candidate: Candidate) -> MediaId {
        let id = MediaId::new();
        let preview_url = self.previews.mint();

        tracing::info!("Registered {} ({} bytes, {})", candidate.name, candidate.size, candidate.mime);
        self.broadcast(EventPayload::MediaRegistered {
            media_id: id,
            name: candidate.name.clone(),
        });

        self.items.push(MediaItem {
            id,
            path: candidate.path,
            name: candidate.name,
            size: candidate.size,
            mime: candidate.mime,
            duration: 0.0,
            preview_url,
            duration_resolved: false,
        });
        id
    }

    /// Validate then register one candidate.
    pub fn add(&mut self, candidate: Candidate) -> Result<MediaId> {
        self.validate(&candidate)?;
        Ok(self.register(candidate))
    }

    /// Add several files, e.g. from a multi-file drop. Each file is handled
    /// independently; a rejected file does not stop the rest.
    pub fn ingest<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> Vec<IngestOutcome> {
        paths
            .into_iter()
            .map(|p| {
                let path = p.as_ref().to_path_buf();
                let result = Candidate::from_path(&path).and_then(|c| self.add(c));
                if let Err(e) = &result {
                    tracing::warn!("Rejected {}: {e}", path.display());
                }
                IngestOutcome { path, result }
            })
            .collect()
    }

    /// Record a probed duration. Only the first successful probe is applied;
    /// returns `Ok(false)` when the duration was already known or the probe
    /// failed. A failed probe leaves the item at duration 0.
    pub fn resolve_duration(&mut self, id: MediaId, probed: Result<f64>) -> Result<bool> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::not_found("media item", id))?;

        if item.duration_resolved {
            return Ok(false);
        }

        match probed {
            Ok(duration) if duration.is_finite() && duration > 0.0 => {
                item.duration = duration;
                item.duration_resolved = true;
                tracing::debug!("{}: duration {duration:.2}s", item.name);
                let payload = EventPayload::MediaDurationResolved { media_id: id, duration };
                self.broadcast(payload);
                Ok(true)
            }
            Ok(duration) => {
                tracing::warn!("{}: unusable duration {duration}; not ready for conversion", item.name);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("{}: failed to read duration: {e}", item.name);
                Ok(false)
            }
        }
    }

    /// Probe every item whose duration is still unknown.
    pub async fn resolve_pending(&mut self, tools: &ToolRegistry) {
        let pending: Vec<(MediaId, PathBuf)> = self
            .items
            .iter()
            .filter(|i| !i.duration_resolved)
            .map(|i| (i.id, i.path.clone()))
            .collect();

        for (id, path) in pending {
            let probed = gifcut_av::probe_duration(tools, &path).await;
            if let Err(e) = self.resolve_duration(id, probed) {
                tracing::debug!("Skipping duration for {}: {e}", path.display());
            }
        }
    }

    /// Revoke the preview URL of the item at `index`, then drop it.
    pub fn remove(&mut self, index: usize) -> Result<MediaItem> {
        if index >= self.items.len() {
            return Err(Error::not_found("media item", format!("index {index}")));
        }
        let item = self.items.remove(index);
        self.previews.revoke(&item.preview_url);
        tracing::info!("Removed {}", item.name);
        self.broadcast(EventPayload::MediaRemoved { media_id: item.id });
        Ok(item)
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn find(&self, id: MediaId) -> Option<&MediaItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Whether the item at `index` exists and has a known duration.
    pub fn is_ready(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(MediaItem::is_ready)
    }

    pub fn previews(&self) -> &PreviewUrls {
        &self.previews
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn candidate(name: &str, size: u64) -> Candidate {
        let path = PathBuf::from(format!("/videos/{name}"));
        Candidate {
            mime: mime_for_path(&path).to_string(),
            name: name.to_string(),
            path,
            size,
        }
    }

    fn intake() -> Intake {
        Intake::new(IntakeConfig::default())
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("a.MP4")), "video/mp4");
        assert_eq!(mime_for_path(Path::new("a.mov")), "video/quicktime");
        assert_eq!(mime_for_path(Path::new("a.avi")), "video/x-msvideo");
        assert_eq!(mime_for_path(Path::new("a.ogv")), "video/ogg");
        assert_eq!(mime_for_path(Path::new("a.mkv")), UNKNOWN_MIME);
        assert_eq!(mime_for_path(Path::new("noext")), UNKNOWN_MIME);
    }

    #[tokio::test]
    async fn resolve_pending_without_ffprobe_leaves_items_unready() {
        let mut intake = intake();
        let id = intake.register(candidate("clip.mp4", 10));

        intake.resolve_pending(&ToolRegistry::default()).await;

        let item = intake.find(id).unwrap();
        assert_eq!(item.duration, 0.0);
        assert!(!item.duration_resolved());
        assert!(!intake.is_ready(0));

        // A later probe still applies.
        assert!(intake.resolve_duration(id, Ok(4.0)).unwrap());
    }

    #[test]
    fn validate_rejects_unsupported_format() {
        let err = intake().validate(&candidate("clip.mkv", 10)).unwrap_err();
        assert_matches!(err, Error::UnsupportedFormat { .. });
    }

    #[test]
    fn validate_rejects_oversized_file() {
        let limit = 100 * 1024 * 1024;
        assert!(intake().validate(&candidate("clip.mp4", limit)).is_ok());
        let err = intake().validate(&candidate("clip.mp4", limit + 1)).unwrap_err();
        assert_matches!(err, Error::FileTooLarge { size, .. } if size == limit + 1);
    }

    #[test]
    fn register_starts_unresolved_with_live_preview() {
        let mut intake = intake();
        let id = intake.register(candidate("clip.mp4", 10));

        let item = intake.find(id).unwrap();
        assert_eq!(item.duration, 0.0);
        assert!(!item.is_ready());
        assert!(item.preview_url.starts_with("preview://"));
        assert!(intake.previews().is_live(&item.preview_url));
    }

    #[test]
    fn duration_resolves_once() {
        let mut intake = intake();
        let id = intake.register(candidate("clip.mp4", 10));

        assert!(intake.resolve_duration(id, Ok(12.5)).unwrap());
        assert!(!intake.resolve_duration(id, Ok(3.0)).unwrap());
        assert_eq!(intake.get(0).unwrap().duration, 12.5);
        assert!(intake.is_ready(0));
    }

    #[test]
    fn failed_probe_leaves_item_not_ready() {
        let mut intake = intake();
        let id = intake.register(candidate("clip.webm", 10));

        let applied = intake
            .resolve_duration(id, Err(Error::tool("ffprobe", "boom")))
            .unwrap();
        assert!(!applied);
        assert!(!intake.is_ready(0));

        // A later successful probe still applies.
        assert!(intake.resolve_duration(id, Ok(4.0)).unwrap());
    }

    #[test]
    fn resolve_unknown_id_is_not_found() {
        let err = intake().resolve_duration(MediaId::new(), Ok(1.0)).unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[test]
    fn remove_revokes_only_that_preview() {
        let mut intake = intake();
        let ids: Vec<MediaId> = ["a.mp4", "b.mp4", "c.mp4"]
            .iter()
            .map(|n| intake.register(candidate(n, 10)))
            .collect();
        intake.resolve_duration(ids[0], Ok(1.0)).unwrap();
        intake.resolve_duration(ids[2], Ok(3.0)).unwrap();

        let removed = intake.remove(1).unwrap();
        assert_eq!(removed.id, ids[1]);
        assert!(!intake.previews().is_live(&removed.preview_url));

        assert_eq!(intake.len(), 2);
        for (item, expected) in intake.items().iter().zip([1.0, 3.0]) {
            assert_eq!(item.duration, expected);
            assert!(intake.previews().is_live(&item.preview_url));
        }
        assert_eq!(intake.previews().len(), 2);
    }

    #[test]
    fn remove_out_of_range_is_error() {
        assert!(intake().remove(0).is_err());
    }

    #[test]
    fn ingest_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.mp4");
        let bad = dir.path().join("notes.txt");
        std::fs::write(&good, b"fake mp4").unwrap();
        std::fs::write(&bad, b"text").unwrap();
        let missing = dir.path().join("missing.mp4");

        let mut intake = intake();
        let outcomes = intake.ingest([&good, &bad, &missing]);

        assert!(outcomes[0].result.is_ok());
        assert_matches!(outcomes[1].result, Err(Error::UnsupportedFormat { .. }));
        assert_matches!(outcomes[2].result, Err(Error::Io { .. }));
        assert_eq!(intake.len(), 1);
        assert_eq!(intake.get(0).unwrap().size, 8);
    }

    #[test]
    fn register_broadcasts() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let mut intake = intake().with_events(bus);
        let id = intake.register(candidate("clip.mp4", 1));
        assert_eq!(
            rx.try_recv().unwrap().payload,
            EventPayload::MediaRegistered {
                media_id: id,
                name: "clip.mp4".into()
            }
        );
    }
}
