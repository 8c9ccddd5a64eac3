//! Last-used conversion settings.
//!
//! [`SettingsState`] holds one [`ConversionParameters`] record and persists it
//! under [`STORAGE_KEY`] through a [`SettingsStore`]. The state is created
//! once with [`SettingsState::init`] and handed to whoever needs it; there is
//! no global instance.

mod persist;

pub use persist::{JsonFileStore, MemoryStore, SettingsStore};

use std::sync::Arc;

use gifcut_common::events::{EventBus, EventPayload};
use gifcut_common::{ConversionParameters, Error, FilterKind, Result};
use serde::{Deserialize, Serialize};

/// Key the settings record is stored under.
pub const STORAGE_KEY: &str = "gifcut-settings";

// ---------------------------------------------------------------------------
// SettingsPatch
// ---------------------------------------------------------------------------

/// A partial update. `None` fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(rename = "startTime")]
    pub start: Option<f64>,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub frame_rate: Option<u32>,
    pub quality: Option<u32>,
    pub reverse: Option<bool>,
    pub filter: Option<FilterKind>,
}

impl SettingsPatch {
    /// Patch that moves the trim window.
    pub fn trim(start: f64, duration: f64) -> Self {
        Self {
            start: Some(start),
            duration: Some(duration),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the present fields into `params`.
    pub fn apply_to(&self, params: &mut ConversionParameters) {
        if let Some(v) = self.start {
            params.start = v;
        }
        if let Some(v) = self.duration {
            params.duration = v;
        }
        if let Some(v) = self.width {
            params.width = v;
        }
        if let Some(v) = self.frame_rate {
            params.frame_rate = v;
        }
        if let Some(v) = self.quality {
            params.quality = v;
        }
        if let Some(v) = self.reverse {
            params.reverse = v;
        }
        if let Some(v) = self.filter {
            params.filter = v;
        }
    }
}

// ---------------------------------------------------------------------------
// SettingsState
// ---------------------------------------------------------------------------

/// The current settings record and its backing store.
pub struct SettingsState {
    params: ConversionParameters,
    store: Arc<dyn SettingsStore>,
    events: Option<Arc<EventBus>>,
}

impl SettingsState {
    /// Create the state and load the persisted record once. Load failures
    /// are logged and leave the defaults in place.
    pub fn init(store: Arc<dyn SettingsStore>) -> Self {
        let mut state = Self {
            params: ConversionParameters::default(),
            store,
            events: None,
        };
        if let Err(e) = state.load() {
            tracing::warn!("Failed to load settings, using defaults: {e}");
        }
        state
    }

    /// Broadcast [`EventPayload::SettingsChanged`] on every change.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn params(&self) -> &ConversionParameters {
        &self.params
    }

    /// Re-read the persisted record. Fields missing from the record take
    /// their default; an unreadable record is logged and replaced by the
    /// defaults.
    pub fn load(&mut self) -> Result<()> {
        self.params = match self.store.read(STORAGE_KEY)? {
            None => ConversionParameters::default(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Stored settings are invalid ({e}); using defaults");
                ConversionParameters::default()
            }),
        };
        tracing::debug!("Loaded settings: {:?}", self.params);
        Ok(())
    }

    /// Persist the current record.
    pub fn save(&self) -> Result<()> {
        let value = serde_json::to_value(self.params)
            .map_err(|e| Error::Settings(format!("failed to serialize settings: {e}")))?;
        self.store.write(STORAGE_KEY, &value)
    }

    /// Merge `patch` and persist. Values are stored as given, without range
    /// checks. On a storage error the in-memory record still holds the merged
    /// values.
    pub fn set(&mut self, patch: &SettingsPatch) -> Result<ConversionParameters> {
        patch.apply_to(&mut self.params);
        self.changed()?;
        Ok(self.params)
    }

    /// Restore the defaults and persist them.
    pub fn reset(&mut self) -> Result<ConversionParameters> {
        self.params = ConversionParameters::default();
        tracing::info!("Settings reset to defaults");
        self.changed()?;
        Ok(self.params)
    }

    fn changed(&self) -> Result<()> {
        if let Some(events) = &self.events {
            events.broadcast(EventPayload::SettingsChanged);
        }
        self.save()
    }
}

impl std::fmt::Debug for SettingsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsState")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
