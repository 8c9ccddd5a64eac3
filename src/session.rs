//! The editing view over one selected media item.
//!
//! An [`EditingSession`] ties the range selector for the selected item to the
//! settings record: every interval change is written back as
//! `start` / `duration = end - start`.

use gifcut_common::{ConversionParameters, Error, Result};

use crate::intake::Intake;
use crate::settings::{SettingsPatch, SettingsState};
use crate::timeline::{DragKind, Interval, RangeSelector};

/// Track width used until the caller reports a real one.
pub const DEFAULT_TRACK_WIDTH: f64 = 1000.0;

#[derive(Debug)]
pub struct EditingSession {
    settings: SettingsState,
    selected: Option<usize>,
    selector: Option<RangeSelector>,
    track_width: f64,
}

impl EditingSession {
    pub fn new(settings: SettingsState) -> Self {
        Self {
            settings,
            selected: None,
            selector: None,
            track_width: DEFAULT_TRACK_WIDTH,
        }
    }

    pub fn settings(&self) -> &SettingsState {
        &self.settings
    }

    pub fn params(&self) -> &ConversionParameters {
        self.settings.params()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn interval(&self) -> Option<Interval> {
        self.selector.as_ref().map(RangeSelector::interval)
    }

    pub fn selector(&self) -> Option<&RangeSelector> {
        self.selector.as_ref()
    }

    /// Select the item at `index` and reset the interval to
    /// `[0, min(5, duration)]`.
    pub fn select(&mut self, intake: &Intake, index: usize) -> Result<Interval> {
        let item = intake
            .get(index)
            .ok_or_else(|| Error::not_found("media item", format!("index {index}")))?;

        let selector = RangeSelector::new(item.duration, self.track_width);
        let interval = selector.interval();
        tracing::debug!(
            "Selected {} ({:.2}s), interval [{:.2}, {:.2}]",
            item.name,
            item.duration,
            interval.start,
            interval.end
        );

        self.selected = Some(index);
        self.selector = Some(selector);
        self.record(interval);
        Ok(interval)
    }

    /// Keep the selection pointing at the same item after `index` was
    /// removed from intake.
    pub fn item_removed(&mut self, index: usize) {
        match self.selected {
            Some(sel) if sel == index => {
                self.selected = None;
                self.selector = None;
            }
            Some(sel) if sel > index => self.selected = Some(sel - 1),
            _ => {}
        }
    }

    pub fn set_track_width(&mut self, width: f64) {
        self.track_width = width;
        if let Some(selector) = self.selector.as_mut() {
            selector.set_track_width(width);
        }
    }

    pub fn begin_drag(&mut self, kind: DragKind, pointer_x: f64) {
        if let Some(selector) = self.selector.as_mut() {
            selector.begin_drag(kind, pointer_x);
        }
    }

    pub fn update_drag(&mut self, pointer_x: f64) -> Option<Interval> {
        let interval = self.selector.as_mut()?.update_drag(pointer_x)?;
        self.record(interval);
        Some(interval)
    }

    pub fn end_drag(&mut self) {
        if let Some(selector) = self.selector.as_mut() {
            selector.end_drag();
        }
    }

    pub fn set_start(&mut self, value: f64) -> Option<Interval> {
        let interval = self.selector.as_mut()?.set_start(value)?;
        self.record(interval);
        Some(interval)
    }

    pub fn set_end(&mut self, value: f64) -> Option<Interval> {
        let interval = self.selector.as_mut()?.set_end(value)?;
        self.record(interval);
        Some(interval)
    }

    /// Apply a form edit (width, frame rate, filter, ...).
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<ConversionParameters> {
        self.settings.set(patch)
    }

    /// Write the interval into the settings. Storage failures are logged;
    /// the in-memory record is updated regardless.
    fn record(&mut self, interval: Interval) {
        if let Err(e) = self
            .settings
            .set(&SettingsPatch::trim(interval.start, interval.span()))
        {
            tracing::warn!("Failed to persist trim range: {e}");
        }
    }
}
