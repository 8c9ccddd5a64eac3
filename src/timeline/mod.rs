//! Trim range selection over a media item's time axis.
//!
//! A [`RangeSelector`] owns the selected [`Interval`] for one media item and
//! turns pointer gestures on a horizontal track into new intervals. Every
//! drag update is computed from the pointer delta and the value captured
//! when the drag began, so replaying the same pointer position always yields
//! the same interval.
//!
//! Invariant after every accepted change: `0 <= start < end <= duration` and
//! `end - start >= MIN_SPAN` whenever the duration allows it.

/// Smallest selectable span, in seconds.
pub const MIN_SPAN: f64 = 0.5;

/// Length of the interval selected when a media item is first shown.
pub const DEFAULT_SELECTION: f64 = 5.0;

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A selected `[start, end]` range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The interval shown for a freshly selected item: `[0, min(5, duration)]`.
    pub fn initial(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: DEFAULT_SELECTION.min(duration.max(0.0)),
        }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

// ---------------------------------------------------------------------------
// Drag state
// ---------------------------------------------------------------------------

/// Which part of the track a drag grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// The start handle.
    Start,
    /// The end handle.
    End,
    /// The selected band; moves both edges together.
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    kind: DragKind,
    anchor_x: f64,
    /// `start` for `Start`/`Range`, `end` for `End`, as of `begin_drag`.
    snapshot: f64,
}

/// Listener invoked with every new interval.
pub type OnChange = Box<dyn FnMut(Interval) + Send>;

// ---------------------------------------------------------------------------
// RangeSelector
// ---------------------------------------------------------------------------

/// Interval state plus the in-flight drag gesture for one media item.
pub struct RangeSelector {
    duration: f64,
    track_width: f64,
    interval: Interval,
    drag: Option<Drag>,
    on_change: Option<OnChange>,
}

impl RangeSelector {
    /// Create a selector over `[0, duration]` rendered on a track
    /// `track_width` pixels wide. The interval starts at [`Interval::initial`].
    pub fn new(duration: f64, track_width: f64) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        Self {
            duration,
            track_width,
            interval: Interval::initial(duration),
            drag: None,
            on_change: None,
        }
    }

    /// Register the single change listener, replacing any previous one.
    pub fn on_change(&mut self, listener: impl FnMut(Interval) + Send + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Update the track width after a layout change.
    pub fn set_track_width(&mut self, width: f64) {
        self.track_width = width;
    }

    /// Whether a drag gesture is in progress.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Dragging is disabled on a zero-length axis or a collapsed track.
    pub fn drag_enabled(&self) -> bool {
        self.duration > 0.0 && self.track_width > 0.0
    }

    /// Capture the anchor and the grabbed edge. Emits nothing.
    pub fn begin_drag(&mut self, kind: DragKind, pointer_x: f64) {
        if !self.drag_enabled() {
            return;
        }
        let snapshot = match kind {
            DragKind::Start | DragKind::Range => self.interval.start,
            DragKind::End => self.interval.end,
        };
        self.drag = Some(Drag {
            kind,
            anchor_x: pointer_x,
            snapshot,
        });
    }

    /// Move the active drag to `pointer_x`. Returns the emitted interval, or
    /// `None` when no drag is active.
    pub fn update_drag(&mut self, pointer_x: f64) -> Option<Interval> {
        let drag = self.drag?;
        if !self.drag_enabled() {
            return None;
        }

        let delta = (pointer_x - drag.anchor_x) / self.track_width * self.duration;
        let Interval { start, end } = self.interval;

        let next = match drag.kind {
            DragKind::Start => {
                let new_start = bounded(drag.snapshot + delta, 0.0, end - MIN_SPAN);
                Interval::new(new_start, end)
            }
            DragKind::End => {
                let new_end = bounded_above(drag.snapshot + delta, start + MIN_SPAN, self.duration);
                Interval::new(start, new_end)
            }
            DragKind::Range => {
                let span = end - start;
                let new_start = bounded(drag.snapshot + delta, 0.0, self.duration - span);
                // `duration - span + span` can round past the axis.
                Interval::new(new_start, (new_start + span).min(self.duration))
            }
        };

        self.emit(next);
        Some(next)
    }

    /// Clear drag state unconditionally.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Numeric start entry. Ignored unless `value < end`. `MIN_SPAN` is
    /// only enforced by drags.
    pub fn set_start(&mut self, value: f64) -> Option<Interval> {
        if !value.is_finite() || value >= self.interval.end {
            return None;
        }
        let next = Interval::new(value.max(0.0), self.interval.end);
        self.emit(next);
        Some(next)
    }

    /// Numeric end entry. Ignored unless `value > start`.
    pub fn set_end(&mut self, value: f64) -> Option<Interval> {
        if !value.is_finite() || value <= self.interval.start {
            return None;
        }
        let next = Interval::new(self.interval.start, value.min(self.duration));
        self.emit(next);
        Some(next)
    }

    /// Position of `time` along the track as a percentage.
    pub fn percent(&self, time: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        time / self.duration * 100.0
    }

    fn emit(&mut self, next: Interval) {
        self.interval = next;
        if let Some(listener) = self.on_change.as_mut() {
            listener(next);
        }
    }
}

impl std::fmt::Debug for RangeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeSelector")
            .field("duration", &self.duration)
            .field("track_width", &self.track_width)
            .field("interval", &self.interval)
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}

/// `max(lo, min(v, hi))`: the lower bound wins when the bounds cross.
fn bounded(v: f64, lo: f64, hi: f64) -> f64 {
    lo.max(v.min(hi))
}

/// `min(hi, max(v, lo))`: the upper bound wins when the bounds cross.
fn bounded_above(v: f64, lo: f64, hi: f64) -> f64 {
    hi.min(v.max(lo))
}

/// Render seconds as `m:ss.d`.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let tenths = ((seconds % 1.0) * 10.0).floor() as u64;
    format!("{mins}:{secs:02}.{tenths}")
}
