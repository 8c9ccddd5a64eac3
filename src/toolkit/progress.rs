//! Progress reporting for toolkit loads and conversions.

use parking_lot::Mutex;

/// Forwards progress percentages to a callback.
///
/// Values are rounded and clamped to `0..=100`. A value lower than or equal
/// to the last one forwarded is dropped, so observers only ever see a rising
/// sequence.
pub struct ProgressReporter {
    callback: Box<dyn Fn(u8) + Send + Sync>,
    last: Mutex<Option<u8>>,
}

impl ProgressReporter {
    /// Create a new reporter from the given callback.
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            last: Mutex::new(None),
        }
    }

    /// A reporter that discards everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report a percentage. Returns the forwarded value, or `None` if it was
    /// dropped.
    pub fn report(&self, pct: f64) -> Option<u8> {
        if !pct.is_finite() {
            return None;
        }
        let value = pct.round().clamp(0.0, 100.0) as u8;

        {
            let mut last = self.last.lock();
            if matches!(*last, Some(prev) if value <= prev) {
                return None;
            }
            *last = Some(value);
        }

        (self.callback)(value);
        Some(value)
    }

    /// The last value forwarded.
    pub fn last(&self) -> Option<u8> {
        *self.last.lock()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}
