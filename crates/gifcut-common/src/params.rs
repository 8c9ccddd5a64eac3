//! Conversion parameters and task status shared by every crate.
//!
//! Enums serialize in lowercase and implement `Display` manually so the
//! persisted settings record and log lines use the same spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// FilterKind
// ---------------------------------------------------------------------------

/// Colour/visual filter applied to every output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
    Sepia,
    Blur,
    Brightness,
    Contrast,
}

impl FilterKind {
    /// All variants in menu order.
    pub const ALL: [FilterKind; 6] = [
        FilterKind::None,
        FilterKind::Grayscale,
        FilterKind::Sepia,
        FilterKind::Blur,
        FilterKind::Brightness,
        FilterKind::Contrast,
    ];
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Grayscale => write!(f, "grayscale"),
            Self::Sepia => write!(f, "sepia"),
            Self::Blur => write!(f, "blur"),
            Self::Brightness => write!(f, "brightness"),
            Self::Contrast => write!(f, "contrast"),
        }
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown filter: {s}"))
    }
}

// ---------------------------------------------------------------------------
// ConversionParameters
// ---------------------------------------------------------------------------

/// Everything the encoder needs besides the input bytes.
///
/// This is also the persisted "last used settings" record, so the serialized
/// field names are stable: `startTime`, `duration`, `width`, `frameRate`,
/// `quality`, `reverse`, `filter`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionParameters {
    /// Trim start in seconds.
    #[serde(rename = "startTime")]
    pub start: f64,
    /// Trim length in seconds.
    pub duration: f64,
    /// Output width in pixels; height follows the aspect ratio.
    pub width: u32,
    /// Output frames per second.
    pub frame_rate: u32,
    /// 1 (best) to 31 (smallest).
    pub quality: u32,
    /// Play the clip backwards.
    pub reverse: bool,
    pub filter: FilterKind,
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            start: 0.0,
            duration: 5.0,
            width: 480,
            frame_rate: 10,
            quality: 10,
            reverse: false,
            filter: FilterKind::None,
        }
    }
}

impl ConversionParameters {
    /// End of the trim interval.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    /// `Completed` and `Error` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reset_record() {
        let p = ConversionParameters::default();
        assert_eq!(p.start, 0.0);
        assert_eq!(p.duration, 5.0);
        assert_eq!(p.width, 480);
        assert_eq!(p.frame_rate, 10);
        assert_eq!(p.quality, 10);
        assert!(!p.reverse);
        assert_eq!(p.filter, FilterKind::None);
        assert_eq!(p.end(), 5.0);
    }

    #[test]
    fn serialized_field_names() {
        let json = serde_json::to_value(ConversionParameters::default()).unwrap();
        assert_eq!(json["startTime"], 0.0);
        assert_eq!(json["frameRate"], 10);
        assert_eq!(json["filter"], "none");
        assert_eq!(json["reverse"], false);
    }

    #[test]
    fn partial_record_fills_defaults() {
        let p: ConversionParameters =
            serde_json::from_str(r#"{"width": 320, "filter": "sepia"}"#).unwrap();
        assert_eq!(p.width, 320);
        assert_eq!(p.filter, FilterKind::Sepia);
        assert_eq!(p.frame_rate, 10);
    }

    #[test]
    fn filter_from_str() {
        assert_eq!("Grayscale".parse::<FilterKind>().unwrap(), FilterKind::Grayscale);
        assert_eq!(" blur ".parse::<FilterKind>().unwrap(), FilterKind::Blur);
        assert!("vignette".parse::<FilterKind>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }
}
