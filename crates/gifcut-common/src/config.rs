//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// 100 MiB upload ceiling.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// MIME types accepted by file intake.
pub const DEFAULT_ACCEPTED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub intake: IntakeConfig,
    pub toolkit: ToolkitConfig,
    /// Where the last-used conversion settings are persisted.
    pub settings_path: Option<PathBuf>,
    /// Default directory for saved GIFs.
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Settings(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.intake.max_file_size == 0 {
            warnings.push("intake.max_file_size is 0; every upload will be rejected".into());
        }

        if self.intake.accepted_mime_types.is_empty() {
            warnings.push("intake.accepted_mime_types is empty; every upload will be rejected".into());
        }

        for (i, mime) in self.intake.accepted_mime_types.iter().enumerate() {
            if !mime.starts_with("video/") {
                warnings.push(format!(
                    "intake.accepted_mime_types[{i}] '{mime}' is not a video type"
                ));
            }
        }

        if self.toolkit.encode_timeout_secs == 0 {
            warnings.push("toolkit.encode_timeout_secs is 0; encodes will time out immediately".into());
        }

        for (name, path) in [
            ("ffmpeg_path", self.tools.ffmpeg_path.as_deref()),
            ("ffprobe_path", self.tools.ffprobe_path.as_deref()),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} {} does not exist; PATH lookup will be used",
                        p.display()
                    ));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Optional explicit paths for the external tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Upload validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub max_file_size: u64,
    pub accepted_mime_types: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_mime_types: DEFAULT_ACCEPTED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// External toolkit behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Seconds before a still-running load is reported as slow.
    pub slow_load_notice_secs: u64,
    /// Upper bound for one encode. Kills runaway ffmpeg processes.
    pub encode_timeout_secs: u64,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            slow_load_notice_secs: 15,
            encode_timeout_secs: 600,
        }
    }
}
