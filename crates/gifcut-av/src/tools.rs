//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe and provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gifcut_common::config::ToolsConfig;
use gifcut_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the config supplies a custom path **and** that
    /// path exists, it is used directly. Otherwise [`which::which`] is used
    /// to locate the tool in `PATH`. Tools that are not found are silently
    /// omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut registry = Self::default();
        for &name in KNOWN_TOOLS {
            if let Some(path) = Self::locate(name, tools_config) {
                registry.tools.insert(name.to_string(), path);
            }
        }
        registry
    }

    /// Resolve a single tool, preferring the configured path.
    pub fn locate(name: &str, tools_config: &ToolsConfig) -> Option<PathBuf> {
        let custom_path = match name {
            "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
            "ffprobe" => tools_config.ffprobe_path.as_deref(),
            _ => None,
        };

        match custom_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => {
                tracing::warn!(
                    "Configured {name} path {} does not exist; falling back to PATH",
                    p.display()
                );
                which::which(name).ok()
            }
            None => which::which(name).ok(),
        }
    }

    /// Register a tool at an explicit path.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.tools.insert(name.into(), path.into());
    }

    /// Return the path for the given tool, or an [`Error::Tool`] if the tool
    /// was not found during discovery.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::tool(name, format!("{name} not found; is it installed and in PATH?")))
    }

    /// Whether the tool was found.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
pub fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // No tool is guaranteed in CI; the call itself must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require("ffmpeg").unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let infos = ToolRegistry::default().check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn explicit_insert_is_required() {
        let mut registry = ToolRegistry::default();
        registry.insert("ffmpeg", "/opt/ffmpeg/bin/ffmpeg");
        assert!(registry.has("ffmpeg"));
        assert_eq!(
            registry.require("ffmpeg").unwrap(),
            Path::new("/opt/ffmpeg/bin/ffmpeg")
        );
    }

    #[test]
    fn missing_custom_path_falls_back() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg_xyz")),
            ffprobe_path: None,
        };
        let located = ToolRegistry::locate("ffmpeg", &cfg);
        assert_ne!(located, Some(PathBuf::from("/nonexistent/ffmpeg_xyz")));
    }
}
