//! Duration probing via ffprobe.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format` and
//! reads `format.duration`. Only the container duration matters to gifcut;
//! stream details are ignored.

use std::path::Path;
use std::time::Duration;

use gifcut_common::{Error, Result};
use serde::Deserialize;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe the duration of a media file in seconds.
///
/// # Errors
///
/// Returns [`Error::Tool`] if ffprobe is missing, fails, or reports no usable
/// duration.
pub async fn probe_duration(tools: &ToolRegistry, path: &Path) -> Result<f64> {
    let ffprobe = tools.require("ffprobe")?;

    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"]);
    cmd.arg(path.to_string_lossy().as_ref());
    cmd.timeout(PROBE_TIMEOUT);

    let output = cmd.execute().await?;
    let duration = parse_duration(&output.stdout)?;
    tracing::debug!("Probed {}: {duration:.2}s", path.display());
    Ok(duration)
}

/// Extract `format.duration` from ffprobe's JSON output.
pub fn parse_duration(json: &str) -> Result<f64> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::tool("ffprobe", format!("JSON parse error: {e}")))?;

    let raw = ff
        .format
        .duration
        .ok_or_else(|| Error::tool("ffprobe", "no duration reported"))?;

    match raw.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(Error::tool("ffprobe", format!("invalid duration: {raw}"))),
    }
}
