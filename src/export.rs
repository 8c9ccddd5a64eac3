//! Saving converted GIFs to disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gifcut_common::{Error, Result, TaskStatus};

use crate::batch::ConversionTask;

/// MIME type of every output.
pub const GIF_MIME: &str = "image/gif";

/// `clip.mp4` -> `clip.gif`. Only the last extension is replaced.
pub fn output_file_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}.gif")
}

/// Pick a path in `dir` for `file_name` that is neither on disk nor in
/// `taken`, appending `-1`, `-2`, ... to the stem as needed.
fn unique_path(dir: &Path, file_name: &str, taken: &HashSet<PathBuf>) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() && !taken.contains(&candidate) {
        return candidate;
    }

    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}.gif")))
        .find(|p| !p.exists() && !taken.contains(p))
        .unwrap_or(candidate)
}

/// Write `bytes` as the GIF for `source_name` into `dir`, never overwriting.
pub fn save_bytes(bytes: &[u8], source_name: &str, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = unique_path(dir, &output_file_name(source_name), &HashSet::new());
    std::fs::write(&path, bytes)?;
    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// Write one completed task into `dir`.
pub fn save_task(task: &ConversionTask, dir: &Path) -> Result<PathBuf> {
    let bytes = completed_bytes(task)?;
    save_bytes(bytes, &task.name, dir)
}

/// Write every completed task into `dir`, skipping the rest. Clashing names
/// get a numeric suffix.
pub fn save_all(tasks: &[ConversionTask], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = HashSet::new();
    let mut paths = Vec::new();

    for task in tasks {
        let Ok(bytes) = completed_bytes(task) else {
            tracing::debug!("Skipping {} ({})", task.name, task.status);
            continue;
        };
        let path = unique_path(dir, &output_file_name(&task.name), &written);
        std::fs::write(&path, bytes)?;
        tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        written.insert(path.clone());
        paths.push(path);
    }

    Ok(paths)
}

fn completed_bytes(task: &ConversionTask) -> Result<&[u8]> {
    match (&task.status, &task.result) {
        (TaskStatus::Completed, Some(bytes)) => Ok(&bytes[..]),
        _ => Err(Error::conversion(format!(
            "{} has no result ({})",
            task.name, task.status
        ))),
    }
}
