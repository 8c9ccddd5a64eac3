//! Scratch directory for a single conversion.
//!
//! The encoder works on files, while callers hold bytes. A [`Workspace`]
//! materialises the input bytes inside a temporary directory, hands out the
//! output path, and reads the result back. Everything is removed on drop.

use std::path::{Path, PathBuf};

use gifcut_common::{Error, Result};
use tempfile::TempDir;

const OUTPUT_NAME: &str = "output.gif";

/// Temporary directory holding one conversion's input and output.
///
/// # Example
///
/// ```no_run
/// use gifcut_av::Workspace;
///
/// let ws = Workspace::new("clip.mp4").unwrap();
/// ws.write_input(b"...").unwrap();
/// // ... run the encoder from ws.input() to ws.output() ...
/// let gif = ws.read_output().unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    input_name: String,
}

impl Workspace {
    /// Create a workspace. `input_name` is used for the input file so the
    /// encoder can sniff the container from its extension.
    pub fn new(input_name: &str) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("gifcut-")
            .tempdir()
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        let input_name = Path::new(input_name)
            .file_name()
            .map(|n| format!("input-{}", n.to_string_lossy()))
            .unwrap_or_else(|| "input".to_string());

        Ok(Self {
            temp_dir,
            input_name,
        })
    }

    /// Path of the input file inside the workspace.
    pub fn input(&self) -> PathBuf {
        self.temp_dir.path().join(&self.input_name)
    }

    /// Path the encoder should write to.
    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join(OUTPUT_NAME)
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write the input bytes to [`Workspace::input`].
    pub fn write_input(&self, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.input();
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read the encoder's output.
    ///
    /// # Errors
    ///
    /// Fails if the output is missing or empty.
    pub fn read_output(&self) -> Result<Vec<u8>> {
        let path = self.output();
        if !path.exists() {
            return Err(Error::tool(
                "workspace",
                format!("output file does not exist: {}", path.display()),
            ));
        }
        let bytes = std::fs::read(&path)?;
        if bytes.is_empty() {
            return Err(Error::tool("workspace", "output file is empty"));
        }
        Ok(bytes)
    }
}
