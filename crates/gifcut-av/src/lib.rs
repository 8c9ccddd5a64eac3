//! # gifcut-av
//!
//! External tool management, probing, and GIF encoding for gifcut.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and per-line output callbacks.
//! - **Probing** ([`probe_duration`]) -- read a container's duration with
//!   ffprobe.
//! - **GIF encoding** ([`gif`]) -- translate
//!   [`ConversionParameters`](gifcut_common::ConversionParameters) into an
//!   ffmpeg filter graph and run it with progress reporting.
//! - **Workspace management** ([`Workspace`]) -- a temporary directory that
//!   holds input and output bytes for one conversion.

pub mod command;
pub mod gif;
pub mod probe;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use gif::{encode_gif, palette_colors, EncodeProgress};
pub use probe::probe_duration;
pub use tools::{ToolInfo, ToolRegistry, KNOWN_TOOLS};
pub use workspace::Workspace;
