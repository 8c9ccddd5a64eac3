//! Unified error type for gifcut.
//!
//! Every failure funnels into [`Error`]. [`Error::kind`] folds the variants
//! into the three user-facing categories (validation, toolkit load, and
//! conversion) so callers can decide how to surface them.

use std::fmt;

/// Broad category of an [`Error`], used to pick how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input rejected locally (format, size). The upload is refused.
    Validation,
    /// The external toolkit failed to initialize. Retry is offered.
    Load,
    /// One conversion failed. Recorded on the task, never aborts a batch.
    Conversion,
    /// Anything else (I/O, settings storage, internal).
    Other,
}

/// Error type covering all failure modes in gifcut.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file's media type is not on the accepted list.
    #[error("unsupported format: {mime}")]
    UnsupportedFormat {
        /// The detected MIME type (or `application/octet-stream`).
        mime: String,
    },

    /// The file exceeds the upload size ceiling.
    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        /// Size of the rejected file.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// The external toolkit could not be initialized.
    #[error("toolkit failed to load: {0}")]
    Load(String),

    /// A single conversion failed.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The toolkit is already servicing another conversion.
    #[error("a conversion is already in progress")]
    Busy,

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "media item", "task").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Reading or writing persisted settings failed.
    #[error("settings error: {0}")]
    Settings(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat { .. } | Error::FileTooLarge { .. } => ErrorKind::Validation,
            Error::Load(_) => ErrorKind::Load,
            Error::Conversion(_) | Error::Busy => ErrorKind::Conversion,
            Error::NotFound { .. }
            | Error::Tool { .. }
            | Error::Settings(_)
            | Error::Io { .. }
            | Error::Internal(_) => ErrorKind::Other,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Conversion`].
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion(message.into())
    }

    /// Convenience constructor for [`Error::Load`].
    pub fn load(message: impl Into<String>) -> Self {
        Error::Load(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
