//! gifcut-common: shared types, constants, and utilities.
//!
//! This crate provides common functionality used across gifcut:
//!
//! - **Typed IDs**: UUID wrappers for media items and conversion tasks
//! - **Conversion parameters**: the record handed to the encoder and persisted as settings
//! - **Error handling**: one error type covering validation, loading, and conversion failures
//! - **Configuration**: application config with defaults for every section
//! - **Events**: a broadcast bus for intake, toolkit, and batch progress
//!
//! # Examples
//!
//! ```
//! use gifcut_common::{ConversionParameters, FilterKind, TaskId};
//!
//! let id = TaskId::new();
//! let params = ConversionParameters {
//!     filter: FilterKind::Sepia,
//!     ..ConversionParameters::default()
//! };
//! assert_eq!(params.width, 480);
//! assert!(!id.to_string().is_empty());
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod params;

pub use error::{Error, ErrorKind, Result};
pub use ids::*;
pub use params::*;
