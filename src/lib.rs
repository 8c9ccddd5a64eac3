//! gifcut - trim, filter and convert video clips into animated GIFs
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod export;
pub mod intake;
pub mod session;
pub mod settings;
pub mod timeline;
pub mod toolkit;
