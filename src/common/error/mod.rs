//! Unified error types for the yuja library.
//!
//! This module provides a unified error type that encompasses errors from both
//! the binary (HWP) and XML (HWPX) pipelines, presenting a consistent API.

mod types;

pub use types::{Error, FormatError, InjectionError, Result};
