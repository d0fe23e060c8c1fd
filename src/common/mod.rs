//! Shared infrastructure: binary readers, format detection, errors, units.

pub mod binary;
pub mod detection;
pub mod error;
pub mod unit;
pub mod xml;

pub use error::{Error, FormatError, InjectionError, Result};
