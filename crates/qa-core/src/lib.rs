//! # qa-core
//!
//! Shared error type for the event quality-assurance crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{Error, Result};
