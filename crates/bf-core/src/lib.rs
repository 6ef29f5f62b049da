//! # bf-core
//!
//! Shared error and result types for BinFit. Every other crate in the
//! workspace returns [`Result`] from its fallible APIs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{Error, Result};
