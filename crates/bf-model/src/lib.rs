//! # bf-model
//!
//! Evaluation model for binned fits of continuous shapes.
//!
//! This crate provides:
//! - [`Observable`] / [`Binning`]: named, binned coordinates with interior
//!   mutability and RAII guards for value restoration and cache suspension.
//! - [`ContinuousPdf`] and concrete densities (Gaussian, exponential,
//!   polynomial) evaluated against shared observables.
//! - [`EvalContext`]: batch input/output plumbing for vectorized evaluation.
//! - [`BinSamplingPdf`]: the adapter that replaces point evaluation of a
//!   continuous PDF with per-bin adaptive integration, removing the
//!   bin-centre bias when fitting binned data.
//!
//! Evaluation is single-threaded per object tree (`Rc` sharing, no locking);
//! hosts wanting parallelism build one tree per worker thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod normset;
pub mod observable;
pub mod pdf;
pub mod sampling;

pub use context::EvalContext;
pub use normset::NormSet;
pub use observable::{Binning, CachingInhibit, Observable, ValueHold};
pub use pdf::{ContinuousPdf, ExponentialPdf, GaussianPdf, PolynomialPdf};
pub use sampling::BinSamplingPdf;

#[cfg(test)]
mod tests;
