//! # bf-quad
//!
//! One-dimensional numerical quadrature for BinFit.
//!
//! This crate provides:
//! - [`GaussLegendreRule`]: fixed-order Gauss-Legendre rules with nodes and
//!   weights computed at construction time (Newton iteration on the Legendre
//!   recurrence).
//! - [`AdaptiveIntegrator`]: a globally adaptive integrator that bisects the
//!   segment with the largest local error estimate until a relative-precision
//!   target is met.
//!
//! The integrand contract is a single-argument fallible callable
//! `FnMut(f64) -> Result<f64>`. Integrand errors and non-finite values abort
//! the integration; non-convergence with no further subdivision possible
//! returns the best-effort estimate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptive;
pub mod rule;

pub use adaptive::AdaptiveIntegrator;
pub use rule::GaussLegendreRule;
