//! Continuous probability density functions.

use std::rc::Rc;

use bf_core::Result;

use crate::normset::NormSet;
use crate::observable::Observable;

mod exponential;
mod gaussian;
mod polynomial;

pub use exponential::ExponentialPdf;
pub use gaussian::GaussianPdf;
pub use polynomial::PolynomialPdf;

/// A continuous, one-dimensional density evaluated against shared observables.
///
/// Implementations read their coordinate from the bound [`Observable`]'s
/// current value, so an integrator can sweep the observable and re-query the
/// PDF without rebuilding any evaluation context. Evaluation is
/// single-threaded per object tree (`Rc` sharing, no locking); hosts wanting
/// parallelism build one tree per worker.
pub trait ContinuousPdf {
    /// Name of this PDF node.
    fn name(&self) -> &str;

    /// Observables this PDF's value depends on.
    fn observables(&self) -> Vec<Rc<Observable>>;

    /// Density at the observables' current values.
    ///
    /// When `norm` contains the PDF's observable the result is a proper
    /// density on the observable's binning range; otherwise it is the raw
    /// shape.
    fn value(&self, norm: Option<&NormSet>) -> Result<f64>;

    /// Whether this PDF depends on `observable` (by identity, not by name).
    fn depends_on(&self, observable: &Rc<Observable>) -> bool {
        self.observables().iter().any(|o| Rc::ptr_eq(o, observable))
    }
}
