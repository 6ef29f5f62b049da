use std::rc::Rc;

use bf_core::{Error, Result};

use crate::normset::NormSet;
use crate::observable::Observable;
use crate::pdf::ContinuousPdf;

/// Exponential shape `exp(λx)`, normalized on the observable's binning range
/// when a norm set asks for it. `λ = 0` degenerates to a uniform density.
#[derive(Debug)]
pub struct ExponentialPdf {
    name: String,
    observable: Rc<Observable>,
    lambda: f64,
}

impl ExponentialPdf {
    /// Create an exponential over `observable` with slope `lambda`.
    pub fn new(name: impl Into<String>, observable: Rc<Observable>, lambda: f64) -> Result<Self> {
        if !lambda.is_finite() {
            return Err(Error::Validation(format!(
                "ExponentialPdf lambda must be finite, got {lambda}"
            )));
        }
        Ok(Self { name: name.into(), observable, lambda })
    }
}

impl ContinuousPdf for ExponentialPdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn observables(&self) -> Vec<Rc<Observable>> {
        vec![Rc::clone(&self.observable)]
    }

    fn value(&self, norm: Option<&NormSet>) -> Result<f64> {
        let obs = &self.observable;
        let shape = (self.lambda * obs.value()).exp();
        if !norm.is_some_and(|n| n.contains(obs)) {
            return Ok(shape);
        }

        let (a, b) = {
            let binning = obs.binning();
            (binning.low(0), binning.high(binning.n_bins() - 1))
        };
        let mass = if self.lambda.abs() < 1e-12 {
            b - a
        } else {
            ((self.lambda * b).exp() - (self.lambda * a).exp()) / self.lambda
        };
        if !(mass.is_finite() && mass > 0.0) {
            return Err(Error::Computation(format!(
                "ExponentialPdf '{}' has vanishing mass on [{a}, {b}]",
                self.name
            )));
        }
        Ok(shape / mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Binning;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_slope_is_uniform() {
        let obs = Rc::new(Observable::new("x", 1.2, Binning::uniform(4, 0.0, 2.0).unwrap()));
        let pdf = ExponentialPdf::new("e", Rc::clone(&obs), 0.0).unwrap();
        let norm = NormSet::single("x");
        assert_relative_eq!(pdf.value(Some(&norm)).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_matches_closed_form() {
        let obs = Rc::new(Observable::new("x", 1.0, Binning::uniform(10, 0.0, 10.0).unwrap()));
        let lambda = -0.25f64;
        let pdf = ExponentialPdf::new("e", Rc::clone(&obs), lambda).unwrap();
        let norm = NormSet::single("x");
        let mass = ((lambda * 10.0f64).exp() - 1.0) / lambda;
        assert_relative_eq!(
            pdf.value(Some(&norm)).unwrap(),
            (lambda * 1.0).exp() / mass,
            epsilon = 1e-12
        );
    }
}
