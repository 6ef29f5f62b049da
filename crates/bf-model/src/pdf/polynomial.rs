use std::rc::Rc;

use bf_core::{Error, Result};

use crate::normset::NormSet;
use crate::observable::Observable;
use crate::pdf::ContinuousPdf;

/// Polynomial shape `Σ c_k x^k` with analytic normalization on the
/// observable's binning range.
///
/// Coefficients are in ascending powers. The shape is not checked for
/// positivity; that is the model builder's responsibility.
#[derive(Debug)]
pub struct PolynomialPdf {
    name: String,
    observable: Rc<Observable>,
    coefficients: Vec<f64>,
}

impl PolynomialPdf {
    /// Create a polynomial over `observable` with ascending-power coefficients.
    pub fn new(
        name: impl Into<String>,
        observable: Rc<Observable>,
        coefficients: Vec<f64>,
    ) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::Validation(
                "PolynomialPdf requires at least one coefficient".into(),
            ));
        }
        for (k, c) in coefficients.iter().enumerate() {
            if !c.is_finite() {
                return Err(Error::Validation(format!(
                    "PolynomialPdf coefficient [{k}] must be finite, got {c}"
                )));
            }
        }
        Ok(Self { name: name.into(), observable, coefficients })
    }

    fn shape(&self, x: f64) -> f64 {
        // Horner evaluation, highest power first.
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

impl ContinuousPdf for PolynomialPdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn observables(&self) -> Vec<Rc<Observable>> {
        vec![Rc::clone(&self.observable)]
    }

    fn value(&self, norm: Option<&NormSet>) -> Result<f64> {
        let obs = &self.observable;
        let shape = self.shape(obs.value());
        if !norm.is_some_and(|n| n.contains(obs)) {
            return Ok(shape);
        }

        let (a, b) = {
            let binning = obs.binning();
            (binning.low(0), binning.high(binning.n_bins() - 1))
        };
        let mut mass = 0.0f64;
        for (k, &c) in self.coefficients.iter().enumerate() {
            let p = (k + 1) as i32;
            mass += c * (b.powi(p) - a.powi(p)) / f64::from(p);
        }
        if !(mass.is_finite() && mass > 0.0) {
            return Err(Error::Computation(format!(
                "PolynomialPdf '{}' has non-positive mass {mass} on [{a}, {b}]",
                self.name
            )));
        }
        Ok(shape / mass)
    }
}
