use std::cell::RefCell;
use std::rc::Rc;

use bf_core::{Error, Result};
use statrs::function::erf::erf;

use crate::normset::NormSet;
use crate::observable::Observable;
use crate::pdf::ContinuousPdf;

/// `sqrt(2π)`.
const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Cached value keyed by the observable generations it was computed under.
///
/// Generations only ever advance, so a stale entry can never be mistaken for
/// a fresh one.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value_generation: u64,
    binning_generation: u64,
    normalized: bool,
    value: f64,
}

/// Gaussian shape `exp(-0.5 ((x-μ)/σ)²)`, truncated-normalized on the
/// observable's binning range when a norm set asks for it.
///
/// Carries a last-value cache keyed on the observable's generation counters;
/// the cache is bypassed entirely while the observable has caching inhibited
/// (an integrator sweeping the coordinate would only thrash it).
#[derive(Debug)]
pub struct GaussianPdf {
    name: String,
    observable: Rc<Observable>,
    mean: f64,
    sigma: f64,
    cache: RefCell<Option<CacheEntry>>,
}

impl GaussianPdf {
    /// Create a Gaussian over `observable` with the given mean and width.
    pub fn new(
        name: impl Into<String>,
        observable: Rc<Observable>,
        mean: f64,
        sigma: f64,
    ) -> Result<Self> {
        if !mean.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::Validation(format!(
                "GaussianPdf parameters must be finite with sigma > 0, got mean={mean}, sigma={sigma}"
            )));
        }
        Ok(Self { name: name.into(), observable, mean, sigma, cache: RefCell::new(None) })
    }
}

impl ContinuousPdf for GaussianPdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn observables(&self) -> Vec<Rc<Observable>> {
        vec![Rc::clone(&self.observable)]
    }

    fn value(&self, norm: Option<&NormSet>) -> Result<f64> {
        let obs = &self.observable;
        let normalized = norm.is_some_and(|n| n.contains(obs));

        if !obs.caching_inhibited() {
            if let Some(entry) = *self.cache.borrow() {
                if entry.value_generation == obs.value_generation()
                    && entry.binning_generation == obs.binning_generation()
                    && entry.normalized == normalized
                {
                    return Ok(entry.value);
                }
            }
        }

        let x = obs.value();
        let z = (x - self.mean) / self.sigma;
        let shape = (-0.5 * z * z).exp();

        let value = if normalized {
            let (a, b) = {
                let binning = obs.binning();
                (binning.low(0), binning.high(binning.n_bins() - 1))
            };
            let za = (a - self.mean) / (self.sigma * std::f64::consts::SQRT_2);
            let zb = (b - self.mean) / (self.sigma * std::f64::consts::SQRT_2);
            // Truncation mass Φ(z_b) - Φ(z_a).
            let mass = 0.5 * (erf(zb) - erf(za));
            if !(mass.is_finite() && mass > 0.0) {
                return Err(Error::Computation(format!(
                    "GaussianPdf '{}' has vanishing mass on [{a}, {b}]",
                    self.name
                )));
            }
            shape / (self.sigma * SQRT_2PI * mass)
        } else {
            shape
        };

        if !obs.caching_inhibited() {
            *self.cache.borrow_mut() = Some(CacheEntry {
                value_generation: obs.value_generation(),
                binning_generation: obs.binning_generation(),
                normalized,
                value,
            });
        }

        Ok(value)
    }
}
