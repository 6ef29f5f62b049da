//! Globally adaptive one-dimensional integration.

use std::collections::BinaryHeap;

use bf_core::{Error, Result};
use tracing::debug;

use crate::rule::GaussLegendreRule;

/// Default order of the low-order estimate rule.
const DEFAULT_RULE_ORDER: usize = 10;

/// One integration segment with its local error estimate.
///
/// `value` is the high-order estimate; `error` is the difference between the
/// high- and low-order estimates, the usual embedded-rule error proxy.
#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.error == other.error
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap on the local error: the worst segment is split first.
        self.error.total_cmp(&other.error)
    }
}

/// Adaptive Gauss-Legendre integrator with a relative-precision target.
///
/// Each segment is evaluated with a low-order and a high-order rule; the
/// difference serves as the local error estimate. The segment with the
/// largest estimate is bisected until the summed error drops below the
/// tolerance. By default there is no cap on the number of segments and no
/// absolute-epsilon target; both can be enabled through the setters.
///
/// When the worst segment can no longer be bisected in `f64` (or the optional
/// segment cap is reached), the current estimate is returned as a best-effort
/// value rather than an error. Integrand failures and non-finite integrand
/// sums abort with [`Error::Computation`].
#[derive(Debug, Clone)]
pub struct AdaptiveIntegrator {
    rel_epsilon: f64,
    abs_epsilon: Option<f64>,
    max_segments: Option<usize>,
    estimate: GaussLegendreRule,
    refine: GaussLegendreRule,
}

impl AdaptiveIntegrator {
    /// Create an integrator targeting the given relative precision, with the
    /// default 10/21-point rule pair.
    pub fn new(rel_epsilon: f64) -> Result<Self> {
        if !(rel_epsilon.is_finite() && rel_epsilon > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "relative precision must be finite and > 0, got {rel_epsilon}"
            )));
        }
        Ok(Self {
            rel_epsilon,
            abs_epsilon: None,
            max_segments: None,
            estimate: GaussLegendreRule::new(DEFAULT_RULE_ORDER)?,
            refine: GaussLegendreRule::new(2 * DEFAULT_RULE_ORDER + 1)?,
        })
    }

    /// Target relative precision.
    pub fn rel_epsilon(&self) -> f64 {
        self.rel_epsilon
    }

    /// Change the target relative precision.
    pub fn set_rel_epsilon(&mut self, rel_epsilon: f64) -> Result<()> {
        if !(rel_epsilon.is_finite() && rel_epsilon > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "relative precision must be finite and > 0, got {rel_epsilon}"
            )));
        }
        self.rel_epsilon = rel_epsilon;
        Ok(())
    }

    /// Enable (`Some`) or disable (`None`) an absolute-epsilon target.
    /// Whichever of the relative and absolute tolerances is looser wins.
    pub fn set_abs_epsilon(&mut self, abs_epsilon: Option<f64>) -> Result<()> {
        if let Some(eps) = abs_epsilon {
            if !(eps.is_finite() && eps > 0.0) {
                return Err(Error::InvalidArgument(format!(
                    "absolute precision must be finite and > 0, got {eps}"
                )));
            }
        }
        self.abs_epsilon = abs_epsilon;
        Ok(())
    }

    /// Cap the number of segments (`None` disables the cap).
    pub fn set_max_segments(&mut self, max_segments: Option<usize>) {
        self.max_segments = max_segments;
    }

    /// Order of the low-order estimate rule.
    pub fn rule_order(&self) -> usize {
        self.estimate.order()
    }

    /// Replace the rule pair: `order` points for the estimate, `2*order + 1`
    /// for the refinement.
    pub fn set_rule_order(&mut self, order: usize) -> Result<()> {
        self.estimate = GaussLegendreRule::new(order)?;
        self.refine = GaussLegendreRule::new(2 * order + 1)?;
        Ok(())
    }

    /// Integrate `f` over `[a, b]`.
    ///
    /// Reversed limits negate the result; coincident limits yield zero.
    pub fn integral<F>(&self, mut f: F, a: f64, b: f64) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        if !(a.is_finite() && b.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "integration limits must be finite, got [{a}, {b}]"
            )));
        }
        if a == b {
            return Ok(0.0);
        }
        if a > b {
            return Ok(-self.integral(f, b, a)?);
        }

        let mut heap = BinaryHeap::new();
        let first = self.eval_segment(&mut f, a, b)?;
        let mut total_value = first.value;
        let mut total_error = first.error;
        heap.push(first);

        loop {
            if total_error <= self.tolerance(total_value) {
                break;
            }
            if let Some(cap) = self.max_segments {
                if heap.len() >= cap {
                    debug!(
                        segments = heap.len(),
                        error = total_error,
                        "segment cap reached, returning best-effort estimate"
                    );
                    break;
                }
            }

            // The heap is never empty inside the loop.
            let Some(worst) = heap.pop() else { break };
            let mid = 0.5 * (worst.a + worst.b);
            if !(worst.a < mid && mid < worst.b) {
                // Bisection has hit machine precision on the worst segment.
                debug!(
                    a = worst.a,
                    b = worst.b,
                    error = total_error,
                    "segment width at machine precision, returning best-effort estimate"
                );
                heap.push(worst);
                break;
            }

            let left = self.eval_segment(&mut f, worst.a, mid)?;
            let right = self.eval_segment(&mut f, mid, worst.b)?;
            total_value += left.value + right.value - worst.value;
            total_error += left.error + right.error - worst.error;
            heap.push(left);
            heap.push(right);
        }

        Ok(total_value)
    }

    fn tolerance(&self, value: f64) -> f64 {
        let rel = self.rel_epsilon * value.abs();
        match self.abs_epsilon {
            Some(abs) => rel.max(abs),
            None => rel,
        }
    }

    fn eval_segment<F>(&self, f: &mut F, a: f64, b: f64) -> Result<Segment>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let coarse = self.estimate.integrate(f, a, b)?;
        let fine = self.refine.integrate(f, a, b)?;
        if !fine.is_finite() {
            return Err(Error::Computation(format!(
                "integrand produced a non-finite value on [{a}, {b}]"
            )));
        }
        Ok(Segment { a, b, value: fine, error: (fine - coarse).abs() })
    }
}
