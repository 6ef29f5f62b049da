//! Fixed-order Gauss-Legendre quadrature rules.

use bf_core::{Error, Result};

/// Largest rule order we are willing to construct.
///
/// Newton iteration on the Legendre recurrence is well conditioned far beyond
/// this, but orders above a few hundred signal a misconfigured caller.
const MAX_ORDER: usize = 256;

/// An `n`-point Gauss-Legendre rule on the reference interval `[-1, 1]`.
///
/// Exact for polynomials up to degree `2n - 1`. Nodes and weights are computed
/// once at construction by Newton iteration on the Legendre three-term
/// recurrence, with the classic `cos(π(i + 3/4)/(n + 1/2))` starting guesses.
#[derive(Debug, Clone)]
pub struct GaussLegendreRule {
    order: usize,
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendreRule {
    /// Construct an `order`-point rule.
    pub fn new(order: usize) -> Result<Self> {
        if order < 2 || order > MAX_ORDER {
            return Err(Error::InvalidArgument(format!(
                "Gauss-Legendre order must be in [2, {MAX_ORDER}], got {order}"
            )));
        }

        let n = order;
        let mut nodes = vec![0.0f64; n];
        let mut weights = vec![0.0f64; n];

        // Roots are symmetric about zero; solve for the positive half.
        for i in 0..n.div_ceil(2) {
            let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut dp = 0.0;

            for _ in 0..100 {
                let (p, d) = legendre_with_derivative(n, x);
                dp = d;
                let step = p / d;
                x -= step;
                if step.abs() <= 1e-15 {
                    break;
                }
            }

            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            // i counts roots from the largest downwards; store ascending.
            nodes[i] = -x;
            weights[i] = w;
            nodes[n - 1 - i] = x;
            weights[n - 1 - i] = w;
        }

        Ok(Self { order, nodes, weights })
    }

    /// Number of quadrature points.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Quadrature nodes in ascending order on `[-1, 1]`.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Quadrature weights matching [`Self::nodes`]. They sum to 2.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Apply the rule to `f` on `[a, b]`.
    ///
    /// The first integrand error is propagated unchanged.
    pub fn integrate<F>(&self, f: &mut F, a: f64, b: f64) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let mid = 0.5 * (a + b);
        let half = 0.5 * (b - a);

        let mut acc = 0.0f64;
        for (&x, &w) in self.nodes.iter().zip(&self.weights) {
            acc += w * f(mid + half * x)?;
        }
        Ok(acc * half)
    }
}

/// Evaluate the Legendre polynomial `P_n(x)` and its derivative.
///
/// Three-term recurrence for the value; the derivative uses
/// `P'_n(x) = n (x P_n(x) - P_{n-1}(x)) / (x² - 1)`, which is safe here since
/// all interior roots satisfy `|x| < 1`.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0f64;
    let mut p = x;
    for k in 2..=n {
        let kf = k as f64;
        let p_next = ((2.0 * kf - 1.0) * x * p - (kf - 1.0) * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    let d = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, d)
}
