//! Binned observables with interior mutability.
//!
//! An [`Observable`] is the shared coordinate a PDF is evaluated against. Its
//! current value is a [`Cell`] so that an integrator can sweep it through many
//! coordinates behind a shared reference; the binning carries a generation
//! counter so that derived caches (bin boundary tables) can detect rebinning
//! without being wired into a dependency graph.

use std::cell::{Cell, Ref, RefCell};

use bf_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// An ordered set of bin edges over a closed interval.
///
/// Edges are strictly increasing and define `n_bins = edges.len() - 1`
/// half-open bins `[edges[i], edges[i+1])`; the last bin additionally owns its
/// upper edge so the full interval is covered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binning {
    edges: Vec<f64>,
}

impl Binning {
    /// Build a binning from explicit edges.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Validation(format!(
                "binning requires at least 2 edges, got {}",
                edges.len()
            )));
        }
        for i in 0..edges.len() {
            let e = edges[i];
            if !e.is_finite() {
                return Err(Error::Validation(format!("bin edge [{i}] must be finite, got {e}")));
            }
            if i > 0 && edges[i - 1] >= e {
                return Err(Error::Validation(format!(
                    "bin edges must be strictly increasing, got edges[{}]={} and edges[{}]={}",
                    i - 1,
                    edges[i - 1],
                    i,
                    e
                )));
            }
        }
        Ok(Self { edges })
    }

    /// Build `n_bins` equal-width bins over `[low, high]`.
    pub fn uniform(n_bins: usize, low: f64, high: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("binning requires at least 1 bin".into()));
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(Error::Validation(format!(
                "binning range must be finite with low < high, got [{low}, {high}]"
            )));
        }
        let width = (high - low) / n_bins as f64;
        let mut edges: Vec<f64> = (0..=n_bins).map(|i| low + i as f64 * width).collect();
        // Pin the endpoints so accumulated rounding cannot shrink the range.
        edges[0] = low;
        edges[n_bins] = high;
        Self::from_edges(edges)
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The full edge array, ascending.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower edge of `bin`. Panics if `bin >= n_bins()`.
    pub fn low(&self, bin: usize) -> f64 {
        assert!(bin < self.n_bins());
        self.edges[bin]
    }

    /// Upper edge of `bin`. Panics if `bin >= n_bins()`.
    pub fn high(&self, bin: usize) -> f64 {
        assert!(bin < self.n_bins());
        self.edges[bin + 1]
    }

    /// Centre of `bin`. Panics if `bin >= n_bins()`.
    pub fn center(&self, bin: usize) -> f64 {
        0.5 * (self.low(bin) + self.high(bin))
    }

    /// Width of `bin`. Panics if `bin >= n_bins()`.
    pub fn width(&self, bin: usize) -> f64 {
        self.high(bin) - self.low(bin)
    }

    /// Index of the bin containing `x`, or `None` outside the binning range.
    ///
    /// Bins are half-open except the last, which owns its upper edge.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if !x.is_finite() {
            return None;
        }
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if x < first || x > last {
            return None;
        }
        if x >= last {
            return Some(self.n_bins() - 1);
        }
        // `k` is the number of edges <= x, so bin index is k-1.
        let k = self.edges.partition_point(|e| *e <= x);
        Some(k - 1)
    }
}

/// A named, binned, real-valued observable.
///
/// The current value and the caching-inhibit flag use interior mutability so
/// evaluation code can drive them through a shared `Rc`. All state is
/// single-threaded by design; the type is deliberately `!Sync`.
#[derive(Debug)]
pub struct Observable {
    name: String,
    value: Cell<f64>,
    value_generation: Cell<u64>,
    binning: RefCell<Binning>,
    binning_generation: Cell<u64>,
    caching_inhibited: Cell<bool>,
}

impl Observable {
    /// Create an observable with an initial value and binning.
    pub fn new(name: impl Into<String>, value: f64, binning: Binning) -> Self {
        Self {
            name: name.into(),
            value: Cell::new(value),
            value_generation: Cell::new(0),
            binning: RefCell::new(binning),
            binning_generation: Cell::new(0),
            caching_inhibited: Cell::new(false),
        }
    }

    /// Observable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Set the current value, advancing the value generation.
    pub fn set_value(&self, x: f64) {
        self.value.set(x);
        self.value_generation.set(self.value_generation.get().wrapping_add(1));
    }

    /// Monotonic counter advanced by every [`Self::set_value`]. Value caches
    /// key on it to detect staleness.
    pub fn value_generation(&self) -> u64 {
        self.value_generation.get()
    }

    /// Borrow the current binning.
    pub fn binning(&self) -> Ref<'_, Binning> {
        self.binning.borrow()
    }

    /// Replace the binning, advancing the binning generation so dependent
    /// boundary caches recompute.
    pub fn set_binning(&self, binning: Binning) {
        *self.binning.borrow_mut() = binning;
        self.binning_generation.set(self.binning_generation.get().wrapping_add(1));
    }

    /// Monotonic counter advanced by every rebinning.
    pub fn binning_generation(&self) -> u64 {
        self.binning_generation.get()
    }

    /// Rebin uniformly into `n_bins` over the current binning range.
    pub fn set_bins(&self, n_bins: usize) -> Result<()> {
        let (low, high) = {
            let binning = self.binning.borrow();
            (binning.low(0), binning.high(binning.n_bins() - 1))
        };
        self.set_binning(Binning::uniform(n_bins, low, high)?);
        Ok(())
    }

    /// Bin index of the current value, or `None` outside the binning range.
    pub fn bin_index(&self) -> Option<usize> {
        self.binning.borrow().bin_index(self.value.get())
    }

    /// Whether downstream value caches must currently be bypassed.
    pub fn caching_inhibited(&self) -> bool {
        self.caching_inhibited.get()
    }

    /// Remember the current value and restore it when the guard drops,
    /// whatever exit path the caller takes.
    #[must_use = "dropping the guard immediately restores the value"]
    pub fn hold_value(&self) -> ValueHold<'_> {
        ValueHold { observable: self, saved: self.value.get() }
    }

    /// Suspend downstream value caching until the guard drops. Nestable: the
    /// guard restores whatever state the flag had before.
    #[must_use = "dropping the guard immediately re-enables caching"]
    pub fn inhibit_caching(&self) -> CachingInhibit<'_> {
        let previous = self.caching_inhibited.replace(true);
        CachingInhibit { observable: self, previous }
    }
}

/// Guard restoring an observable's value on drop. See [`Observable::hold_value`].
#[derive(Debug)]
pub struct ValueHold<'a> {
    observable: &'a Observable,
    saved: f64,
}

impl Drop for ValueHold<'_> {
    fn drop(&mut self) {
        self.observable.set_value(self.saved);
    }
}

/// Guard re-enabling value caching on drop. See [`Observable::inhibit_caching`].
#[derive(Debug)]
pub struct CachingInhibit<'a> {
    observable: &'a Observable,
    previous: bool,
}

impl Drop for CachingInhibit<'_> {
    fn drop(&mut self) {
        self.observable.caching_inhibited.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_binning_edges() {
        let binning = Binning::uniform(5, 0.0, 5.0).unwrap();
        assert_eq!(binning.n_bins(), 5);
        assert_eq!(binning.edges(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(binning.center(2), 2.5);
        assert_eq!(binning.width(2), 1.0);
    }

    #[test]
    fn test_from_edges_rejects_unsorted_and_short() {
        assert!(Binning::from_edges(vec![0.0]).is_err());
        assert!(Binning::from_edges(vec![0.0, 1.0, 1.0]).is_err());
        assert!(Binning::from_edges(vec![0.0, 2.0, 1.0]).is_err());
        assert!(Binning::from_edges(vec![0.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_bin_index_half_open_with_closed_top() {
        let binning = Binning::uniform(5, 0.0, 5.0).unwrap();
        assert_eq!(binning.bin_index(0.0), Some(0));
        assert_eq!(binning.bin_index(1.0), Some(1));
        assert_eq!(binning.bin_index(2.999), Some(2));
        assert_eq!(binning.bin_index(5.0), Some(4));
        assert_eq!(binning.bin_index(-0.001), None);
        assert_eq!(binning.bin_index(5.001), None);
        assert_eq!(binning.bin_index(f64::NAN), None);
    }

    #[test]
    fn test_value_hold_restores_on_drop() {
        let obs = Observable::new("x", 2.7, Binning::uniform(5, 0.0, 5.0).unwrap());
        {
            let _hold = obs.hold_value();
            obs.set_value(0.1);
            obs.set_value(4.9);
        }
        assert_eq!(obs.value(), 2.7);
    }

    #[test]
    fn test_inhibit_caching_nests() {
        let obs = Observable::new("x", 0.0, Binning::uniform(2, 0.0, 1.0).unwrap());
        assert!(!obs.caching_inhibited());
        {
            let _outer = obs.inhibit_caching();
            assert!(obs.caching_inhibited());
            {
                let _inner = obs.inhibit_caching();
                assert!(obs.caching_inhibited());
            }
            assert!(obs.caching_inhibited());
        }
        assert!(!obs.caching_inhibited());
    }

    #[test]
    fn test_set_bins_advances_generation() {
        let obs = Observable::new("x", 0.0, Binning::uniform(10, 0.0, 5.0).unwrap());
        let before = obs.binning_generation();
        obs.set_bins(20).unwrap();
        assert!(obs.binning_generation() > before);
        assert_eq!(obs.binning().n_bins(), 20);
        assert_eq!(obs.binning().edges().len(), 21);
    }
}
