//! Bin-integration adapter for continuous PDFs fit to binned data.
//!
//! Evaluating a continuous PDF at a bin centre is only a faithful proxy for
//! the bin's probability mass when the PDF has no curvature across the bin.
//! [`BinSamplingPdf`] wraps a continuous PDF and its binned observable and
//! replaces point evaluation with the bin-averaged density
//! `∫_bin p(x) dx / width`, computed with an adaptive quadrature engine at a
//! configurable relative precision. Expect roughly 20x the function
//! evaluations of a point sample per bin; the payoff is an unbiased binned
//! likelihood for strongly curved shapes.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use bf_core::{Error, Result};
use bf_quad::AdaptiveIntegrator;
use tracing::error;

use crate::context::EvalContext;
use crate::normset::NormSet;
use crate::observable::Observable;
use crate::pdf::ContinuousPdf;

/// Default relative precision handed to the integrator.
const DEFAULT_REL_EPSILON: f64 = 1e-4;

/// Cached copy of the observable's bin boundary table.
///
/// Rebuilt from scratch (never patched) whenever the observable's binning
/// generation has advanced past `generation`, or after an explicit
/// [`BinSamplingPdf::mark_shape_dirty`].
#[derive(Debug, Default)]
struct BoundaryCache {
    edges: Vec<f64>,
    generation: u64,
    valid: bool,
}

/// Adapter evaluating a wrapped continuous PDF as bin-averaged densities.
///
/// Scalar evaluation averages the PDF over the bin containing the
/// observable's current value; batch evaluation maps every sample coordinate
/// to its bin through a cached boundary table and averages over that bin. In
/// both paths the observable is swept by the integrator through many
/// coordinates and restored afterwards on every exit path, and downstream
/// value caching is suspended for the duration (stale cached values would
/// corrupt neighbouring evaluations).
///
/// One adapter instance must not run two integrations concurrently: the
/// wrapped observable's value is shared mutable state. The type is `!Sync` by
/// construction (`Rc` + cells); multi-threaded hosts use one instance per
/// worker.
pub struct BinSamplingPdf {
    name: String,
    title: String,
    observable: Rc<Observable>,
    pdf: Rc<dyn ContinuousPdf>,
    rel_epsilon: f64,
    boundaries: RefCell<BoundaryCache>,
    integrator: RefCell<Option<AdaptiveIntegrator>>,
}

impl BinSamplingPdf {
    /// Wrap `pdf` so its bins over `observable` are sampled by integration.
    ///
    /// `epsilon` is the relative precision for the integrator (default
    /// `1e-4`). Fails if the PDF does not depend on the observable, or if the
    /// precision is not finite and positive.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        observable: Rc<Observable>,
        pdf: Rc<dyn ContinuousPdf>,
        epsilon: Option<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if !pdf.depends_on(&observable) {
            return Err(Error::InvalidArgument(format!(
                "BinSamplingPdf '{name}': the PDF '{}' needs to depend on the observable '{}'",
                pdf.name(),
                observable.name()
            )));
        }
        let rel_epsilon = epsilon.unwrap_or(DEFAULT_REL_EPSILON);
        if !(rel_epsilon.is_finite() && rel_epsilon > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "BinSamplingPdf '{name}': relative precision must be finite and > 0, got {rel_epsilon}"
            )));
        }
        Ok(Self {
            name,
            title: title.into(),
            observable,
            pdf,
            rel_epsilon,
            boundaries: RefCell::new(BoundaryCache::default()),
            integrator: RefCell::new(None),
        })
    }

    /// Duplicate the adapter under a new name.
    ///
    /// Re-binds the same observable and PDF and copies the precision; the
    /// boundary cache and the integrator start empty and are rebuilt lazily.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: self.title.clone(),
            observable: Rc::clone(&self.observable),
            pdf: Rc::clone(&self.pdf),
            rel_epsilon: self.rel_epsilon,
            boundaries: RefCell::new(BoundaryCache::default()),
            integrator: RefCell::new(None),
        }
    }

    /// Adapter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adapter title (for display).
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The bound observable.
    pub fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }

    /// Relative precision handed to the integrator.
    pub fn rel_epsilon(&self) -> f64 {
        self.rel_epsilon
    }

    /// Bin-averaged density for the bin containing the observable's current
    /// value.
    ///
    /// The bin edges are read directly from the observable's binning; this
    /// path does not need the full boundary cache. The observable's value is
    /// restored before returning, also when integration fails.
    pub fn evaluate(&self, norm: Option<&NormSet>) -> Result<f64> {
        let x = self.observable.value();
        let (low, high) = {
            let binning = self.observable.binning();
            let bin = binning.bin_index(x).ok_or_else(|| {
                Error::Validation(format!(
                    "BinSamplingPdf '{}': observable value {x} is outside the binning range",
                    self.name
                ))
            })?;
            (binning.low(bin), binning.high(bin))
        };

        // The integrator sweeps x through the dependency tree; caching of
        // sub-tree values needs to be off while that happens.
        let _hold = self.observable.hold_value();
        let _quiet = self.observable.inhibit_caching();

        let integral = self.integrate(norm, low, high)?;
        Ok(integral / (high - low))
    }

    /// Bin-averaged densities for a batch of sample coordinates.
    ///
    /// Reads the observable's input batch from `ctx`, resolves each
    /// coordinate's bin by binary search over the cached boundary table,
    /// integrates that bin and stores the result at the same index. The
    /// output batch (stored in `ctx` under this adapter's name) has the same
    /// length and ordering as the input. Coordinates outside the boundary
    /// span are rejected with a validation error. A bin hit by several
    /// samples is integrated once per sample; no per-call memoization.
    pub fn evaluate_batch<'a>(
        &self,
        ctx: &'a mut EvalContext,
        norm: Option<&NormSet>,
    ) -> Result<&'a [f64]> {
        let edges: Vec<f64> = self.bin_boundaries().to_vec();
        let first = edges[0];
        let last = edges[edges.len() - 1];

        let xs: Vec<f64> = ctx
            .values(self.observable.name())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "BinSamplingPdf '{}': no input batch for observable '{}'",
                    self.name,
                    self.observable.name()
                ))
            })?
            .to_vec();

        let mut results = vec![0.0f64; xs.len()];
        {
            let _hold = self.observable.hold_value();
            let _quiet = self.observable.inhibit_caching();

            for (slot, &x) in results.iter_mut().zip(&xs) {
                if !(x >= first && x < last) {
                    return Err(Error::Validation(format!(
                        "BinSamplingPdf '{}': sample coordinate {x} is outside [{first}, {last})",
                        self.name
                    )));
                }
                let bin = edges.partition_point(|e| *e <= x) - 1;
                let (low, high) = (edges[bin], edges[bin + 1]);
                *slot = self.integrate(norm, low, high)? / (high - low);
            }
        }

        Ok(ctx.store_output(&self.name, results))
    }

    /// Immutable view over the cached bin boundary table.
    ///
    /// Recomputed from the observable's binning whenever the binning
    /// generation has advanced or the cache was invalidated.
    pub fn bin_boundaries(&self) -> Ref<'_, [f64]> {
        self.ensure_boundaries();
        Ref::map(self.boundaries.borrow(), |cache| cache.edges.as_slice())
    }

    /// Drop the cached boundary table; the next access recomputes it.
    pub fn mark_shape_dirty(&self) {
        let mut cache = self.boundaries.borrow_mut();
        cache.edges.clear();
        cache.valid = false;
    }

    /// All cached boundary values within `[xlo, xhi)`, for rendering the
    /// stepped shape correctly.
    ///
    /// `observable` must be this adapter's bound observable (checked by
    /// identity); on mismatch an error is logged and `None` returned.
    pub fn boundaries_in_range(
        &self,
        observable: &Rc<Observable>,
        xlo: f64,
        xhi: f64,
    ) -> Option<Vec<f64>> {
        if !Rc::ptr_eq(observable, &self.observable) {
            error!(
                pdf = %self.name,
                requested = %observable.name(),
                bound = %self.observable.name(),
                "observable is not the observable of this PDF"
            );
            return None;
        }
        Some(self.bin_boundaries().iter().copied().filter(|v| xlo <= *v && *v < xhi).collect())
    }

    /// All bin centres within `[xlo, xhi)`, recomputed fresh from the
    /// observable's binning, as sampling hints for plotting.
    ///
    /// Same identity check as [`Self::boundaries_in_range`].
    pub fn sampling_hint_in_range(
        &self,
        observable: &Rc<Observable>,
        xlo: f64,
        xhi: f64,
    ) -> Option<Vec<f64>> {
        if !Rc::ptr_eq(observable, &self.observable) {
            error!(
                pdf = %self.name,
                requested = %observable.name(),
                bound = %self.observable.name(),
                "observable is not the observable of this PDF"
            );
            return None;
        }
        let binning = self.observable.binning();
        Some(
            (0..binning.n_bins())
                .map(|bin| binning.center(bin))
                .filter(|c| xlo <= *c && *c < xhi)
                .collect(),
        )
    }

    /// Mutable handle to the integrator that samples the bins, for changing
    /// rule order, tolerances or the subdivision cap.
    ///
    /// Constructed lazily on first use with the adapter's relative precision,
    /// no absolute-epsilon target and no subdivision cap. Reconfiguration is
    /// not persisted anywhere; a duplicate made with [`Self::renamed`] starts
    /// from the defaults again.
    pub fn integrator_mut(&self) -> Result<RefMut<'_, AdaptiveIntegrator>> {
        let mut slot = self.integrator.borrow_mut();
        if slot.is_none() {
            *slot = Some(AdaptiveIntegrator::new(self.rel_epsilon)?);
        }
        Ok(RefMut::map(slot, |s| match s {
            Some(integrator) => integrator,
            None => unreachable!("integrator initialized above"),
        }))
    }

    /// Integrate the wrapped PDF over `[low, high]` under `norm`.
    ///
    /// The closure handed to the integrator is the one-argument binding the
    /// whole adapter revolves around: set the observable, query the PDF. The
    /// norm set lives only as this call's borrow; it is never stored on the
    /// adapter.
    fn integrate(&self, norm: Option<&NormSet>, low: f64, high: f64) -> Result<f64> {
        let integrator = self.integrator_mut()?;
        let observable = &self.observable;
        let pdf = &self.pdf;
        integrator.integral(
            |x| {
                observable.set_value(x);
                pdf.value(norm)
            },
            low,
            high,
        )
    }

    fn ensure_boundaries(&self) {
        let mut cache = self.boundaries.borrow_mut();
        let generation = self.observable.binning_generation();
        if cache.valid && cache.generation == generation && !cache.edges.is_empty() {
            return;
        }
        cache.edges.clear();
        cache.edges.extend_from_slice(self.observable.binning().edges());
        debug_assert!(cache.edges.windows(2).all(|w| w[0] < w[1]));
        cache.generation = generation;
        cache.valid = true;
    }
}

impl std::fmt::Debug for BinSamplingPdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinSamplingPdf")
            .field("name", &self.name)
            .field("observable", &self.observable.name())
            .field("pdf", &self.pdf.name())
            .field("rel_epsilon", &self.rel_epsilon)
            .finish()
    }
}
