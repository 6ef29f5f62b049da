use std::rc::Rc;

use approx::assert_relative_eq;
use bf_core::{Error, Result};
use statrs::function::erf::erf;

use crate::context::EvalContext;
use crate::normset::NormSet;
use crate::observable::{Binning, Observable};
use crate::pdf::{ContinuousPdf, GaussianPdf, PolynomialPdf};
use crate::sampling::BinSamplingPdf;

fn observable_5_bins() -> Rc<Observable> {
    Rc::new(Observable::new("x", 2.5, Binning::uniform(5, 0.0, 5.0).unwrap()))
}

fn adapter(pdf: Rc<dyn ContinuousPdf>, obs: &Rc<Observable>) -> BinSamplingPdf {
    BinSamplingPdf::new("binned", "bin-averaged pdf", Rc::clone(obs), pdf, None).unwrap()
}

/// PDF that always fails, for exercising restoration on error paths.
struct FailingPdf {
    observable: Rc<Observable>,
}

impl ContinuousPdf for FailingPdf {
    fn name(&self) -> &str {
        "failing"
    }

    fn observables(&self) -> Vec<Rc<Observable>> {
        vec![Rc::clone(&self.observable)]
    }

    fn value(&self, _norm: Option<&NormSet>) -> Result<f64> {
        Err(Error::Computation("always fails".into()))
    }
}

#[test]
fn test_construction_requires_dependency_on_observable() {
    let obs_a = observable_5_bins();
    let obs_b = observable_5_bins();
    let pdf: Rc<dyn ContinuousPdf> =
        Rc::new(GaussianPdf::new("g", Rc::clone(&obs_a), 2.5, 0.8).unwrap());

    let err = BinSamplingPdf::new("binned", "t", obs_b, Rc::clone(&pdf), None).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    assert!(BinSamplingPdf::new("binned", "t", obs_a, pdf, None).is_ok());
}

#[test]
fn test_construction_rejects_bad_precision() {
    let obs = observable_5_bins();
    let pdf: Rc<dyn ContinuousPdf> =
        Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    for eps in [0.0, -1e-4, f64::NAN] {
        let err =
            BinSamplingPdf::new("binned", "t", Rc::clone(&obs), Rc::clone(&pdf), Some(eps))
                .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}

#[test]
fn test_uniform_density_bin_average_equals_point_value() {
    // Zero curvature: averaging over the bin changes nothing.
    let obs = observable_5_bins();
    let pdf = Rc::new(PolynomialPdf::new("flat", Rc::clone(&obs), vec![1.0]).unwrap());
    let sampler = adapter(pdf.clone(), &obs);
    let norm = NormSet::single("x");

    obs.set_value(2.3);
    let averaged = sampler.evaluate(Some(&norm)).unwrap();
    let point = pdf.value(Some(&norm)).unwrap();
    assert_relative_eq!(averaged, point, epsilon = 1e-12);
    assert_relative_eq!(averaged, 0.2, epsilon = 1e-12);
}

#[test]
fn test_linear_shape_bin_average_matches_center_value() {
    // f(x) = x over [2, 3): ∫ x dx / 1 = 2.5 = f(2.5).
    let obs = observable_5_bins();
    let pdf = Rc::new(PolynomialPdf::new("line", Rc::clone(&obs), vec![0.0, 1.0]).unwrap());
    let sampler = adapter(pdf, &obs);

    obs.set_value(2.5);
    assert_relative_eq!(sampler.evaluate(None).unwrap(), 2.5, epsilon = 1e-9);
}

#[test]
fn test_quadratic_shape_diverges_from_center_value() {
    // f(x) = x² over [2, 3): bin average (3³-2³)/3 = 19/3 ≈ 6.333, while the
    // centre value is 2.5² = 6.25.
    let obs = observable_5_bins();
    let pdf = Rc::new(PolynomialPdf::new("quad", Rc::clone(&obs), vec![0.0, 0.0, 1.0]).unwrap());
    let sampler = adapter(pdf.clone(), &obs);

    obs.set_value(2.5);
    let averaged = sampler.evaluate(None).unwrap();
    assert_relative_eq!(averaged, 19.0 / 3.0, epsilon = 1e-9);

    let point = pdf.value(None).unwrap();
    assert_relative_eq!(point, 6.25, epsilon = 1e-12);
    assert!((averaged - point).abs() > 0.05);
}

#[test]
fn test_gaussian_bin_average_matches_closed_form() {
    let (mean, sigma) = (2.5f64, 0.8f64);
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), mean, sigma).unwrap());
    let sampler = adapter(pdf, &obs);
    let norm = NormSet::single("x");

    // Truncated-normal mass of bin [2, 3) over the mass of [0, 5].
    let phi = |x: f64| 0.5 * erf((x - mean) / (sigma * std::f64::consts::SQRT_2));
    let expected = (phi(3.0) - phi(2.0)) / (phi(5.0) - phi(0.0));

    obs.set_value(2.5);
    assert_relative_eq!(sampler.evaluate(Some(&norm)).unwrap(), expected, max_relative = 1e-7);
}

#[test]
fn test_evaluate_restores_observable_value() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    obs.set_value(2.7);
    sampler.evaluate(None).unwrap();
    assert_eq!(obs.value(), 2.7);
    assert!(!obs.caching_inhibited());
}

#[test]
fn test_evaluate_restores_observable_value_on_error() {
    let obs = observable_5_bins();
    let pdf = Rc::new(FailingPdf { observable: Rc::clone(&obs) });
    let sampler = adapter(pdf, &obs);

    obs.set_value(2.7);
    let err = sampler.evaluate(None).unwrap_err();
    assert!(matches!(err, Error::Computation(_)));
    assert_eq!(obs.value(), 2.7);
    assert!(!obs.caching_inhibited());
}

#[test]
fn test_batch_matches_scalar_at_bin_centers() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);
    let norm = NormSet::single("x");

    let centers: Vec<f64> = (0..5).map(|b| obs.binning().center(b)).collect();
    let mut ctx = EvalContext::new();
    ctx.set_values("x", centers.clone());

    let batch = sampler.evaluate_batch(&mut ctx, Some(&norm)).unwrap().to_vec();
    assert_eq!(batch.len(), centers.len());

    for (i, &c) in centers.iter().enumerate() {
        obs.set_value(c);
        let scalar = sampler.evaluate(Some(&norm)).unwrap();
        assert_relative_eq!(batch[i], scalar, epsilon = 1e-12);
    }
}

#[test]
fn test_batch_preserves_length_and_order() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);
    let norm = NormSet::single("x");

    // Out of bin order, with two samples sharing bin [2, 3).
    let xs = vec![4.2, 0.3, 2.9, 2.1];
    let mut ctx = EvalContext::new();
    ctx.set_values("x", xs.clone());

    let batch = sampler.evaluate_batch(&mut ctx, Some(&norm)).unwrap().to_vec();
    assert_eq!(batch.len(), xs.len());

    // Same bin means the same averaged density, wherever it sits in the batch.
    assert_relative_eq!(batch[2], batch[3], epsilon = 1e-12);

    for (i, &x) in xs.iter().enumerate() {
        obs.set_value(x);
        assert_relative_eq!(batch[i], sampler.evaluate(Some(&norm)).unwrap(), epsilon = 1e-12);
    }
}

#[test]
fn test_batch_rejects_out_of_range_coordinates() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    // 5.0 sits on the last boundary; the batch span is half-open.
    for bad in [-0.1, 5.0, 7.3] {
        let mut ctx = EvalContext::new();
        ctx.set_values("x", vec![1.0, bad]);
        let err = sampler.evaluate_batch(&mut ctx, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}

#[test]
fn test_batch_requires_input_values() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    let mut ctx = EvalContext::new();
    let err = sampler.evaluate_batch(&mut ctx, None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_bin_boundaries_sorted_and_follow_rebinning() {
    let obs = Rc::new(Observable::new("x", 0.5, Binning::uniform(10, 0.0, 5.0).unwrap()));
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    {
        let edges = sampler.bin_boundaries();
        assert_eq!(edges.len(), 11);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    // Rebinning advances the binning generation; the cache must rebuild.
    obs.set_bins(20).unwrap();
    {
        let edges = sampler.bin_boundaries();
        assert_eq!(edges.len(), 21);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    // An explicit shape-dirty signal forces a recompute as well.
    sampler.mark_shape_dirty();
    assert_eq!(sampler.bin_boundaries().len(), 21);
}

#[test]
fn test_boundaries_in_range_identity_mismatch_returns_none() {
    let obs = observable_5_bins();
    // Same name, different object: the check is by identity, not by value.
    let imposter = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    assert!(sampler.boundaries_in_range(&imposter, 0.0, 5.0).is_none());
    assert!(sampler.sampling_hint_in_range(&imposter, 0.0, 5.0).is_none());

    let edges = sampler.boundaries_in_range(&obs, 1.5, 3.5).unwrap();
    assert_eq!(edges, vec![2.0, 3.0]);

    let centers = sampler.sampling_hint_in_range(&obs, 1.5, 3.5).unwrap();
    assert_eq!(centers, vec![1.5, 2.5]);
}

#[test]
fn test_renamed_copy_shares_objects_and_precision() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler =
        BinSamplingPdf::new("binned", "t", Rc::clone(&obs), pdf, Some(1e-6)).unwrap();

    // Warm the original's caches, then duplicate.
    let _ = sampler.evaluate(None).unwrap();
    let copy = sampler.renamed("binned_copy");

    assert_eq!(copy.name(), "binned_copy");
    assert_eq!(copy.rel_epsilon(), 1e-6);
    assert!(Rc::ptr_eq(copy.observable(), &obs));

    obs.set_value(1.3);
    assert_relative_eq!(
        copy.evaluate(None).unwrap(),
        sampler.evaluate(None).unwrap(),
        epsilon = 1e-12
    );
}

#[test]
fn test_integrator_reconfiguration_still_converges() {
    let obs = observable_5_bins();
    let pdf = Rc::new(PolynomialPdf::new("quad", Rc::clone(&obs), vec![0.0, 0.0, 1.0]).unwrap());
    let sampler = adapter(pdf, &obs);

    sampler.integrator_mut().unwrap().set_rule_order(5).unwrap();
    obs.set_value(2.5);
    assert_relative_eq!(sampler.evaluate(None).unwrap(), 19.0 / 3.0, max_relative = 1e-8);
}

#[test]
fn test_evaluate_rejects_value_outside_binning() {
    let obs = observable_5_bins();
    let pdf = Rc::new(GaussianPdf::new("g", Rc::clone(&obs), 2.5, 0.8).unwrap());
    let sampler = adapter(pdf, &obs);

    obs.set_value(6.0);
    let err = sampler.evaluate(None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(obs.value(), 6.0);
}
