use lupin::ensemble::{fit_ensemble, EnsembleOptions};
use lupin::sim::{genotype_to_prior, simulate, SimOptions};
use lupin::vb::{fit_vb, VbInit, VbOptions};

use ndarray::prelude::*;

type Mat = Array2<f64>;
type Tns = Array3<f64>;

/// Two donors with known genotypes and deep coverage: nearly every
/// droplet should land on its true donor with high confidence.
#[test]
fn known_genotypes_separate_the_donors() {
    let sim = simulate(&SimOptions {
        n_vars: 200,
        n_cells: 40,
        n_donor: 2,
        depth: 5.0,
        seed: 11,
        ..SimOptions::default()
    })
    .unwrap();

    let gt_prior = genotype_to_prior(&sim.genotype, 0.01);
    let init = VbInit {
        gt_prior: Some(&gt_prior),
        ..VbInit::default()
    };
    let opts = VbOptions {
        n_donor: Some(2),
        learn_genotype: false,
        detect_doublet: false,
        ..VbOptions::default()
    };

    let out = fit_vb(&sim.ad, &sim.dp, &init, &opts).unwrap();

    let n_confident_correct = out
        .assign_prob
        .rows()
        .into_iter()
        .zip(sim.donor.iter())
        .filter(|(row, &truth)| row[truth] > 0.99)
        .count();
    assert!(n_confident_correct as f64 >= 0.95 * sim.donor.len() as f64);
}

/// No reads at all: every identity explains the data equally well, so
/// the posterior must stay at the mixing weights instead of drifting
/// or producing NaN.
#[test]
fn empty_droplets_stay_ambiguous() {
    let ad = Mat::zeros((10, 5));
    let dp = Mat::zeros((10, 5));

    let opts = VbOptions {
        n_donor: Some(2),
        detect_doublet: false,
        max_iter: 30,
        ..VbOptions::default()
    };
    let out = fit_vb(&ad, &dp, &VbInit::default(), &opts).unwrap();

    for row in out.assign_prob.rows() {
        for &p in row {
            assert!((p - 0.5).abs() < 1e-6);
        }
    }
}

/// A droplet mixing reads from two opposite homozygous donors is
/// explained far better by the donor pair than by either donor alone.
#[test]
fn mixed_droplet_is_flagged_as_a_doublet() {
    let n_vars = 5;
    // cells 0 and 1 are clean singlets, cell 2 mixes both donors
    let ad = Mat::from_shape_fn((n_vars, 3), |(_, c)| match c {
        0 => 0.0,
        1 => 10.0,
        _ => 5.0,
    });
    let dp = Mat::from_elem((n_vars, 3), 10.0);

    let mut gt_prior = Tns::zeros((n_vars, 3, 2));
    for v in 0..n_vars {
        gt_prior[[v, 0, 0]] = 1.0; // donor 0: ref/ref
        gt_prior[[v, 2, 1]] = 1.0; // donor 1: alt/alt
    }

    let init = VbInit {
        gt_prior: Some(&gt_prior),
        ..VbInit::default()
    };
    let opts = VbOptions {
        n_donor: Some(2),
        learn_genotype: false,
        ..VbOptions::default()
    };

    let out = fit_vb(&ad, &dp, &init, &opts).unwrap();

    assert!(out.assign_prob[[0, 0]] > 0.9);
    assert!(out.assign_prob[[1, 1]] > 0.9);
    assert!(out.doublet_prob.row(2).sum() > 0.9);
    assert!(out.elbo_doublet.is_some());
}

/// The lower bound must improve over the run and end finite.
#[test]
fn lower_bound_improves_over_iterations() {
    let sim = simulate(&SimOptions {
        n_vars: 50,
        n_cells: 30,
        n_donor: 2,
        depth: 2.0,
        seed: 7,
        ..SimOptions::default()
    })
    .unwrap();

    let opts = VbOptions {
        n_donor: Some(2),
        detect_doublet: false,
        ..VbOptions::default()
    };
    let out = fit_vb(&sim.ad, &sim.dp, &VbInit::default(), &opts).unwrap();

    assert!(out.elbo.values.len() > 1);
    assert!(out.elbo.final_value().is_finite());
    assert!(out.elbo.final_value() >= out.elbo.values[0]);
}

/// The restart ensemble is deterministic for a fixed seed, whatever
/// the rayon thread count.
#[test]
fn ensemble_is_reproducible() {
    let sim = simulate(&SimOptions {
        n_vars: 40,
        n_cells: 30,
        n_donor: 2,
        depth: 2.0,
        seed: 3,
        ..SimOptions::default()
    })
    .unwrap();

    let opts = EnsembleOptions {
        n_donor: 2,
        n_init: 4,
        seed: 19,
        vb: VbOptions {
            detect_doublet: false,
            max_iter: 40,
            ..VbOptions::default()
        },
        ..EnsembleOptions::default()
    };

    let a = fit_ensemble(&sim.ad, &sim.dp, &VbInit::default(), &opts).unwrap();
    let b = fit_ensemble(&sim.ad, &sim.dp, &VbInit::default(), &opts).unwrap();

    assert_eq!(a.assign_prob, b.assign_prob);
    assert_eq!(a.elbo.values, b.elbo.values);
}

/// Without any genotype information the ensemble still groups cells
/// of the same donor together, up to a label permutation.
#[test]
fn ensemble_recovers_the_donor_partition() {
    let sim = simulate(&SimOptions {
        n_vars: 200,
        n_cells: 40,
        n_donor: 2,
        depth: 5.0,
        seed: 23,
        ..SimOptions::default()
    })
    .unwrap();

    let opts = EnsembleOptions {
        n_donor: 2,
        n_init: 8,
        seed: 1,
        vb: VbOptions {
            detect_doublet: false,
            ..VbOptions::default()
        },
        ..EnsembleOptions::default()
    };
    let out = fit_ensemble(&sim.ad, &sim.dp, &VbInit::default(), &opts).unwrap();

    let called: Vec<usize> = out
        .assign_prob
        .rows()
        .into_iter()
        .map(|row| if row[0] >= row[1] { 0 } else { 1 })
        .collect();

    let agree = called
        .iter()
        .zip(sim.donor.iter())
        .filter(|(a, b)| a == b)
        .count();
    let agree = agree.max(called.len() - agree) as f64;
    assert!(agree >= 0.95 * called.len() as f64);
}
