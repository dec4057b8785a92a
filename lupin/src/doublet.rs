//! Doublet augmentation of the identity space.
//!
//! A doublet droplet captures cells from two donors at once, so its
//! allelic signal mixes the two genotypes. The single-donor genotype
//! tensor (3 states) is expanded into a 5-state tensor over every
//! ordered donor pair, the Beta parameters gain two "mixed" rows, and
//! the mixing weights gain one entry per pair. The augmented tensors
//! are derived, disposable copies; the originals are never touched.

use crate::common::*;

use matrix_param::ndarray_beta::BetaParam;
use matrix_param::traits::Inference;
use matrix_util::tensor_util::normalize_axis;
use ndarray::prelude::*;

/// Every ordered pair (i, j) of distinct donors, i first
pub fn ordered_pairs(n_donor: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n_donor * n_donor.saturating_sub(1));
    for i in 0..n_donor {
        for j in 0..n_donor {
            if i != j {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Number of ordered donor pairs
pub fn num_pairs(n_donor: usize) -> usize {
    n_donor * n_donor.saturating_sub(1)
}

/// Expand a (variants x 3 x donors) genotype tensor into
/// (variants x 5 x (donors + pairs)).
///
/// The five combined states are {ref/ref, het, alt/alt, ref-het mix,
/// het-alt mix}; the two donors' independent 3-state distributions
/// map onto them by summing the matching products of the 9 state
/// combinations. Single-donor columns keep their original 3 states
/// with zero mass on the mixed states.
pub fn doublet_gt(gt_prob: &Tns) -> Tns {
    let (n_vars, n_states, n_donor) = gt_prob.dim();
    debug_assert_eq!(n_states, N_GENOTYPE);

    let pairs = ordered_pairs(n_donor);
    let mut out = Tns::zeros((n_vars, N_GENOTYPE_DOUBLET, n_donor + pairs.len()));
    out.slice_mut(s![.., 0..N_GENOTYPE, 0..n_donor])
        .assign(gt_prob);

    for (p, &(i, j)) in pairs.iter().enumerate() {
        let gi = gt_prob.index_axis(Axis(2), i);
        let gj = gt_prob.index_axis(Axis(2), j);
        let (gi0, gi1, gi2) = (gi.column(0), gi.column(1), gi.column(2));
        let (gj0, gj1, gj2) = (gj.column(0), gj.column(1), gj.column(2));

        let c = n_donor + p;
        out.slice_mut(s![.., 0, c]).assign(&(&gi0 * &gj0));
        out.slice_mut(s![.., 1, c])
            .assign(&(&gi0 * &gj2 + &gi1 * &gj1 + &gi2 * &gj0));
        out.slice_mut(s![.., 2, c]).assign(&(&gi2 * &gj2));
        out.slice_mut(s![.., 3, c]).assign(&(&gi0 * &gj1 + &gi1 * &gj0));
        out.slice_mut(s![.., 4, c]).assign(&(&gi1 * &gj2 + &gi2 * &gj1));
    }

    normalize_axis(&out, Axis(1))
}

/// Append Beta parameters for the two mixed genotype states.
///
/// Each mixed row blends the two neighboring single-genotype rows
/// (ref-het and het-alt): the normalized shapes are averaged and
/// rescaled by the geometric mean of the two total pseudo-counts, so
/// the blended row keeps a comparable evidence weight.
pub fn doublet_theta(theta: &BetaParam) -> BetaParam {
    debug_assert_eq!(theta.len(), N_GENOTYPE);

    let mut shapes = Array2::<f64>::zeros((N_GENOTYPE_DOUBLET, 2));
    shapes
        .slice_mut(s![0..N_GENOTYPE, ..])
        .assign(&theta.shapes());

    for ii in 0..2 {
        let (a1, b1) = theta.shape_pair(ii);
        let (a2, b2) = theta.shape_pair(ii + 1);
        let (t1, t2) = (a1 + b1, a2 + b2);
        let scale = (t1 * t2).sqrt();
        shapes[[N_GENOTYPE + ii, 0]] = 0.5 * (a1 / t1 + a2 / t2) * scale;
        shapes[[N_GENOTYPE + ii, 1]] = 0.5 * (b1 / t1 + b2 / t2) * scale;
    }

    BetaParam::from_shapes(shapes.view())
}

/// Mixing weights over singles and pairs.
///
/// Every pair column receives `doublet_prior` (default
/// `1 - K / (K + P)`); the single-donor weights are rescaled by
/// `1 - doublet_prior`. The vector is left unnormalized; consumers
/// normalize where a proper distribution is needed.
pub fn doublet_psi(psi: &Array1<f64>, n_pairs: usize, doublet_prior: Option<f64>) -> Array1<f64> {
    let n_donor = psi.len();
    let prior =
        doublet_prior.unwrap_or(1.0 - n_donor as f64 / (n_donor + n_pairs) as f64);

    let mut out = Array1::from_elem(n_donor + n_pairs, prior);
    let tot = psi.sum();
    for d in 0..n_donor {
        out[d] = psi[d] / tot * (1.0 - prior);
    }
    out
}
