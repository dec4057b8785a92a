//! Variational update engines for the donor-identity mixture model.
//!
//! The model couples three factors:
//! - `assign_prob` (cells x identities): categorical donor identity
//! - `gt_prob` (variants x states x donors): categorical genotype
//! - `theta` (one Beta posterior per genotype state): allelic fraction
//!
//! Each engine is a pure function of its inputs so a full iteration
//! replaces the state wholesale; convergence is tracked through the
//! evidence lower bound.

use crate::common::*;

use matrix_param::ndarray_beta::BetaParam;
use matrix_param::traits::Inference;
use matrix_util::tensor_util::{exp_normalize_axis, kl_divergence};
use ndarray::prelude::*;

/// Expected Beta-Binomial log-likelihood and posterior of donor
/// identity for every cell.
///
/// For genotype state g with Beta shapes (a_g, b_g), the expected
/// log-likelihood of `AD` successes out of `DP` trials integrates the
/// Binomial over the allelic fraction:
/// `AD * E[ln theta_g] + (DP - AD) * E[ln (1 - theta_g)]`,
/// then over genotype uncertainty `gt_prob[v, g, d]` and over
/// variants (conditionally independent given the identity).
///
/// * `ad`, `dp` - count matrices (variants x cells)
/// * `gt_prob` - genotype posterior (variants x states x identities)
/// * `theta` - one Beta posterior per genotype state
/// * `psi` - mixing weights over identities
///
/// Returns the row-normalized posterior (cells x identities) and the
/// expected log-likelihood matrix of the same shape (without `psi`).
pub fn assignment_step(
    ad: &Mat,
    dp: &Mat,
    gt_prob: &Tns,
    theta: &BetaParam,
    psi: &Array1<f64>,
) -> (Mat, Mat) {
    let (_, n_states, n_ids) = gt_prob.dim();
    let n_cells = ad.ncols();
    debug_assert_eq!(theta.len(), n_states);
    debug_assert_eq!(psi.len(), n_ids);

    let bd = dp - ad;
    let ln_theta = theta.posterior_log_mean();
    let ln_not_theta = theta.posterior_log_not_mean();

    let mut loglik = Mat::zeros((n_cells, n_ids));
    for g in 0..n_states {
        let gt_g = gt_prob.index_axis(Axis(1), g);
        let s1 = ad.t().dot(&gt_g);
        let s2 = bd.t().dot(&gt_g);
        loglik += &(&s1 * ln_theta[g]);
        loglik += &(&s2 * ln_not_theta[g]);
    }

    let psi_tot = psi.sum();
    let ln_psi = psi.mapv(|x| (x / psi_tot).max(f64::MIN_POSITIVE).ln());

    let logits = &loglik + &ln_psi;
    let assign_prob = exp_normalize_axis(&logits, Axis(1));
    (assign_prob, loglik)
}

/// Posterior over genotype states for every (variant, donor).
///
/// Evidence is aggregated across cells weighted by their current
/// assignment probability, combined with the prior in log space, and
/// normalized over the state axis.
///
/// * `assign_prob` - cells x donors
/// * `gt_prior` - variants x states x donors, normalized over states
///
/// Returns the genotype posterior and the state log-likelihood tensor.
pub fn genotype_step(
    ad: &Mat,
    dp: &Mat,
    assign_prob: &Mat,
    theta: &BetaParam,
    gt_prior: &Tns,
) -> (Tns, Tns) {
    let (n_vars, n_states, n_donors) = gt_prior.dim();
    debug_assert_eq!(assign_prob.ncols(), n_donors);

    let ln_theta = theta.posterior_log_mean();
    let ln_not_theta = theta.posterior_log_not_mean();

    let s1 = ad.dot(assign_prob);
    let ss = dp.dot(assign_prob);
    let s2 = &ss - &s1;

    let mut loglik_gt = Tns::zeros((n_vars, n_states, n_donors));
    for g in 0..n_states {
        let mut slab = loglik_gt.index_axis_mut(Axis(1), g);
        slab.assign(&s1);
        slab *= ln_theta[g];
        slab.scaled_add(ln_not_theta[g], &s2);
    }

    let logits = &loglik_gt + &gt_prior.mapv(|p| p.max(f64::MIN_POSITIVE).ln());
    let gt_prob = exp_normalize_axis(&logits, Axis(1));
    (gt_prob, loglik_gt)
}

/// Conjugate update of the per-state Beta shapes.
///
/// Expected success and failure counts are summed over every
/// (variant, cell) pair with joint responsibility
/// `assign_prob[c, d] * gt_prob[v, g, d]`, then added to the prior
/// shapes. Pure function: identical inputs give identical shapes.
pub fn theta_step(
    ad: &Mat,
    dp: &Mat,
    assign_prob: &Mat,
    gt_prob: &Tns,
    theta_prior: &BetaParam,
) -> BetaParam {
    use matrix_param::traits::TwoStatParam;

    let n_states = gt_prob.dim().1;
    debug_assert_eq!(theta_prior.len(), n_states);

    let s1 = ad.dot(assign_prob);
    let ss = dp.dot(assign_prob);
    let s2 = &ss - &s1;

    let mut succ = Array1::<f64>::zeros(n_states);
    let mut fail = Array1::<f64>::zeros(n_states);
    for g in 0..n_states {
        let gt_g = gt_prob.index_axis(Axis(1), g);
        succ[g] = (&s1 * &gt_g).sum();
        fail[g] = (&s2 * &gt_g).sum();
    }

    let mut theta = theta_prior.clone();
    theta.update_stat(&succ, &fail);
    theta.calibrate();
    theta
}

/// Evidence lower bound of the current variational state.
///
/// Expected data log-likelihood under the assignment posterior minus
/// the KL divergence of each factor from its prior. Under correct
/// coordinate-ascent updates this is non-decreasing across
/// iterations; a decrease flags a numerical problem.
///
/// * `loglik` - by-product of [`assignment_step`] (cells x identities)
/// * `assign_prob` - full assignment posterior, same shape as `loglik`
/// * `psi` - mixing weights over the same identities (normalized here)
pub fn lower_bound(
    loglik: &Mat,
    assign_prob: &Mat,
    gt_prob: &Tns,
    gt_prior: &Tns,
    theta: &BetaParam,
    psi: &Array1<f64>,
) -> f64 {
    debug_assert_eq!(loglik.dim(), assign_prob.dim());

    let expected_loglik = (loglik * assign_prob).sum();

    let psi_tot = psi.sum();
    let psi_norm = psi.mapv(|x| x / psi_tot);
    let kl_assign: f64 = assign_prob
        .rows()
        .into_iter()
        .map(|row| kl_divergence(&row, &psi_norm))
        .sum();

    let kl_gt = kl_divergence(gt_prob, gt_prior);

    expected_loglik - kl_assign - kl_gt - theta.kl_to_prior()
}

/// Default Beta prior over the allelic fraction of each genotype
/// state: sharply low for ref/ref, centered for het, sharply high for
/// alt/alt
pub fn default_theta_prior() -> Array2<f64> {
    arr2(&[[0.1, 99.9], [50.0, 50.0], [99.9, 0.1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use matrix_util::tensor_util::normalize_axis;

    fn toy_state() -> (Mat, Mat, Tns, BetaParam, Array1<f64>) {
        // two variants, two cells, two donors with opposite homozygous
        // genotypes; cell 0 carries only reference reads, cell 1 only
        // alternative reads
        let ad = arr2(&[[0.0, 10.0], [0.0, 10.0]]);
        let dp = arr2(&[[10.0, 10.0], [10.0, 10.0]]);

        let mut gt = Tns::zeros((2, 3, 2));
        for v in 0..2 {
            gt[[v, 0, 0]] = 1.0; // donor 0: ref/ref
            gt[[v, 2, 1]] = 1.0; // donor 1: alt/alt
        }

        let theta = BetaParam::from_shapes(default_theta_prior().view());
        let psi = Array1::from_elem(2, 0.5);
        (ad, dp, gt, theta, psi)
    }

    #[test]
    fn assignment_separates_opposite_cells() {
        let (ad, dp, gt, theta, psi) = toy_state();
        let (assign, loglik) = assignment_step(&ad, &dp, &gt, &theta, &psi);

        assert_eq!(assign.dim(), (2, 2));
        for row in assign.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        assert!(assign[[0, 0]] > 0.99);
        assert!(assign[[1, 1]] > 0.99);

        // the reference-only cell likes the ref/ref donor better
        assert!(loglik[[0, 0]] > loglik[[0, 1]]);
    }

    #[test]
    fn genotype_rows_sum_to_one() {
        let (ad, dp, _, theta, _) = toy_state();
        let assign = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let gt_prior = normalize_axis(&Tns::ones((2, 3, 2)), Axis(1));

        let (gt, _) = genotype_step(&ad, &dp, &assign, &theta, &gt_prior);
        for v in 0..2 {
            for d in 0..2 {
                let tot: f64 = (0..3).map(|g| gt[[v, g, d]]).sum();
                assert_abs_diff_eq!(tot, 1.0, epsilon = 1e-9);
            }
            // evidence pushes donor 0 to ref/ref and donor 1 to alt/alt
            assert!(gt[[v, 0, 0]] > 0.9);
            assert!(gt[[v, 2, 1]] > 0.9);
        }
    }

    #[test]
    fn theta_step_is_deterministic() {
        let (ad, dp, gt, _, _) = toy_state();
        let assign = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let prior = BetaParam::from_shapes(default_theta_prior().view());

        let t1 = theta_step(&ad, &dp, &assign, &gt, &prior);
        let t2 = theta_step(&ad, &dp, &assign, &gt, &prior);
        for (x, y) in t1.shapes().iter().zip(t2.shapes().iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }

        // 20 reference reads land on state 0, 20 alternative on state 2
        let shapes = t1.shapes();
        assert_abs_diff_eq!(shapes[[0, 1]], 99.9 + 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(shapes[[2, 0]], 99.9 + 20.0, epsilon = 1e-9);
    }

    #[test]
    fn lower_bound_is_finite_and_penalized_by_kl() {
        let (ad, dp, gt, theta, psi) = toy_state();
        let gt_prior = normalize_axis(&Tns::ones((2, 3, 2)), Axis(1));
        let (assign, loglik) = assignment_step(&ad, &dp, &gt, &theta, &psi);

        let lb = lower_bound(&loglik, &assign, &gt, &gt_prior, &theta, &psi);
        assert!(lb.is_finite());

        // a confident posterior against a uniform prior pays KL
        let lb_self_prior = lower_bound(&loglik, &assign, &gt, &gt, &theta, &psi);
        assert!(lb_self_prior >= lb);
    }
}
