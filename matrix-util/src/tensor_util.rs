//! Axis-wise operations on probability tensors.
//!
//! These helpers treat one axis of an `ndarray` as a categorical
//! distribution: normalization, numerically-stable exponentiation of
//! log-scale values, and KL divergence between matched tensors.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension};

/// Divide every 1-D lane along `axis` by its sum so that it sums to
/// one. A lane whose sum is not positive carries no information and
/// falls back to the uniform distribution instead of propagating NaN.
pub fn normalize_axis<S, D>(xx: &ArrayBase<S, D>, axis: Axis) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut out = xx.to_owned();
    normalize_axis_inplace(&mut out, axis);
    out
}

/// In-place version of [`normalize_axis`]
pub fn normalize_axis_inplace<D>(xx: &mut Array<f64, D>, axis: Axis)
where
    D: Dimension,
{
    for mut lane in xx.lanes_mut(axis) {
        let tot: f64 = lane.sum();
        if tot > 0.0 {
            lane.mapv_inplace(|x| x / tot);
        } else {
            let nn = lane.len() as f64;
            lane.fill(1.0 / nn);
        }
    }
}

/// Subtract the maximum of each 1-D lane along `axis`, so that
/// exponentiating afterwards cannot overflow. Lanes with no finite
/// entries are left untouched.
pub fn amplify_loglik_axis<S, D>(loglik: &ArrayBase<S, D>, axis: Axis) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut out = loglik.to_owned();
    for mut lane in out.lanes_mut(axis) {
        let mx = lane.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if mx.is_finite() {
            lane.mapv_inplace(|x| x - mx);
        }
    }
    out
}

/// Turn log-scale scores into normalized probabilities along `axis`
/// via max-subtraction, exponentiation, and lane normalization
pub fn exp_normalize_axis<S, D>(loglik: &ArrayBase<S, D>, axis: Axis) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut out = amplify_loglik_axis(loglik, axis);
    out.mapv_inplace(f64::exp);
    normalize_axis_inplace(&mut out, axis);
    out
}

/// Total KL divergence `sum_i p_i ln(p_i / q_i)` over all matched
/// entries of two tensors of identical shape. Zero-probability entries
/// of `p` contribute nothing; `q` is clamped away from zero.
pub fn kl_divergence<S1, S2, D>(pp: &ArrayBase<S1, D>, qq: &ArrayBase<S2, D>) -> f64
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    debug_assert_eq!(pp.shape(), qq.shape());
    ndarray::Zip::from(pp)
        .and(qq)
        .fold(0.0, |acc, &p, &q| {
            if p > 0.0 {
                acc + p * (p.ln() - q.max(f64::MIN_POSITIVE).ln())
            } else {
                acc
            }
        })
}
