extern crate special;

use crate::traits::*;
use ndarray::prelude::*;
use special::Gamma;

/// A vector of independent Beta posteriors, one per entry.
///
/// x[g] ~ Binomial(n, theta[g])
/// theta[g] ~ Beta(a0[g], b0[g])
///
/// The sufficient statistics are expected success and failure counts;
/// the conjugate posterior for entry g is
/// `Beta(a0[g] + successes[g], b0[g] + failures[g])`.
#[derive(Clone, Debug)]
pub struct BetaParam {
    num_states: usize,
    //////////////////////
    // hyper parameters //
    //////////////////////
    a0: Array1<f64>,
    b0: Array1<f64>,
    ///////////////////////////
    // sufficient statistics //
    ///////////////////////////
    a_stat: Array1<f64>,
    b_stat: Array1<f64>,
    //////////////////////////
    // estimated parameters //
    //////////////////////////
    estimated_mean: Array1<f64>,
    estimated_log_mean: Array1<f64>,
    estimated_log_not_mean: Array1<f64>,
}

impl TwoStatParam for BetaParam {
    type Mat = Array1<f64>;
    type Scalar = f64;

    fn new(hyper_a: Self::Mat, hyper_b: Self::Mat) -> Self {
        debug_assert_eq!(hyper_a.len(), hyper_b.len());
        let num_states = hyper_a.len();
        let mut ret = Self {
            num_states,
            a0: hyper_a.clone(),
            b0: hyper_b.clone(),
            a_stat: hyper_a,
            b_stat: hyper_b,
            estimated_mean: Array1::zeros(num_states),
            estimated_log_mean: Array1::zeros(num_states),
            estimated_log_not_mean: Array1::zeros(num_states),
        };
        ret.calibrate();
        ret
    }

    fn add_stat(&mut self, add_a: &Self::Mat, add_b: &Self::Mat) {
        self.a_stat += add_a;
        self.b_stat += add_b;
    }

    fn update_stat(&mut self, add_a: &Self::Mat, add_b: &Self::Mat) {
        self.reset_stat();
        self.add_stat(add_a, add_b);
    }

    fn reset_stat(&mut self) {
        self.a_stat.assign(&self.a0);
        self.b_stat.assign(&self.b0);
    }
}

impl Inference for BetaParam {
    type Mat = Array1<f64>;
    type Scalar = f64;

    /// E[theta]
    fn posterior_mean(&self) -> &Self::Mat {
        &self.estimated_mean
    }

    /// E[ln theta] = psi(a) - psi(a + b)
    fn posterior_log_mean(&self) -> &Self::Mat {
        &self.estimated_log_mean
    }

    /// E[ln (1 - theta)] = psi(b) - psi(a + b)
    fn posterior_log_not_mean(&self) -> &Self::Mat {
        &self.estimated_log_not_mean
    }

    fn calibrate(&mut self) {
        let tot = &self.a_stat + &self.b_stat;
        self.estimated_mean = &self.a_stat / &tot;
        self.estimated_log_mean = ndarray::Zip::from(&self.a_stat)
            .and(&tot)
            .map_collect(|&a, &ab| a.digamma() - ab.digamma());
        self.estimated_log_not_mean = ndarray::Zip::from(&self.b_stat)
            .and(&tot)
            .map_collect(|&b, &ab| b.digamma() - ab.digamma());
    }

    fn len(&self) -> usize {
        self.num_states
    }
}

impl BetaParam {
    /// Build from explicit posterior shapes, taking the shapes as
    /// both hyper parameters and statistics (no additional evidence)
    pub fn from_shapes(shapes: ArrayView2<f64>) -> Self {
        <Self as TwoStatParam>::new(shapes.column(0).to_owned(), shapes.column(1).to_owned())
    }

    /// Build with distinct hyper parameters and starting statistics,
    /// both given as `len x 2` shape matrices
    pub fn from_prior_and_shapes(prior: ArrayView2<f64>, shapes: ArrayView2<f64>) -> Self {
        let mut ret = <Self as TwoStatParam>::new(prior.column(0).to_owned(), prior.column(1).to_owned());
        ret.a_stat.assign(&shapes.column(0));
        ret.b_stat.assign(&shapes.column(1));
        ret.calibrate();
        ret
    }

    /// Posterior shape pair (a, b) of entry `g`
    pub fn shape_pair(&self, g: usize) -> (f64, f64) {
        (self.a_stat[g], self.b_stat[g])
    }

    /// All posterior shapes as a `len x 2` matrix
    pub fn shapes(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.num_states, 2));
        out.column_mut(0).assign(&self.a_stat);
        out.column_mut(1).assign(&self.b_stat);
        out
    }

    /// Sum of KL(Beta(a, b) || Beta(a0, b0)) over all entries
    pub fn kl_to_prior(&self) -> f64 {
        fn ln_beta_fn(a: f64, b: f64) -> f64 {
            a.ln_gamma().0 + b.ln_gamma().0 - (a + b).ln_gamma().0
        }

        (0..self.num_states)
            .map(|g| {
                let (a, b) = (self.a_stat[g], self.b_stat[g]);
                let (a0, b0) = (self.a0[g], self.b0[g]);
                ln_beta_fn(a0, b0) - ln_beta_fn(a, b)
                    + (a - a0) * a.digamma()
                    + (b - b0) * b.digamma()
                    + (a0 + b0 - a - b) * (a + b).digamma()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn param() -> BetaParam {
        <BetaParam as TwoStatParam>::new(arr1(&[0.1, 50.0, 99.9]), arr1(&[99.9, 50.0, 0.1]))
    }

    #[test]
    fn posterior_mean_matches_shapes() {
        let p = param();
        assert_abs_diff_eq!(p.posterior_mean()[0], 0.1 / 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.posterior_mean()[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p.posterior_mean()[2], 99.9 / 100.0, epsilon = 1e-12);
    }

    #[test]
    fn log_mean_is_negative_and_ordered() {
        let p = param();
        let lm = p.posterior_log_mean();
        assert!(lm[0] < lm[1] && lm[1] < lm[2]);
        assert!(lm.iter().all(|&x| x < 0.0));
    }

    #[test]
    fn update_stat_is_anchored_on_prior() {
        let mut p = param();
        let add_a = arr1(&[1.0, 2.0, 3.0]);
        let add_b = arr1(&[3.0, 2.0, 1.0]);

        p.update_stat(&add_a, &add_b);
        let first = p.shapes();

        // a second identical update must not accumulate
        p.update_stat(&add_a, &add_b);
        let second = p.shapes();

        for (x, y) in first.iter().zip(second.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(first[[0, 0]], 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(first[[0, 1]], 102.9, epsilon = 1e-12);
    }

    #[test]
    fn kl_zero_at_prior_and_positive_after_update() {
        let mut p = param();
        assert_abs_diff_eq!(p.kl_to_prior(), 0.0, epsilon = 1e-9);

        p.update_stat(&arr1(&[10.0, 5.0, 1.0]), &arr1(&[1.0, 5.0, 10.0]));
        p.calibrate();
        assert!(p.kl_to_prior() > 0.0);
    }
}
