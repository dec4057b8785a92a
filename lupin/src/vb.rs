//! VB-EM driver for one demultiplexing run.
//!
//! `Init -> Iterate -> (Converged | MaxIterReached) -> [DoubletPass]
//! -> Done`. Every iteration replaces the full variational state
//! (assignment, genotype, theta) and appends one lower-bound value;
//! the optional final pass rescans the cells against the
//! doublet-augmented identity space.

use crate::common::*;
use crate::doublet::{doublet_gt, doublet_psi, doublet_theta, num_pairs};
use crate::model::*;

use matrix_param::ndarray_beta::BetaParam;
use matrix_util::tensor_util::{normalize_axis, normalize_axis_inplace};
use matrix_util::traits::SampleOps;
use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Options for one VB-EM run.
#[derive(Debug, Clone)]
pub struct VbOptions {
    /// Number of donors; resolved from the genotype prior when absent
    pub n_donor: Option<usize>,
    /// Update the genotype posterior (forced on without a full prior)
    pub learn_genotype: bool,
    /// Update the Beta shape parameters
    pub learn_theta: bool,
    /// Run the final doublet-augmented pass
    pub detect_doublet: bool,
    /// Prior probability of a doublet identity (default 1 - K/(K+P))
    pub doublet_prior: Option<f64>,
    /// Iterations before convergence checks begin. Default: 20
    pub min_iter: usize,
    /// Iteration budget. Default: 200
    pub max_iter: usize,
    /// Stop when the lower bound improves by less than this. Default: 1e-2
    pub tol: f64,
    /// Seed for the random assignment initialization. Default: 42
    pub seed: u64,
}

impl Default for VbOptions {
    fn default() -> Self {
        VbOptions {
            n_donor: None,
            learn_genotype: true,
            learn_theta: true,
            detect_doublet: true,
            doublet_prior: None,
            min_iter: 20,
            max_iter: 200,
            tol: 1e-2,
            seed: 42,
        }
    }
}

/// Optional starting points and priors shared across runs.
#[derive(Default, Clone)]
pub struct VbInit<'a> {
    /// Genotype prior (variants x 3 x donors); uniform when absent
    pub gt_prior: Option<&'a Tns>,
    /// Mixing weights over donors; uniform when absent
    pub psi: Option<&'a Array1<f64>>,
    /// Starting assignment probabilities (cells x donors); random when
    /// absent
    pub assign_init: Option<Mat>,
    /// Beta prior shapes (3 x 2); see `default_theta_prior`
    pub theta_prior: Option<&'a Array2<f64>>,
    /// Starting Beta shapes when they should differ from the prior
    pub theta_init: Option<&'a Array2<f64>>,
}

/// Lower-bound trajectory with convergence anomalies attached.
#[derive(Debug, Clone, Default)]
pub struct ElboTrace {
    /// One value per completed iteration
    pub values: Vec<f64>,
    /// Iterations where the bound decreased (numerical anomaly)
    pub decreases: Vec<usize>,
    /// Whether the tolerance was met within the iteration budget
    pub converged: bool,
}

impl ElboTrace {
    pub fn final_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(f64::NEG_INFINITY)
    }
}

/// Terminal output of one VB-EM run; immutable once returned.
#[derive(Debug, Clone)]
pub struct VbOutput {
    /// Posterior of singlet donor identity (cells x donors)
    pub assign_prob: Mat,
    /// Genotype posterior (variants x 3 x donors)
    pub gt_prob: Tns,
    /// Posterior of each ordered donor pair (cells x K(K-1)); zero
    /// when doublet detection is off
    pub doublet_prob: Mat,
    /// Final Beta shapes (3 x 2)
    pub theta_shapes: Array2<f64>,
    /// Lower-bound trajectory of the singlet iterations
    pub elbo: ElboTrace,
    /// Lower bound of the doublet-augmented pass, when run
    pub elbo_doublet: Option<f64>,
}

/// Fit the mixture model once from a single initialization.
pub fn fit_vb(ad: &Mat, dp: &Mat, init: &VbInit, opts: &VbOptions) -> anyhow::Result<VbOutput> {
    let (n_vars, n_cells) = ad.dim();
    if dp.dim() != ad.dim() {
        anyhow::bail!(
            "count matrices disagree: AD is {:?}, DP is {:?}",
            ad.dim(),
            dp.dim()
        );
    }

    // resolve the donor count before shaping any state
    let prior_k = init.gt_prior.map(|g| g.dim().2);
    let mut n_donor = match (opts.n_donor, prior_k) {
        (Some(k), _) => k,
        (None, Some(k)) => k,
        (None, None) => anyhow::bail!(
            "cannot resolve the number of donors: pass n_donor or a genotype prior"
        ),
    };
    if let Some(pk) = prior_k {
        if pk > n_donor {
            warn!(
                "genotype prior covers {} donors; ignoring the requested {}",
                pk, n_donor
            );
            n_donor = pk;
        }
    }
    if n_donor < 2 {
        anyhow::bail!("need at least two donors, got {}", n_donor);
    }

    // theta prior and starting shapes
    let theta_prior_shapes = match init.theta_prior {
        Some(shapes) => shapes.clone(),
        None => default_theta_prior(),
    };
    if theta_prior_shapes.dim() != (N_GENOTYPE, 2) {
        anyhow::bail!(
            "theta prior must be {} x 2, got {:?}",
            N_GENOTYPE,
            theta_prior_shapes.dim()
        );
    }
    let theta_prior = BetaParam::from_shapes(theta_prior_shapes.view());
    let mut theta = match init.theta_init {
        Some(shapes) => {
            BetaParam::from_prior_and_shapes(theta_prior_shapes.view(), shapes.view())
        }
        None => theta_prior.clone(),
    };

    // mixing weights
    let psi = match init.psi {
        Some(p) => {
            if p.len() < n_donor {
                anyhow::bail!("psi covers {} of {} donors", p.len(), n_donor);
            }
            let head = p.slice(s![0..n_donor]).to_owned();
            let tot = head.sum();
            head.mapv(|x| x / tot)
        }
        None => Array1::from_elem(n_donor, 1.0 / n_donor as f64),
    };

    // assignment initialization
    let mut assign_prob = match &init.assign_init {
        Some(a) => {
            if a.dim() != (n_cells, n_donor) {
                anyhow::bail!(
                    "assignment init is {:?}, expected ({}, {})",
                    a.dim(),
                    n_cells,
                    n_donor
                );
            }
            normalize_axis(a, Axis(1))
        }
        None => {
            let mut rng = SmallRng::seed_from_u64(opts.seed);
            let mut a = Mat::runif_rng(n_cells, n_donor, &mut rng);
            normalize_axis_inplace(&mut a, Axis(1));
            a
        }
    };

    // genotype prior and starting posterior
    let mut learn_genotype = opts.learn_genotype;
    let uniform_gt =
        |k: usize| normalize_axis(&Tns::ones((n_vars, N_GENOTYPE, k)), Axis(1));
    let (gt_prior, mut gt_prob) = match init.gt_prior {
        None => {
            if !learn_genotype {
                warn!("no genotype prior given; genotype learning forced on");
                learn_genotype = true;
            }
            let prior = uniform_gt(n_donor);
            let (gt0, _) = genotype_step(ad, dp, &assign_prob, &theta, &prior);
            (prior, gt0)
        }
        Some(p) => {
            if p.dim().0 != n_vars || p.dim().1 != N_GENOTYPE {
                anyhow::bail!(
                    "genotype prior is {:?}, expected ({}, {}, donors)",
                    p.dim(),
                    n_vars,
                    N_GENOTYPE
                );
            }
            let pk = p.dim().2;
            if pk < n_donor {
                warn!(
                    "genotype prior covers {} of {} donors; padding with uniform entries",
                    pk, n_donor
                );
                if !learn_genotype {
                    warn!("incomplete genotype prior; genotype learning forced on");
                    learn_genotype = true;
                }
                let mut prior = uniform_gt(n_donor);
                prior.slice_mut(s![.., .., 0..pk]).assign(p);
                let gt0 = prior.clone();
                (prior, gt0)
            } else {
                (p.clone(), p.clone())
            }
        }
    };

    // fixed-point iterations over the singlet identity space
    let mut elbo = ElboTrace::default();
    for it in 0..opts.max_iter {
        let state = vb_update(
            ad,
            dp,
            &gt_prob,
            &theta,
            &theta_prior,
            &gt_prior,
            &psi,
            opts.doublet_prior,
            learn_genotype,
            opts.learn_theta,
            false,
        );
        assign_prob = state.assign_prob;
        gt_prob = state.gt_prob;
        theta = state.theta;
        elbo.values.push(state.lower_bound);

        if it > opts.min_iter {
            let prev = elbo.values[it - 1];
            let curr = elbo.values[it];
            if curr < prev {
                warn!(
                    "lower bound decreased at iteration {}: {:.6} -> {:.6}",
                    it, prev, curr
                );
                elbo.decreases.push(it);
            } else if curr - prev < opts.tol {
                elbo.converged = true;
                break;
            }
        }
    }
    if !elbo.converged {
        warn!(
            "lower bound did not converge within {} iterations (tol = {:e})",
            opts.max_iter, opts.tol
        );
    }

    // one extra pass over singles + ordered pairs
    let n_pair = num_pairs(n_donor);
    if opts.detect_doublet {
        let state = vb_update(
            ad,
            dp,
            &gt_prob,
            &theta,
            &theta_prior,
            &gt_prior,
            &psi,
            opts.doublet_prior,
            true,
            true,
            true,
        );
        let assign = state.assign_prob.slice(s![.., 0..n_donor]).to_owned();
        let doublet_prob = state.assign_prob.slice(s![.., n_donor..]).to_owned();
        Ok(VbOutput {
            assign_prob: assign,
            gt_prob: state.gt_prob,
            doublet_prob,
            theta_shapes: state.theta.shapes(),
            elbo,
            elbo_doublet: Some(state.lower_bound),
        })
    } else {
        Ok(VbOutput {
            assign_prob,
            gt_prob,
            doublet_prob: Mat::zeros((n_cells, n_pair)),
            theta_shapes: theta.shapes(),
            elbo,
            elbo_doublet: None,
        })
    }
}

struct VbState {
    assign_prob: Mat,
    gt_prob: Tns,
    theta: BetaParam,
    lower_bound: f64,
}

/// One coordinate-ascent sweep: assignment, then (optionally) the
/// genotype and theta updates, then the lower bound. With
/// `check_doublet` the assignment runs against the pair-augmented
/// space; the genotype and theta updates always stay in the singlet
/// space, weighted by the singlet block of the assignment.
#[allow(clippy::too_many_arguments)]
fn vb_update(
    ad: &Mat,
    dp: &Mat,
    gt_prob: &Tns,
    theta: &BetaParam,
    theta_prior: &BetaParam,
    gt_prior: &Tns,
    psi: &Array1<f64>,
    doublet_prior: Option<f64>,
    learn_genotype: bool,
    learn_theta: bool,
    check_doublet: bool,
) -> VbState {
    let n_donor = gt_prob.dim().2;

    let (assign_full, loglik, psi_used) = if check_doublet {
        let gt_both = doublet_gt(gt_prob);
        let theta_both = doublet_theta(theta);
        let psi_both = doublet_psi(psi, gt_both.dim().2 - n_donor, doublet_prior);
        let (assign, loglik) = assignment_step(ad, dp, &gt_both, &theta_both, &psi_both);
        (assign, loglik, psi_both)
    } else {
        let (assign, loglik) = assignment_step(ad, dp, gt_prob, theta, psi);
        (assign, loglik, psi.clone())
    };

    let assign_single = assign_full.slice(s![.., 0..n_donor]).to_owned();

    let gt_new = if learn_genotype {
        genotype_step(ad, dp, &assign_single, theta, gt_prior).0
    } else {
        gt_prob.clone()
    };

    let theta_new = if learn_theta {
        theta_step(ad, dp, &assign_single, &gt_new, theta_prior)
    } else {
        theta.clone()
    };

    let lb = lower_bound(&loglik, &assign_full, &gt_new, gt_prior, &theta_new, &psi_used);

    VbState {
        assign_prob: assign_full,
        gt_prob: gt_new,
        theta: theta_new,
        lower_bound: lb,
    }
}
