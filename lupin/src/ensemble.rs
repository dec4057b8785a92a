//! Multi-restart ensemble around [`fit_vb`].
//!
//! VB-EM is a local optimizer, so a single run can lock onto a poor
//! mode. The ensemble launches many short, cheap runs with extra
//! identity slots, keeps the one with the best lower bound, collapses
//! it back to the requested number of donors, and refines it with a
//! full-length run.

use crate::common::*;
use crate::vb::{fit_vb, VbInit, VbOptions, VbOutput};

use indicatif::ParallelProgressIterator;
use ndarray::prelude::*;
use rayon::prelude::*;

/// Options for the restart ensemble.
#[derive(Debug, Clone)]
pub struct EnsembleOptions {
    /// Number of donors in the final model
    pub n_donor: usize,
    /// Extra-capacity factor for the short runs; the warm-up runs use
    /// `round(n_donor * amplify)` identity slots. Default: 1.0
    pub amplify: f64,
    /// Number of short warm-up runs. Default: 20
    pub n_init: usize,
    /// Master seed; run `i` uses `seed + i`
    pub seed: u64,
    /// Options for the final full-length run; the warm-up runs borrow
    /// them with doublet detection off and a short iteration budget
    pub vb: VbOptions,
}

impl Default for EnsembleOptions {
    fn default() -> Self {
        EnsembleOptions {
            n_donor: 0,
            amplify: 1.0,
            n_init: 20,
            seed: 42,
            vb: VbOptions::default(),
        }
    }
}

/// Fit the model `n_init` times from random starts and refine the
/// best candidate.
///
/// The warm-up runs are independent and run in parallel; the winner
/// is the run with the highest final lower bound. Its assignment
/// matrix is trimmed to the `n_donor` columns carrying the most total
/// mass and reused as the starting point of the final run, so the
/// final run inherits a consistent labeling. Deterministic for a
/// fixed seed and thread-count-independent.
pub fn fit_ensemble(ad: &Mat, dp: &Mat, init: &VbInit, opts: &EnsembleOptions) -> anyhow::Result<VbOutput> {
    if opts.n_donor < 2 {
        anyhow::bail!("need at least two donors, got {}", opts.n_donor);
    }
    if opts.n_init < 1 {
        anyhow::bail!("need at least one warm-up run");
    }

    let n_run1 = ((opts.n_donor as f64 * opts.amplify).round() as usize).max(opts.n_donor);
    let warmup_opts = VbOptions {
        n_donor: Some(n_run1),
        detect_doublet: false,
        min_iter: 5,
        max_iter: 10,
        ..opts.vb.clone()
    };
    // warm-up runs explore the raw likelihood surface without any
    // donor-specific prior information
    let warmup_init = VbInit {
        gt_prior: None,
        psi: None,
        assign_init: None,
        theta_prior: init.theta_prior,
        theta_init: init.theta_init,
    };

    info!(
        "warming up: {} runs with {} identity slots",
        opts.n_init, n_run1
    );

    let warmups: Vec<VbOutput> = (0..opts.n_init)
        .into_par_iter()
        .progress_count(opts.n_init as u64)
        .map(|i| {
            let run_opts = VbOptions {
                seed: opts.seed.wrapping_add(i as u64),
                ..warmup_opts.clone()
            };
            fit_vb(ad, dp, &warmup_init, &run_opts)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let best = best_run(&warmups);

    info!(
        "best warm-up run: {} (lower bound {:.4})",
        best,
        warmups[best].elbo.final_value()
    );

    // keep the n_donor identity slots that absorbed the most cells
    let assign_warm = &warmups[best].assign_prob;
    let mass = assign_warm.sum_axis(Axis(0));
    let mut order: Vec<usize> = (0..n_run1).collect();
    order.sort_by(|&i, &j| {
        mass[j].partial_cmp(&mass[i]).unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(opts.n_donor);

    let n_cells = ad.ncols();
    let mut assign_init = Mat::zeros((n_cells, opts.n_donor));
    for (d, &col) in order.iter().enumerate() {
        assign_init.column_mut(d).assign(&assign_warm.column(col));
    }
    assign_init.mapv_inplace(|x| x.max(1e-10));

    let final_opts = VbOptions {
        n_donor: Some(opts.n_donor),
        ..opts.vb.clone()
    };
    let final_init = VbInit {
        assign_init: Some(assign_init),
        ..init.clone()
    };

    fit_vb(ad, dp, &final_init, &final_opts)
}

/// Index of the run with the highest final lower bound
fn best_run(runs: &[VbOutput]) -> usize {
    runs.iter()
        .enumerate()
        .max_by(|(_, x), (_, y)| {
            x.elbo
                .final_value()
                .partial_cmp(&y.elbo.final_value())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vb::ElboTrace;

    fn dummy_run(final_lb: f64) -> VbOutput {
        VbOutput {
            assign_prob: Mat::zeros((1, 2)),
            gt_prob: crate::common::Tns::zeros((1, 3, 2)),
            doublet_prob: Mat::zeros((1, 2)),
            theta_shapes: ndarray::Array2::zeros((3, 2)),
            elbo: ElboTrace {
                values: vec![final_lb - 1.0, final_lb],
                decreases: vec![],
                converged: true,
            },
            elbo_doublet: None,
        }
    }

    #[test]
    fn best_run_picks_the_highest_final_lower_bound() {
        let runs = vec![dummy_run(-30.0), dummy_run(-10.0), dummy_run(-20.0)];
        assert_eq!(best_run(&runs), 1);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let ad = Mat::zeros((3, 4));
        let dp = Mat::ones((3, 4));
        let init = VbInit::default();

        let opts = EnsembleOptions {
            n_donor: 1,
            ..EnsembleOptions::default()
        };
        assert!(fit_ensemble(&ad, &dp, &init, &opts).is_err());

        let opts = EnsembleOptions {
            n_donor: 2,
            n_init: 0,
            ..EnsembleOptions::default()
        };
        assert!(fit_ensemble(&ad, &dp, &init, &opts).is_err());
    }
}
