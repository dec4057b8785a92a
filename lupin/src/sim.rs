//! Synthetic pooled-droplet data with known ground truth.
//!
//! Draws donor genotypes, assigns each droplet a donor (or a donor
//! pair for doublets), samples per-variant coverage from a Poisson,
//! and alternative read counts from a Binomial with a genotype-driven
//! allelic fraction. Meant for integration tests and demos, so the
//! generator favors clarity over realism.

use crate::common::*;

use ndarray::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Binomial, Distribution, Poisson};

/// Options for one synthetic data set.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub n_vars: usize,
    pub n_cells: usize,
    pub n_donor: usize,
    /// Fraction of droplets carrying two donors
    pub doublet_rate: f64,
    /// Mean coverage per (variant, cell)
    pub depth: f64,
    pub seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        SimOptions {
            n_vars: 100,
            n_cells: 200,
            n_donor: 3,
            doublet_rate: 0.0,
            depth: 2.0,
            seed: 42,
        }
    }
}

/// One synthetic data set with its generating truth.
pub struct SimData {
    /// Alternative read counts (variants x cells)
    pub ad: Mat,
    /// Total read counts (variants x cells)
    pub dp: Mat,
    /// True genotype calls in {0, 1, 2} (variants x donors)
    pub genotype: Array2<u8>,
    /// True donor of each droplet; doublets keep the first donor here
    pub donor: Vec<usize>,
    /// Second donor for doublet droplets, `None` for singlets
    pub second_donor: Vec<Option<usize>>,
}

/// Allelic fraction of each genotype state
const THETA_TRUE: [f64; 3] = [0.01, 0.5, 0.99];

pub fn simulate(opts: &SimOptions) -> anyhow::Result<SimData> {
    if opts.n_donor < 2 {
        anyhow::bail!("need at least two donors, got {}", opts.n_donor);
    }
    if !(0.0..=1.0).contains(&opts.doublet_rate) {
        anyhow::bail!("doublet rate {} is not a probability", opts.doublet_rate);
    }

    let mut rng = SmallRng::seed_from_u64(opts.seed);
    let coverage = Poisson::new(opts.depth)?;

    let genotype =
        Array2::from_shape_fn((opts.n_vars, opts.n_donor), |_| rng.random_range(0..3u8));

    let mut donor = Vec::with_capacity(opts.n_cells);
    let mut second_donor = Vec::with_capacity(opts.n_cells);
    for _ in 0..opts.n_cells {
        let d1 = rng.random_range(0..opts.n_donor);
        donor.push(d1);
        if rng.random::<f64>() < opts.doublet_rate {
            let mut d2 = rng.random_range(0..opts.n_donor);
            while d2 == d1 {
                d2 = rng.random_range(0..opts.n_donor);
            }
            second_donor.push(Some(d2));
        } else {
            second_donor.push(None);
        }
    }

    let mut ad = Mat::zeros((opts.n_vars, opts.n_cells));
    let mut dp = Mat::zeros((opts.n_vars, opts.n_cells));
    for c in 0..opts.n_cells {
        for v in 0..opts.n_vars {
            let nn = coverage.sample(&mut rng).round() as u64;
            if nn == 0 {
                continue;
            }
            // a doublet droplet averages its two donors' fractions
            let theta = match second_donor[c] {
                Some(d2) => {
                    let t1 = THETA_TRUE[genotype[[v, donor[c]]] as usize];
                    let t2 = THETA_TRUE[genotype[[v, d2]] as usize];
                    0.5 * (t1 + t2)
                }
                None => THETA_TRUE[genotype[[v, donor[c]]] as usize],
            };
            let alt = Binomial::new(nn, theta)?.sample(&mut rng);
            dp[[v, c]] = nn as f64;
            ad[[v, c]] = alt as f64;
        }
    }

    Ok(SimData {
        ad,
        dp,
        genotype,
        donor,
        second_donor,
    })
}

/// Deterministic one-hot genotype prior from the true calls, lightly
/// smoothed so no state carries exactly zero mass
pub fn genotype_to_prior(genotype: &Array2<u8>, smooth: f64) -> Tns {
    let (n_vars, n_donor) = genotype.dim();
    let mut prior = Tns::from_elem((n_vars, N_GENOTYPE, n_donor), smooth);
    for v in 0..n_vars {
        for d in 0..n_donor {
            prior[[v, genotype[[v, d]] as usize, d]] = 1.0;
        }
    }
    matrix_util::tensor_util::normalize_axis(&prior, Axis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_and_count_bounds_hold() {
        let opts = SimOptions {
            n_vars: 20,
            n_cells: 30,
            n_donor: 2,
            depth: 3.0,
            ..SimOptions::default()
        };
        let sim = simulate(&opts).unwrap();

        assert_eq!(sim.ad.dim(), (20, 30));
        assert_eq!(sim.dp.dim(), (20, 30));
        assert_eq!(sim.genotype.dim(), (20, 2));
        assert_eq!(sim.donor.len(), 30);
        for (a, d) in sim.ad.iter().zip(sim.dp.iter()) {
            assert!(*a >= 0.0 && a <= d);
        }
        assert!(sim.donor.iter().all(|&d| d < 2));
    }

    #[test]
    fn same_seed_reproduces_the_data() {
        let opts = SimOptions::default();
        let s1 = simulate(&opts).unwrap();
        let s2 = simulate(&opts).unwrap();
        assert_eq!(s1.ad, s2.ad);
        assert_eq!(s1.dp, s2.dp);
        assert_eq!(s1.donor, s2.donor);
    }

    #[test]
    fn doublet_rate_zero_gives_no_doublets() {
        let sim = simulate(&SimOptions::default()).unwrap();
        assert!(sim.second_donor.iter().all(|d| d.is_none()));
    }

    #[test]
    fn genotype_prior_peaks_at_true_state() {
        let genotype = ndarray::arr2(&[[0u8, 2], [1, 1]]);
        let prior = genotype_to_prior(&genotype, 0.01);
        assert!(prior[[0, 0, 0]] > 0.9);
        assert!(prior[[0, 2, 1]] > 0.9);
        assert!(prior[[1, 1, 0]] > 0.9);
        for v in 0..2 {
            for d in 0..2 {
                let tot: f64 = (0..3).map(|g| prior[[v, g, d]]).sum();
                approx::assert_abs_diff_eq!(tot, 1.0, epsilon = 1e-9);
            }
        }
    }
}
