//! `demux` subcommand: load counts, fit the ensemble, write results.

use crate::common::*;
use crate::ensemble::{fit_ensemble, EnsembleOptions};
use crate::input::*;
use crate::vb::{VbInit, VbOptions, VbOutput};

use matrix_util::common_io::write_types;
use matrix_util::traits::IoOps;
use ndarray::prelude::*;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct DemuxArgs {
    /// alternative-allele count matrix (variants x cells), `.mtx[.gz]`
    /// or TSV
    #[arg(long, short = 'a', required = true)]
    ad_file: Box<str>,

    /// total read count matrix (variants x cells), same format and
    /// shape as the AD file
    #[arg(long, short = 'd', required = true)]
    dp_file: Box<str>,

    /// donor genotype file (TSV, no header): one column per donor
    /// (`GT`) or three columns per donor (`GP`)
    #[arg(long, short = 'g')]
    geno_file: Option<Box<str>>,

    /// genotype layout in the genotype file
    #[arg(long, default_value = "GT")]
    geno_tag: Box<str>,

    /// residual probability spread over the other states when
    /// expanding hard genotype calls
    #[arg(long, default_value_t = 0.05)]
    geno_call_error: f64,

    /// number of donors in the pool; required without a genotype file
    #[arg(long, short = 'k')]
    n_donor: Option<usize>,

    /// number of random warm-up restarts
    #[arg(long, default_value_t = 20)]
    n_init: usize,

    /// extra-capacity factor for the warm-up runs
    #[arg(long, default_value_t = 1.0)]
    amplify: f64,

    /// skip the doublet-augmented pass
    #[arg(long, default_value_t = false)]
    no_doublet: bool,

    /// prior probability of a doublet identity
    #[arg(long)]
    doublet_prior: Option<f64>,

    /// iterations before convergence checks begin
    #[arg(long, default_value_t = 20)]
    min_iter: usize,

    /// iteration budget per run
    #[arg(long, default_value_t = 200)]
    max_iter: usize,

    /// lower-bound improvement below which a run stops
    #[arg(long, default_value_t = 1e-2)]
    tol: f64,

    /// random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// number of worker threads (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// output file prefix
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

/// Cells whose best singlet probability stays below this are reported
/// as unassigned
const ASSIGN_THRESHOLD: f64 = 0.9;

/// Cells whose summed doublet probability exceeds this are reported
/// as doublets
const DOUBLET_THRESHOLD: f64 = 0.9;

pub fn run_demux(args: DemuxArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let n_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()?;

    info!("reading count matrices");
    let ad = read_count_matrix(&args.ad_file)?;
    let dp = read_count_matrix(&args.dp_file)?;
    validate_counts(&ad, &dp)?;
    let (n_vars, n_cells) = ad.dim();
    info!("{} variants x {} cells", n_vars, n_cells);

    let gt_prior = match &args.geno_file {
        Some(file) => {
            let field: GenotypeField = args.geno_tag.parse()?;
            Some(read_genotype_prior(
                file,
                field,
                n_vars,
                args.geno_call_error,
            )?)
        }
        None => None,
    };

    let n_donor = match (args.n_donor, &gt_prior) {
        (Some(k), _) => k,
        (None, Some(p)) => p.dim().2,
        (None, None) => {
            anyhow::bail!("pass --n-donor or a genotype file to size the donor pool")
        }
    };

    let init = VbInit {
        gt_prior: gt_prior.as_ref(),
        ..VbInit::default()
    };
    let opts = EnsembleOptions {
        n_donor,
        amplify: args.amplify,
        n_init: args.n_init,
        seed: args.seed,
        vb: VbOptions {
            n_donor: Some(n_donor),
            detect_doublet: !args.no_doublet,
            doublet_prior: args.doublet_prior,
            min_iter: args.min_iter,
            max_iter: args.max_iter,
            tol: args.tol,
            seed: args.seed,
            ..VbOptions::default()
        },
    };

    let out = fit_ensemble(&ad, &dp, &init, &opts)?;
    write_outputs(&args.out, &out)?;

    info!("done");
    Ok(())
}

fn write_outputs(prefix: &str, out: &VbOutput) -> anyhow::Result<()> {
    out.assign_prob
        .to_tsv(&format!("{}.assign.tsv.gz", prefix))?;
    out.doublet_prob
        .to_tsv(&format!("{}.doublet.tsv.gz", prefix))?;
    out.theta_shapes
        .to_tsv(&format!("{}.theta.tsv.gz", prefix))?;

    // genotype posterior flattened donor-major: three state columns
    // per donor
    let (n_vars, n_states, n_donor) = out.gt_prob.dim();
    let mut gt_flat = Mat::zeros((n_vars, n_states * n_donor));
    for d in 0..n_donor {
        for g in 0..n_states {
            gt_flat
                .column_mut(d * n_states + g)
                .assign(&out.gt_prob.slice(s![.., g, d]));
        }
    }
    gt_flat.to_tsv(&format!("{}.genotype.tsv.gz", prefix))?;

    let calls = donor_calls(&out.assign_prob, &out.doublet_prob);
    write_types(&calls, &format!("{}.donors.tsv.gz", prefix))?;

    let trace: Vec<Box<str>> = out
        .elbo
        .values
        .iter()
        .enumerate()
        .map(|(it, lb)| format!("{}\t{}", it, lb).into_boxed_str())
        .collect();
    write_types(&trace, &format!("{}.elbo.tsv.gz", prefix))?;

    Ok(())
}

/// One line per cell: best donor (or `doublet` / `unassigned`), the
/// best singlet probability, and the summed doublet probability
pub fn donor_calls(assign_prob: &Mat, doublet_prob: &Mat) -> Vec<Box<str>> {
    let mut calls = Vec::with_capacity(assign_prob.nrows() + 1);
    calls.push("cell\tdonor\tprob_max\tprob_doublet".to_string().into_boxed_str());

    for (c, row) in assign_prob.rows().into_iter().enumerate() {
        let (best, prob_max) = row
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (d, &p)| {
                if p > acc.1 {
                    (d, p)
                } else {
                    acc
                }
            });
        let prob_doublet = doublet_prob.row(c).sum();

        let label = if prob_doublet > DOUBLET_THRESHOLD {
            "doublet".to_string()
        } else if prob_max < ASSIGN_THRESHOLD {
            "unassigned".to_string()
        } else {
            format!("donor{}", best)
        };

        calls.push(
            format!("{}\t{}\t{:.6}\t{:.6}", c, label, prob_max, prob_doublet).into_boxed_str(),
        );
    }
    calls
}
