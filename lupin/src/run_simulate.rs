//! `simulate` subcommand: write a synthetic data set to disk.

use crate::common::*;
use crate::sim::{simulate, SimData, SimOptions};

use matrix_util::common_io::write_types;
use matrix_util::mtx_io::write_mtx_triplets;
use matrix_util::traits::MatTriplets;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct SimArgs {
    /// number of variants
    #[arg(long, short = 'v', default_value_t = 100)]
    n_vars: usize,

    /// number of droplets
    #[arg(long, short = 'c', default_value_t = 200)]
    n_cells: usize,

    /// number of donors in the pool
    #[arg(long, short = 'k', default_value_t = 3)]
    n_donor: usize,

    /// fraction of droplets carrying two donors
    #[arg(long, default_value_t = 0.0)]
    doublet_rate: f64,

    /// mean read depth per (variant, cell)
    #[arg(long, default_value_t = 2.0)]
    depth: f64,

    /// random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// output file prefix
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_simulate(args: SimArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let opts = SimOptions {
        n_vars: args.n_vars,
        n_cells: args.n_cells,
        n_donor: args.n_donor,
        doublet_rate: args.doublet_rate,
        depth: args.depth,
        seed: args.seed,
    };

    info!(
        "simulating {} variants x {} cells from {} donors",
        opts.n_vars, opts.n_cells, opts.n_donor
    );
    let sim = simulate(&opts)?;
    write_sim_outputs(&args.out, &sim)?;

    info!("done");
    Ok(())
}

fn write_sim_outputs(prefix: &str, sim: &SimData) -> anyhow::Result<()> {
    write_count_mtx(&sim.ad, &format!("{}.ad.mtx.gz", prefix))?;
    write_count_mtx(&sim.dp, &format!("{}.dp.mtx.gz", prefix))?;

    // hard calls, one column per donor
    let genotype: Vec<Box<str>> = sim
        .genotype
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join("\t")
                .into_boxed_str()
        })
        .collect();
    write_types(&genotype, &format!("{}.genotype.tsv.gz", prefix))?;

    let mut truth = Vec::with_capacity(sim.donor.len() + 1);
    truth.push("cell\tdonor\tsecond_donor".to_string().into_boxed_str());
    for (c, (&d1, d2)) in sim.donor.iter().zip(sim.second_donor.iter()).enumerate() {
        let d2 = d2.map(|d| d.to_string()).unwrap_or_else(|| ".".to_string());
        truth.push(format!("{}\t{}\t{}", c, d1, d2).into_boxed_str());
    }
    write_types(&truth, &format!("{}.truth.tsv.gz", prefix))?;

    Ok(())
}

fn write_count_mtx(counts: &Mat, file: &str) -> anyhow::Result<()> {
    let (nrow, ncol, triplets) = counts.to_nonzero_triplets()?;
    let triplets: Vec<(u64, u64, f64)> = triplets
        .into_iter()
        .map(|(i, j, x)| (i as u64, j as u64, x))
        .collect();
    write_mtx_triplets(&triplets, nrow, ncol, file)
}
