use lupin::run_demux::{run_demux, DemuxArgs};
use lupin::run_simulate::{run_simulate, SimArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign pooled droplets to their donors of origin
    Demux(DemuxArgs),

    /// Simulate pooled allele counts with known ground truth
    Simulate(SimArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Demux(args) => {
            run_demux(args.clone())?;
        }
        Commands::Simulate(args) => {
            run_simulate(args.clone())?;
        }
    }

    Ok(())
}
