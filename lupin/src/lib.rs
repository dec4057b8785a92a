//! Donor demultiplexing for pooled single-cell sequencing.
//!
//! Cells from several genetically distinct donors are pooled into one
//! droplet-based sequencing run; this crate assigns each droplet back
//! to its donor of origin from per-cell, per-variant allele counts.
//! Inference is mean-field variational Bayes over three coupled
//! factors: a categorical donor identity per cell, a categorical
//! genotype per (variant, donor), and a Beta-distributed allelic
//! fraction per genotype state. Doublet droplets are scored against an
//! augmented identity space covering every ordered donor pair.

pub mod common;

/// Variational update engines: assignment, genotype, theta, ELBO
pub mod model;

/// Ordered donor-pair (doublet) augmentation of the identity space
pub mod doublet;

/// VB-EM driver: options, convergence trace, fixed-point loop
pub mod vb;

/// Multi-restart ensemble search over random initializations
pub mod ensemble;

/// Synthetic pooled-experiment generator
pub mod sim;

/// Count-matrix and genotype-prior readers
pub mod input;

pub mod run_demux;
pub mod run_simulate;

pub use ensemble::{fit_ensemble, EnsembleOptions};
pub use vb::{fit_vb, VbInit, VbOptions, VbOutput};
