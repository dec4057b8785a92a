#![allow(dead_code)]

pub use log::{info, warn};

pub type Mat = ndarray::Array2<f64>;
pub type Tns = ndarray::Array3<f64>;

/// Genotype states of a single donor at one variant:
/// 0 = ref/ref, 1 = het, 2 = alt/alt
pub const N_GENOTYPE: usize = 3;

/// Combined genotype states of a donor pair: the three shared states
/// plus ref/het and het/alt mixtures
pub const N_GENOTYPE_DOUBLET: usize = 5;
