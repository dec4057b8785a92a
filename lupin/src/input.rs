//! Loading count matrices and genotype priors from disk.
//!
//! Count matrices (variants x cells) arrive either as MatrixMarket
//! triplets (`.mtx`, optionally gzipped) or as dense TSV. Genotype
//! priors arrive as TSV in one of two layouts, selected by `field`:
//! hard calls (`GT`) or per-state probabilities (`GP`).

use crate::common::*;

use matrix_util::common_io::file_ext;
use matrix_util::mtx_io::read_mtx_triplets;
use matrix_util::tensor_util::normalize_axis;
use matrix_util::traits::{IoOps, MatTriplets};
use ndarray::prelude::*;

/// Read a (variants x cells) count matrix, dispatching on the file
/// extension (`.gz` is looked through, so `counts.mtx.gz` reads as
/// MatrixMarket)
pub fn read_count_matrix(file: &str) -> anyhow::Result<Mat> {
    match file_ext(file).as_deref() {
        Some("mtx") => {
            let (triplets, (nrow, ncol, _)) = read_mtx_triplets(file)?;
            Mat::from_nonzero_triplets(nrow, ncol, triplets)
        }
        _ => Mat::from_tsv(file, None),
    }
}

/// Genotype prior layout on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeField {
    /// Hard calls in {0, 1, 2}, one column per donor
    Gt,
    /// State probabilities, three columns per donor (donor-major)
    Gp,
}

impl std::str::FromStr for GenotypeField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GT" => Ok(GenotypeField::Gt),
            "GP" => Ok(GenotypeField::Gp),
            other => anyhow::bail!("unsupported genotype field: {}", other),
        }
    }
}

/// Read a genotype prior as a (variants x 3 x donors) tensor.
///
/// * `file` - TSV file, no header
/// * `field` - on-disk layout
/// * `n_vars` - expected number of rows
/// * `call_error` - residual mass spread over the other states when
///   expanding hard calls; ignored for `Gp`
pub fn read_genotype_prior(
    file: &str,
    field: GenotypeField,
    n_vars: usize,
    call_error: f64,
) -> anyhow::Result<Tns> {
    let raw = Mat::from_tsv(file, None)?;
    if raw.nrows() != n_vars {
        anyhow::bail!(
            "genotype file {} covers {} variants, expected {}",
            file,
            raw.nrows(),
            n_vars
        );
    }

    let prior = match field {
        GenotypeField::Gt => {
            let n_donor = raw.ncols();
            let mut prior = Tns::from_elem((n_vars, N_GENOTYPE, n_donor), call_error);
            for v in 0..n_vars {
                for d in 0..n_donor {
                    let call = raw[[v, d]];
                    if call != 0.0 && call != 1.0 && call != 2.0 {
                        anyhow::bail!(
                            "genotype call {} at ({}, {}) is not in {{0, 1, 2}}",
                            call,
                            v,
                            d
                        );
                    }
                    prior[[v, call as usize, d]] = 1.0;
                }
            }
            prior
        }
        GenotypeField::Gp => {
            if raw.ncols() % N_GENOTYPE != 0 {
                anyhow::bail!(
                    "genotype file {} has {} columns, expected a multiple of {}",
                    file,
                    raw.ncols(),
                    N_GENOTYPE
                );
            }
            let n_donor = raw.ncols() / N_GENOTYPE;
            let mut prior = Tns::zeros((n_vars, N_GENOTYPE, n_donor));
            for v in 0..n_vars {
                for d in 0..n_donor {
                    for g in 0..N_GENOTYPE {
                        prior[[v, g, d]] = raw[[v, d * N_GENOTYPE + g]];
                    }
                }
            }
            prior
        }
    };

    Ok(normalize_axis(&prior, Axis(1)))
}

/// Shape and sanity checks shared by every entry point
pub fn validate_counts(ad: &Mat, dp: &Mat) -> anyhow::Result<()> {
    if ad.dim() != dp.dim() {
        anyhow::bail!(
            "count matrices disagree: AD is {:?}, DP is {:?}",
            ad.dim(),
            dp.dim()
        );
    }
    for (((v, c), &a), &d) in ad.indexed_iter().zip(dp.iter()) {
        if a < 0.0 || d < 0.0 || a > d {
            anyhow::bail!(
                "invalid counts at variant {}, cell {}: AD = {}, DP = {}",
                v,
                c,
                a,
                d
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_util::common_io::write_lines;
    use std::str::FromStr;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, lines: &[&str]) -> String {
        let path = dir.path().join(name).to_str().unwrap().to_string();
        let boxed: Vec<Box<str>> = lines.iter().map(|x| (*x).into()).collect();
        write_lines(&boxed, &path).unwrap();
        path
    }

    #[test]
    fn field_parses_case_insensitively() {
        assert_eq!(GenotypeField::from_str("gt").unwrap(), GenotypeField::Gt);
        assert_eq!(GenotypeField::from_str("GP").unwrap(), GenotypeField::Gp);
        assert!(GenotypeField::from_str("DS").is_err());
    }

    #[test]
    fn hard_calls_expand_to_smoothed_one_hot() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_tmp(&dir, "gt.tsv", &["0\t2", "1\t1"]);

        let prior = read_genotype_prior(&file, GenotypeField::Gt, 2, 0.01).unwrap();
        assert_eq!(prior.dim(), (2, 3, 2));
        assert!(prior[[0, 0, 0]] > 0.9);
        assert!(prior[[0, 2, 1]] > 0.9);
        assert!(prior[[1, 1, 0]] > 0.9);
        let tot: f64 = (0..3).map(|g| prior[[0, g, 0]]).sum();
        approx::assert_abs_diff_eq!(tot, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn probability_columns_are_donor_major() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_tmp(&dir, "gp.tsv", &["0.8\t0.1\t0.1\t0.0\t0.0\t1.0"]);

        let prior = read_genotype_prior(&file, GenotypeField::Gp, 1, 0.0).unwrap();
        assert_eq!(prior.dim(), (1, 3, 2));
        approx::assert_abs_diff_eq!(prior[[0, 0, 0]], 0.8, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(prior[[0, 2, 1]], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn bad_calls_and_shapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad_call = write_tmp(&dir, "bad.tsv", &["3\t0"]);
        assert!(read_genotype_prior(&bad_call, GenotypeField::Gt, 1, 0.01).is_err());

        let bad_cols = write_tmp(&dir, "cols.tsv", &["0.5\t0.5"]);
        assert!(read_genotype_prior(&bad_cols, GenotypeField::Gp, 1, 0.0).is_err());
    }

    #[test]
    fn count_validation_catches_ad_above_dp() {
        let ad = ndarray::arr2(&[[2.0]]);
        let dp = ndarray::arr2(&[[1.0]]);
        assert!(validate_counts(&ad, &dp).is_err());

        let ok_ad = ndarray::arr2(&[[1.0]]);
        assert!(validate_counts(&ok_ad, &dp).is_ok());
    }
}
