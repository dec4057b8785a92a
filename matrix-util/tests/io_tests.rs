use approx::assert_abs_diff_eq;
use matrix_util::mtx_io::{read_mtx_triplets, write_mtx_triplets};
use matrix_util::traits::{IoOps, MatTriplets};
use ndarray::prelude::*;

#[test]
fn mtx_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mtx_file = dir.path().join("counts.mtx.gz");
    let mtx_file = mtx_file.to_str().unwrap();

    let triplets: Vec<(u64, u64, f64)> = vec![(0, 0, 3.0), (2, 1, 5.0), (1, 3, 1.0)];
    write_mtx_triplets(&triplets, 3, 4, mtx_file)?;

    let (out, shape) = read_mtx_triplets(mtx_file)?;
    assert_eq!(shape, (3, 4, 3));

    let mat = Array2::<f64>::from_nonzero_triplets(3, 4, out)?;
    assert_abs_diff_eq!(mat[[0, 0]], 3.0);
    assert_abs_diff_eq!(mat[[2, 1]], 5.0);
    assert_abs_diff_eq!(mat[[1, 3]], 1.0);
    assert_abs_diff_eq!(mat.sum(), 9.0);
    Ok(())
}

#[test]
fn tsv_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tsv_file = dir.path().join("mat.tsv.gz");
    let tsv_file = tsv_file.to_str().unwrap();

    let mat = arr2(&[[1.5, 2.0, 0.0], [0.25, -1.0, 9.0]]);
    mat.to_tsv(tsv_file)?;

    let out = Array2::<f64>::from_tsv(tsv_file, None)?;
    assert_eq!(out.dim(), (2, 3));
    for (a, b) in mat.iter().zip(out.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }
    Ok(())
}
