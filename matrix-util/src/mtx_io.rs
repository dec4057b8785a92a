use crate::common_io::*;
use std::io::Write;

/// Write the triplets into a MatrixMarket file with 1-based indices
/// * `triplets` - the triplets to write
/// * `nrow` - number of rows
/// * `ncol` - number of columns
/// * `mtx_file` - the output file (e.g., "matrix.mtx.gz")
pub fn write_mtx_triplets(
    triplets: &[(u64, u64, f64)],
    nrow: usize,
    ncol: usize,
    mtx_file: &str,
) -> anyhow::Result<()> {
    mkdir(mtx_file)?;

    let mut buf = open_buf_writer(mtx_file)?;

    let nnz = triplets.len();
    writeln!(buf, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(buf, "{}\t{}\t{}", nrow, ncol, nnz)?;

    // 1-based indices on disk
    for (row, col, val) in triplets {
        writeln!(buf, "{}\t{}\t{}", row + 1, col + 1, val)?;
    }

    buf.flush()?;
    Ok(())
}

/// Read a MatrixMarket file and return 0-based triplets (row, col,
/// val) along with the header shape (nrow, ncol, nnz)
/// * `mtx_file` - path to the matrix market file
pub fn read_mtx_triplets(
    mtx_file: &str,
) -> anyhow::Result<(Vec<(u64, u64, f64)>, (usize, usize, usize))> {
    let mtx_hdr_position = 0;
    let parsed = read_lines_of_words(mtx_file, mtx_hdr_position)?;

    fn parse_row_col_val(triplet: &[Box<str>]) -> Option<(u64, u64, f64)> {
        if triplet.len() != 3 {
            return None;
        }

        let val = triplet[2].parse::<f64>().ok()?;

        // convert 1-based to 0-based
        let row = triplet[0].parse::<u64>().ok()?.checked_sub(1)?;
        let col = triplet[1].parse::<u64>().ok()?.checked_sub(1)?;

        Some((row, col, val))
    }

    if parsed.header.len() != 3 {
        return Err(anyhow::anyhow!("failed to parse mtx header"));
    }

    let nrow = parsed.header[0].parse::<usize>()?;
    let ncol = parsed.header[1].parse::<usize>()?;
    let nnz = parsed.header[2].parse::<usize>()?;

    let mut mtx_triplets: Vec<(u64, u64, f64)> = parsed
        .lines
        .iter()
        .filter_map(|x| parse_row_col_val(x))
        .collect();

    if mtx_triplets.len() != nnz {
        return Err(anyhow::anyhow!(
            "expected {} non-zero entries in {}, found {}",
            nnz,
            mtx_file,
            mtx_triplets.len()
        ));
    }

    mtx_triplets.sort_by_key(|&(row, _, _)| row);
    mtx_triplets.sort_by_key(|&(_, col, _)| col);
    Ok((mtx_triplets, (nrow, ncol, nnz)))
}
