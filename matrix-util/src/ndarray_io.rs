use crate::common_io::{read_lines_of_words, write_lines};
use crate::traits::IoOps;
use ndarray::prelude::*;
use std::fmt::{Debug, Display};
use std::str::FromStr;

impl<T> IoOps for Array2<T>
where
    T: FromStr + Send + Display,
    <T as FromStr>::Err: Debug,
{
    type Scalar = T;
    type Mat = Self;

    fn from_tsv(tsv_file: &str, hdr_line: Option<usize>) -> anyhow::Result<Self::Mat> {
        let hdr = match hdr_line {
            Some(pos) => pos as i64,
            None => -1,
        };

        let parsed = read_lines_of_words(tsv_file, hdr)?;

        if parsed.lines.is_empty() {
            return Err(anyhow::anyhow!("no data in {}", tsv_file));
        }

        let nrows = parsed.lines.len();
        let ncols = parsed.lines[0].len();

        let mut data = Vec::with_capacity(nrows * ncols);
        for (i, words) in parsed.lines.iter().enumerate() {
            if words.len() != ncols {
                return Err(anyhow::anyhow!(
                    "ragged row {} in {}: {} vs. {} columns",
                    i,
                    tsv_file,
                    words.len(),
                    ncols
                ));
            }
            for w in words {
                data.push(
                    w.parse::<T>()
                        .map_err(|e| anyhow::anyhow!("failed to parse '{}': {:?}", w, e))?,
                );
            }
        }

        Ok(Array2::from_shape_vec((nrows, ncols), data)?)
    }

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = self
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join("\t")
                    .into_boxed_str()
            })
            .collect();
        write_lines(&lines, tsv_file)?;
        Ok(())
    }
}
