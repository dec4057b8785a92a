pub use ndarray::prelude::*;
pub use rayon::prelude::*;

use crate::traits::*;
use num_traits::{Float, FromPrimitive};
use rand::Rng;

impl<T> SampleOps for Array2<T>
where
    T: Float + FromPrimitive + Send,
{
    type Mat = Self;
    type Scalar = T;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let rvec: Vec<T> = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| {
                let x: f64 = rng.random();
                T::from(x).expect("failed to convert sample")
            })
            .collect();

        Array2::from_shape_vec((dd, nn), rvec).unwrap()
    }

    fn runif_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        let rvec: Vec<T> = (0..(dd * nn))
            .map(|_| {
                let x: f64 = rng.random();
                T::from(x).expect("failed to convert sample")
            })
            .collect();

        Array2::from_shape_vec((dd, nn), rvec).unwrap()
    }
}

impl<T> MatTriplets for Array2<T>
where
    T: Float,
{
    type Mat = Self;
    type Scalar = T;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut array = Array2::<T>::zeros((nrow, ncol));
        for (ii, jj, x_ij) in triplets {
            let ii: usize = ii.try_into().expect("failed to convert index");
            let jj: usize = jj.try_into().expect("failed to convert index");
            if ii >= nrow || jj >= ncol {
                anyhow::bail!("triplet ({}, {}) out of shape {} x {}", ii, jj, nrow, ncol);
            }
            array[(ii, jj)] = x_ij;
        }
        Ok(array)
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        if let Some(eps) = T::from(1e-12) {
            let (rows, cols) = self.dim();
            Ok((
                rows,
                cols,
                self.indexed_iter()
                    .filter_map(
                        |((i, j), &x)| {
                            if x.abs() > eps {
                                Some((i, j, x))
                            } else {
                                None
                            }
                        },
                    )
                    .collect(),
            ))
        } else {
            anyhow::bail!("eps is not representable")
        }
    }
}
