use rand::Rng;

/// Convert to and from a vector of (row, column, value) triplets
pub trait MatTriplets {
    type Mat;
    type Scalar;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug;

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)>;
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)` using the
    /// global thread rng
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a uniform distribution `U(0,1)` drawing
    /// from a caller-owned rng; deterministic given the rng state
    fn runif_rng<R: Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;
}

/// Read and write matrices from and to files
pub trait IoOps {
    type Scalar;
    type Mat;

    fn from_tsv(tsv_file: &str, hdr_line: Option<usize>) -> anyhow::Result<Self::Mat>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()>;
}
