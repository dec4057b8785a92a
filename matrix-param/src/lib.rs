//! Conjugate parameter containers for variational inference.

pub mod ndarray_beta;
pub mod traits;
