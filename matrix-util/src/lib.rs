//! Shared matrix and tensor helpers for the demultiplexing workspace.
//!
//! The crate collects the generic pieces the model crates rely on:
//! gzip-aware text I/O, MatrixMarket triplets, random matrix sampling,
//! and axis-wise probability tensor operations.

pub mod common_io;
pub mod mtx_io;
pub mod ndarray_io;
pub mod ndarray_util;
pub mod tensor_util;
pub mod traits;
