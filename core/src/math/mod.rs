pub mod fft;
pub mod matrix;
pub mod special;
pub mod stats;

pub use fft::{FftCache, FftHelper};
pub use matrix::{MatrixHelper, SymmetricEigen};
pub use stats::StatsHelper;
