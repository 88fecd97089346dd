pub mod buffer_pool;
pub mod filter;
pub mod resample;
pub mod window_stats;

pub use buffer_pool::BufferPool;
pub use filter::{BandFilter, BandLimits, LocalMean};
pub use resample::{resample_linear, LinearResampler};
pub use window_stats::WindowStatistics;
