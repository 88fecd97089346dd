use crate::math::stats::StatsHelper;
use crate::prelude::DetectResult;
use crate::processing::buffer_pool::BufferPool;
use crate::processing::filter::{BandFilter, BandLimits};

/// Default number of windows filtered per batch.
pub const DEFAULT_CHUNK_WINDOWS: usize = 256;

/// Band-limited statistics over fixed-length windows of one recording.
///
/// Windows are filtered in batches of `chunk_windows`, keeping at most one
/// batch of filtered samples alive. Each window is filtered with one window
/// of context on either side, so results do not depend on the batch size.
pub struct WindowStatistics<'a> {
    filter: BandFilter<'a>,
    pool: BufferPool,
    chunk_windows: usize,
}

impl<'a> WindowStatistics<'a> {
    pub fn new(samples: &'a [f32], sample_rate: f64, band: Option<BandLimits>) -> Self {
        Self::with_chunk(samples, sample_rate, band, DEFAULT_CHUNK_WINDOWS)
    }

    pub fn with_chunk(
        samples: &'a [f32],
        sample_rate: f64,
        band: Option<BandLimits>,
        chunk_windows: usize,
    ) -> Self {
        let chunk_windows = chunk_windows.max(1);
        let band = band.map(|b| b.capped(sample_rate / 2.0));
        Self {
            filter: BandFilter::new(samples, sample_rate, band),
            pool: BufferPool::with_capacity(chunk_windows),
            chunk_windows,
        }
    }

    /// Band-limited RMS of `samples[start..start + len]`.
    pub fn band_rms(&mut self, start: usize, len: usize) -> DetectResult<f64> {
        let mut buffer = self.pool.checkout(len)?;
        self.filter.segment_into(start, len, len, &mut buffer);
        let rms = StatsHelper::rms(&buffer);
        self.pool.release(buffer);
        Ok(rms)
    }

    /// Band-limited samples of one window, for peak searches.
    pub fn filtered_window(&mut self, start: usize, len: usize) -> Vec<f64> {
        self.filter.segment(start, len, len)
    }

    /// RMS of `count` consecutive windows of `window_len` samples from sample 0.
    pub fn window_rms(&mut self, window_len: usize, count: usize) -> DetectResult<Vec<f64>> {
        let mut rms = Vec::with_capacity(count);
        if window_len == 0 {
            return Ok(rms);
        }
        let mut first = 0;
        while first < count {
            let last = (first + self.chunk_windows).min(count);
            let mut batch = Vec::with_capacity(last - first);
            for index in first..last {
                let mut buffer = self.pool.checkout(window_len)?;
                self.filter
                    .segment_into(index * window_len, window_len, window_len, &mut buffer);
                batch.push(buffer);
            }
            for buffer in batch {
                rms.push(StatsHelper::rms(&buffer));
                self.pool.release(buffer);
            }
            first = last;
        }
        Ok(rms)
    }
}
