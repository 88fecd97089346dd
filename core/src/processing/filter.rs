use crate::math::fft::FftCache;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Half-width of the slow local mean used for DC removal, in seconds.
pub const LOCAL_MEAN_HALF_WIDTH_S: f64 = 5.0;

/// Two-sided pass band in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLimits {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl BandLimits {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    pub fn is_valid(&self) -> bool {
        self.low_hz.is_finite()
            && self.high_hz.is_finite()
            && self.low_hz >= 0.0
            && self.high_hz > self.low_hz
    }

    /// Caps the upper edge at `nyquist_hz`.
    pub fn capped(&self, nyquist_hz: f64) -> Self {
        Self {
            low_hz: self.low_hz.min(nyquist_hz),
            high_hz: self.high_hz.min(nyquist_hz),
        }
    }

    fn passes(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }

    /// Whether bin `k` of an `n`-point transform at `sample_rate` lies in the band.
    fn passes_bin(&self, k: usize, n: usize, sample_rate: f64) -> bool {
        let folded = if k <= n / 2 { k } else { n - k };
        self.passes(folded as f64 * sample_rate / n as f64)
    }

    /// Autocorrelation at lags `0..lags` of unit-variance white noise after
    /// the band mask of an `extent`-point transform.
    pub fn white_noise_autocorrelation(
        &self,
        sample_rate: f64,
        extent: usize,
        lags: usize,
    ) -> Vec<f64> {
        if extent == 0 {
            return vec![0.0; lags];
        }
        let passed: Vec<usize> = (0..extent)
            .filter(|&k| self.passes_bin(k, extent, sample_rate))
            .collect();
        (0..lags)
            .map(|lag| {
                passed
                    .iter()
                    .map(|&k| (2.0 * PI * (k * lag % extent) as f64 / extent as f64).cos())
                    .sum::<f64>()
                    / extent as f64
            })
            .collect()
    }
}

/// Sliding local mean backed by prefix sums, so the value at any sample is
/// independent of how the caller partitions the recording.
pub struct LocalMean {
    prefix: Vec<f64>,
    half_width: usize,
}

impl LocalMean {
    pub fn new(samples: &[f32], sample_rate: f64) -> Self {
        let mut prefix = Vec::with_capacity(samples.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0f64;
        for &v in samples {
            acc += v as f64;
            prefix.push(acc);
        }
        let half_width = (LOCAL_MEAN_HALF_WIDTH_S * sample_rate).round().max(0.0) as usize;
        Self { prefix, half_width }
    }

    pub fn at(&self, index: usize) -> f64 {
        let len = self.prefix.len() - 1;
        if len == 0 {
            return 0.0;
        }
        let lo = index.saturating_sub(self.half_width);
        let hi = (index + self.half_width + 1).min(len);
        if hi <= lo {
            return 0.0;
        }
        (self.prefix[hi] - self.prefix[lo]) / (hi - lo) as f64
    }
}

/// Zero-phase frequency-domain band-pass over segments of one recording.
///
/// Every segment is transformed together with `margin` samples of context
/// on either side and then cropped, so the output for a given segment does
/// not depend on which other segments were requested.
pub struct BandFilter<'a> {
    samples: &'a [f32],
    sample_rate: f64,
    band: Option<BandLimits>,
    local_mean: LocalMean,
    ffts: FftCache,
}

impl<'a> BandFilter<'a> {
    pub fn new(samples: &'a [f32], sample_rate: f64, band: Option<BandLimits>) -> Self {
        Self {
            samples,
            sample_rate,
            band,
            local_mean: LocalMean::new(samples, sample_rate),
            ffts: FftCache::new(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Filtered copy of `samples[start..start + len]` written into `out`.
    pub fn segment_into(&mut self, start: usize, len: usize, margin: usize, out: &mut Vec<f64>) {
        out.clear();
        let total = self.samples.len();
        let start = start.min(total);
        let end = (start + len).min(total);
        if end <= start {
            return;
        }

        let band = match self.band {
            Some(band) => band,
            None => {
                out.extend((start..end).map(|i| self.detrended(i)));
                return;
            }
        };

        let ext_lo = start.saturating_sub(margin);
        let ext_hi = (end + margin).min(total);
        let ext_len = ext_hi - ext_lo;
        let extended: Vec<f64> = (ext_lo..ext_hi).map(|i| self.detrended(i)).collect();

        let sample_rate = self.sample_rate;
        let helper = self.ffts.helper(ext_len);
        let mut spectrum = helper.forward(&extended);
        apply_band_mask(&mut spectrum, sample_rate, &band);
        let filtered = helper.inverse(&mut spectrum);

        out.extend_from_slice(&filtered[(start - ext_lo)..(end - ext_lo)]);
    }

    pub fn segment(&mut self, start: usize, len: usize, margin: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(len);
        self.segment_into(start, len, margin, &mut out);
        out
    }

    fn detrended(&self, index: usize) -> f64 {
        self.samples[index] as f64 - self.local_mean.at(index)
    }
}

fn apply_band_mask(spectrum: &mut [Complex64], sample_rate: f64, band: &BandLimits) {
    let n = spectrum.len();
    if n == 0 {
        return;
    }
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if !band.passes_bin(k, n, sample_rate) {
            *bin = Complex64::new(0.0, 0.0);
        }
    }
}
