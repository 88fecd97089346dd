//! Automatic RMS-ratio threshold for the moving-average detector.

use log::debug;

pub const RATIO_RANGE: f64 = 10.0;
pub const BIN_WIDTH: f64 = 0.01;
pub const MIN_PEAK_COUNT: usize = 10;
pub const MAX_COARSENING: usize = 8;
pub const TAIL_FRACTION: f64 = 0.05;
pub const FALLBACK_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoThreshold {
    pub value: f64,
    pub peak_ratio: f64,
    pub tail_ratio: f64,
    pub bin_width: f64,
    pub fallback: bool,
}

impl AutoThreshold {
    fn fallback(bin_width: f64) -> Self {
        Self {
            value: FALLBACK_RATIO,
            peak_ratio: 0.0,
            tail_ratio: 0.0,
            bin_width,
            fallback: true,
        }
    }
}

/// Derives a detection threshold from the distribution of window RMS ratios.
///
/// Non-finite ratios count as zero. The histogram is coarsened by merging
/// adjacent bins until the peak bin holds `MIN_PEAK_COUNT` entries; if that
/// never happens within `MAX_COARSENING` merges, `FALLBACK_RATIO` is used.
pub fn auto_threshold(ratios: &[f64]) -> AutoThreshold {
    let bins = (RATIO_RANGE / BIN_WIDTH).round() as usize;
    let mut counts = vec![0usize; bins];
    for &ratio in ratios {
        let ratio = if ratio.is_finite() { ratio } else { 0.0 };
        if !(0.0..=RATIO_RANGE).contains(&ratio) {
            continue;
        }
        let idx = ((ratio / BIN_WIDTH) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let mut width = BIN_WIDTH;
    let mut attempts = 0;
    while counts.iter().copied().max().unwrap_or(0) < MIN_PEAK_COUNT {
        if attempts == MAX_COARSENING || counts.len() < 2 {
            debug!("auto threshold fell back after {} coarsening passes", attempts);
            return AutoThreshold::fallback(width);
        }
        counts = counts.chunks(2).map(|pair| pair.iter().sum()).collect();
        width *= 2.0;
        attempts += 1;
    }

    let peak_count = counts.iter().copied().max().unwrap_or(0);
    let peak_idx = counts.iter().position(|&c| c == peak_count).unwrap_or(0);
    let cutoff = TAIL_FRACTION * peak_count as f64;
    let tail_idx = counts
        .iter()
        .rposition(|&c| c as f64 > cutoff)
        .unwrap_or(peak_idx)
        .max(peak_idx);

    let center = |idx: usize| (idx as f64 + 0.5) * width;
    let peak_ratio = center(peak_idx);
    let tail_ratio = center(tail_idx);
    let spread = (2.0 * (tail_ratio - peak_ratio)).max(width);
    let ceiling = 0.5 * (peak_ratio + RATIO_RANGE);
    let value = (peak_ratio + spread).min(ceiling);

    AutoThreshold {
        value,
        peak_ratio,
        tail_ratio,
        bin_width: width,
        fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_distribution_gives_threshold_near_peak() {
        let mut ratios: Vec<f64> = (0..200).map(|i| 0.95 + 0.1 * (i % 10) as f64 / 10.0).collect();
        ratios.push(40.0);
        let t = auto_threshold(&ratios);
        assert!(!t.fallback);
        assert!(t.value > 1.0 && t.value < 1.5, "threshold {}", t.value);
    }

    #[test]
    fn sparse_histogram_is_coarsened() {
        let ratios: Vec<f64> = (0..30).map(|i| 0.8 + 0.4 * i as f64 / 30.0).collect();
        let t = auto_threshold(&ratios);
        assert!(!t.fallback);
        assert!(t.bin_width > BIN_WIDTH);
    }

    #[test]
    fn too_few_ratios_fall_back() {
        let t = auto_threshold(&[1.0, 1.1, 0.9]);
        assert!(t.fallback);
        assert_eq!(t.value, FALLBACK_RATIO);
    }

    #[test]
    fn non_finite_ratios_count_as_zero() {
        let ratios = vec![f64::NAN; 50];
        let t = auto_threshold(&ratios);
        assert!(t.value.is_finite());
        assert!(t.peak_ratio < 0.1);
    }

    #[test]
    fn threshold_never_exceeds_midpoint_to_upper_edge() {
        let mut ratios = vec![1.0; 100];
        ratios.extend(std::iter::repeat(9.5).take(20));
        let t = auto_threshold(&ratios);
        assert!(t.value <= 0.5 * (t.peak_ratio + RATIO_RANGE) + 1e-12);
    }
}
