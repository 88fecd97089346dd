pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    pub fn energy(samples: &[f64]) -> f64 {
        samples.iter().map(|&v| v * v).sum()
    }

    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Median of the finite values; `None` when there are none.
    pub fn median(samples: &[f64]) -> Option<f64> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some(0.5 * (sorted[mid - 1] + sorted[mid]))
        } else {
            Some(sorted[mid])
        }
    }

    /// Centered moving RMS; `kernel` is forced odd and truncated at the edges.
    pub fn moving_rms(samples: &[f64], kernel: usize) -> Vec<f64> {
        if samples.is_empty() {
            return Vec::new();
        }
        let half = kernel.max(1) / 2;
        let mut prefix = Vec::with_capacity(samples.len() + 1);
        prefix.push(0.0f64);
        let mut acc = 0.0;
        for &v in samples {
            acc += v * v;
            prefix.push(acc);
        }

        (0..samples.len())
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(samples.len());
                let sum = (prefix[hi] - prefix[lo]).max(0.0);
                (sum / (hi - lo) as f64).sqrt()
            })
            .collect()
    }

    /// Index of the first maximum, ignoring non-finite values.
    pub fn argmax(samples: &[f64]) -> Option<usize> {
        samples
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .fold(None, |best: Option<(usize, f64)>, (idx, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((idx, v)),
            })
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn median_skips_non_finite() {
        assert_eq!(StatsHelper::median(&[3.0, f64::NAN, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(StatsHelper::median(&[f64::NAN]), None);
    }

    #[test]
    fn moving_rms_peaks_at_symmetric_bump_center() {
        let bump: Vec<f64> = (0..41)
            .map(|i| (-((i as f64 - 20.0) / 4.0).powi(2)).exp())
            .collect();
        let smoothed = StatsHelper::moving_rms(&bump, 5);
        assert_eq!(StatsHelper::argmax(&smoothed), Some(20));
    }

    #[test]
    fn argmax_keeps_first_maximum() {
        assert_eq!(StatsHelper::argmax(&[1.0, 3.0, 3.0, f64::NAN]), Some(1));
        assert_eq!(StatsHelper::argmax(&[]), None);
    }
}
