use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::Arc;

/// Helper that wraps a forward/inverse `rustfft` plan pair for reuse.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self::with_planner(&mut planner, size)
    }

    fn with_planner(planner: &mut FftPlanner<f64>, size: usize) -> Self {
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let scratch = vec![Complex64::zero(); scratch_len];
        Self {
            forward,
            inverse,
            scratch,
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.len() == 0
    }

    /// Forward transform of a real signal, zero-padded or truncated to the plan size.
    pub fn forward(&mut self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.len())
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.len(), Complex64::zero());
        self.forward
            .process_with_scratch(&mut buffer, &mut self.scratch);
        buffer
    }

    /// Inverse transform returning the normalized real part.
    pub fn inverse(&mut self, spectrum: &mut [Complex64]) -> Vec<f64> {
        self.inverse.process_with_scratch(spectrum, &mut self.scratch);
        let scale = 1.0 / self.len().max(1) as f64;
        spectrum.iter().map(|c| c.re * scale).collect()
    }
}

/// Plan cache keyed by transform length.
pub struct FftCache {
    planner: FftPlanner<f64>,
    helpers: HashMap<usize, FftHelper>,
}

impl FftCache {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            helpers: HashMap::new(),
        }
    }

    pub fn helper(&mut self, size: usize) -> &mut FftHelper {
        let planner = &mut self.planner;
        self.helpers
            .entry(size)
            .or_insert_with(|| FftHelper::with_planner(planner, size))
    }
}

impl Default for FftCache {
    fn default() -> Self {
        Self::new()
    }
}
