//! Sample-rate conversion by linear interpolation.

/// Input samples (index, weight) blended into one output sample.
pub type Taps = [(usize, f64); 2];

/// Linear interpolation from a fixed input length to a fixed output length.
/// The first and last samples map onto each other.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    input_len: usize,
    taps: Vec<Taps>,
}

impl LinearResampler {
    pub fn new(input_len: usize, output_len: usize) -> Self {
        let taps = if input_len == 0 || output_len == 0 {
            Vec::new()
        } else if input_len == 1 {
            vec![[(0, 1.0), (0, 0.0)]; output_len]
        } else if input_len == output_len {
            (0..input_len).map(|i| [(i, 1.0), (i, 0.0)]).collect()
        } else {
            let ratio = (input_len - 1) as f64 / (output_len.max(2) - 1) as f64;
            (0..output_len)
                .map(|i| {
                    let pos = i as f64 * ratio;
                    let idx = pos as usize;
                    let frac = pos - idx as f64;
                    if idx + 1 < input_len {
                        [(idx, 1.0 - frac), (idx + 1, frac)]
                    } else {
                        [(input_len - 1, 1.0), (input_len - 1, 0.0)]
                    }
                })
                .collect()
        };
        Self { input_len, taps }
    }

    pub fn output_len(&self) -> usize {
        self.taps.len()
    }

    pub fn taps(&self) -> &[Taps] {
        &self.taps
    }

    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        if input.len() != self.input_len {
            return LinearResampler::new(input.len(), self.output_len()).apply(input);
        }
        self.taps
            .iter()
            .map(|[(a, wa), (b, wb)]| input[*a] * wa + input[*b] * wb)
            .collect()
    }
}

/// Resamples `input` to exactly `output_len` samples spanning the same interval.
pub fn resample_linear(input: &[f64], output_len: usize) -> Vec<f64> {
    LinearResampler::new(input.len(), output_len).apply(input)
}
