use std::f32::consts::PI;

/// Hann-windowed tone burst of `length` samples.
pub fn tone_burst(length: usize, frequency_hz: f32, sample_rate: f32, phase: f32) -> Vec<f32> {
    if length == 0 {
        return Vec::new();
    }
    let span = (length.max(2) - 1) as f32;
    (0..length)
        .map(|i| {
            let envelope = 0.5 - 0.5 * (2.0 * PI * i as f32 / span).cos();
            envelope * (2.0 * PI * frequency_hz * i as f32 / sample_rate + phase).sin()
        })
        .collect()
}

/// Gaussian click centred in a buffer of `length` samples.
pub fn click(length: usize, width_samples: f32) -> Vec<f32> {
    let centre = length as f32 / 2.0;
    let width = width_samples.max(1.0);
    (0..length)
        .map(|i| {
            let d = (i as f32 - centre) / width;
            (-d * d).exp()
        })
        .collect()
}

/// Continuous sine at `frequency_hz`.
pub fn hum(length: usize, frequency_hz: f32, sample_rate: f32) -> Vec<f32> {
    (0..length)
        .map(|i| (2.0 * PI * frequency_hz * i as f32 / sample_rate).sin())
        .collect()
}
