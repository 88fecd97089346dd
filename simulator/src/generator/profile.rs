use crate::generator::template::{click, hum, tone_burst};
use acoustcore::covariance::TrainingCorpus;
use acoustcore::{PulseSchedule, SampleBuffer};
use anyhow::{ensure, Context};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Configuration for generating synthetic recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sample_rate: f64,
    pub duration_s: f64,
    /// Half-width of the uniform noise floor.
    pub noise: f32,
    pub seed: u64,
    pub first_pulse_s: f64,
    pub pulse_interval_ms: f64,
    pub pulse_duration_s: f64,
    pub pulse_frequency_hz: f32,
    pub pulse_amplitude: f32,
    pub transients: usize,
    pub transient_amplitude: f32,
    pub hum_frequency_hz: f32,
    pub hum_amplitude: f32,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000.0,
            duration_s: 20.0,
            noise: 0.02,
            seed: 0,
            first_pulse_s: 1.5,
            pulse_interval_ms: 4000.0,
            pulse_duration_s: 0.05,
            pulse_frequency_hz: 1000.0,
            pulse_amplitude: 0.5,
            transients: 3,
            transient_amplitude: 0.8,
            hum_frequency_hz: 60.0,
            hum_amplitude: 0.01,
            description: None,
        }
    }
}

impl GeneratorConfig {
    pub fn pulse_schedule(&self) -> PulseSchedule {
        PulseSchedule {
            first_pulse_s: self.first_pulse_s,
            pulse_interval_ms: self.pulse_interval_ms,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.sample_rate > 0.0, "sample rate must be positive");
        ensure!(self.duration_s > 0.0, "duration must be positive");
        ensure!(self.pulse_interval_ms > 0.0, "pulse interval must be positive");
        Ok(())
    }
}

/// One generated audio file with the side information a pulse table would supply.
pub struct SyntheticRecording {
    pub audio_file_id: String,
    pub buffer: SampleBuffer,
    pub pulse: PulseSchedule,
}

pub fn build_recording(config: &GeneratorConfig, file_index: usize) -> anyhow::Result<SyntheticRecording> {
    config.validate()?;
    let fs = config.sample_rate;
    let sample_count = (config.duration_s * fs).round() as usize;
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(file_index as u64));

    let mut samples: Vec<f32> = hum(sample_count, config.hum_frequency_hz, fs as f32)
        .into_iter()
        .map(|v| v * config.hum_amplitude + rng.gen_range(-config.noise..=config.noise))
        .collect();

    let burst_len = (config.pulse_duration_s * fs).round() as usize;
    let schedule = config.pulse_schedule();
    let mut k = 0usize;
    loop {
        let time = schedule.first_pulse_s + k as f64 * schedule.pulse_interval_ms / 1000.0;
        let start = (time * fs).round() as usize;
        if start >= sample_count {
            break;
        }
        let phase = rng.gen_range(0.0..2.0 * PI);
        let burst = tone_burst(burst_len, config.pulse_frequency_hz, fs as f32, phase);
        add_at(&mut samples, start, &burst, config.pulse_amplitude);
        k += 1;
    }

    let click_len = (0.01 * fs).round().max(1.0) as usize;
    let shape = click(click_len, click_len as f32 / 8.0);
    for _ in 0..config.transients {
        let start = rng.gen_range(0..sample_count.saturating_sub(click_len).max(1));
        add_at(&mut samples, start, &shape, config.transient_amplitude);
    }

    Ok(SyntheticRecording {
        audio_file_id: format!("synthetic-{:04}", file_index),
        buffer: SampleBuffer::new(samples, fs),
        pulse: schedule,
    })
}

fn add_at(samples: &mut [f32], start: usize, shape: &[f32], gain: f32) {
    for (dst, src) in samples.iter_mut().skip(start).zip(shape) {
        *dst += gain * src;
    }
}

/// Labeled kernels of the pulsed source (signal) and of the noise floor.
pub fn build_training_corpus(
    config: &GeneratorConfig,
    id: &str,
    kernel_len: usize,
    resample_rate: f64,
    observations: usize,
) -> anyhow::Result<TrainingCorpus> {
    ensure!(kernel_len > 1, "kernel must span more than one sample");
    let rows = observations.max(kernel_len);
    let mut rng = StdRng::seed_from_u64(config.seed ^ 0x5eed);
    let cycle = resample_rate as f32;

    let mut signal = Vec::with_capacity(rows * kernel_len);
    for _ in 0..rows {
        let phase = rng.gen_range(0.0..2.0 * PI);
        let amplitude = rng.gen_range(0.5..1.5f32);
        for i in 0..kernel_len {
            let value = (2.0 * PI * config.pulse_frequency_hz * i as f32 / cycle + phase).sin();
            signal.push((amplitude * value) as f64);
        }
    }
    let noise: Vec<f64> = (0..rows * kernel_len)
        .map(|_| rng.gen_range(-1.0..=1.0f64))
        .collect();

    let signal = Array2::from_shape_vec((rows, kernel_len), signal)
        .context("shaping signal observations")?;
    let noise = Array2::from_shape_vec((rows, kernel_len), noise)
        .context("shaping noise observations")?;
    Ok(TrainingCorpus::new(id, resample_rate, signal).with_noise(noise))
}
