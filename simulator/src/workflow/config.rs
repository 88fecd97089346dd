use crate::generator::profile::GeneratorConfig;
use acoustcore::covariance::EstimatorKind;
use acoustcore::processing::BandLimits;
use acoustcore::records::{
    ConfigEntry, ConstantRateConfig, DetectorConfig, MovingAverageConfig, NeymanPearsonConfig,
    NeymanPearsonKind, SliceConfig,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Training corpus to synthesize for one source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusRecipe {
    pub source_name: String,
    pub kernel_duration: f64,
    pub resample_rate: f64,
    #[serde(default = "default_observations")]
    pub observations: usize,
}

fn default_observations() -> usize {
    256
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub files: usize,
    pub jobs: usize,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub corpora: Vec<CorpusRecipe>,
    pub entries: Vec<ConfigEntry>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Built-in workflow exercising every strategy against the generator's pulsed source.
    pub fn from_args(files: usize, jobs: usize, output_dir: PathBuf, seed: u64) -> Self {
        let generator = GeneratorConfig {
            seed,
            ..Default::default()
        };
        let band = Some(BandLimits::new(500.0, 1500.0));
        let entries = vec![
            ConfigEntry::detector(
                "hydrophone-a",
                "ambient",
                DetectorConfig::Slice(SliceConfig {
                    window_duration: 5.0,
                }),
            ),
            ConfigEntry::detector(
                "hydrophone-a",
                "pinger",
                DetectorConfig::ConstantRate(ConstantRateConfig {
                    window_duration: 0.2,
                    window_offset: Some(0.05),
                }),
            ),
            ConfigEntry::detector(
                "hydrophone-b",
                "pinger",
                DetectorConfig::MovingAverage(MovingAverageConfig {
                    window_duration: 0.1,
                    window_offset: 0.02,
                    threshold: None,
                    cutoff_freqs: band,
                }),
            ),
            ConfigEntry::detector(
                "hydrophone-c",
                "pinger",
                DetectorConfig::NeymanPearson(NeymanPearsonConfig {
                    kind: NeymanPearsonKind::Ecw,
                    kernel_duration: 0.008,
                    window_duration: 0.1,
                    window_offset: 0.02,
                    target_pfa: 1e-3,
                    sensitivity: 0.9,
                    min_snr_level: Some(0.0),
                    cutoff_freqs: band,
                    estimator: EstimatorKind::OracleApproximating,
                    resample_rate: 4000.0,
                }),
            ),
            ConfigEntry::mirror("hydrophone-d", "pinger", "hydrophone-b"),
        ];
        Self {
            files,
            jobs,
            output_dir,
            corpora: vec![CorpusRecipe {
                source_name: "pinger".into(),
                kernel_duration: 0.008,
                resample_rate: 4000.0,
                observations: default_observations(),
            }],
            generator,
            entries,
        }
    }
}
