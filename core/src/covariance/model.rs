use crate::covariance::estimators::{estimate, EstimatorKind};
use crate::math::matrix::{MatrixHelper, SymmetricEigen};
use crate::prelude::{DetectError, DetectResult};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Labeled training segments for the estimator-correlator detectors.
///
/// Each row is one kernel-length observation sampled at `sample_rate`.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    pub id: String,
    pub sample_rate: f64,
    pub signal: Array2<f64>,
    pub noise: Option<Array2<f64>>,
}

impl TrainingCorpus {
    pub fn new(id: impl Into<String>, sample_rate: f64, signal: Array2<f64>) -> Self {
        Self {
            id: id.into(),
            sample_rate,
            signal,
            noise: None,
        }
    }

    pub fn with_noise(mut self, noise: Array2<f64>) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Checks that both sets hold at least `kernel_len` observations of
    /// exactly `kernel_len` samples.
    pub fn validate(&self, kernel_len: usize, require_noise: bool) -> DetectResult<()> {
        check_observations("signal", self.signal.view(), kernel_len)?;
        match (&self.noise, require_noise) {
            (Some(noise), _) => check_observations("noise", noise.view(), kernel_len),
            (None, true) => Err(DetectError::ConfigurationInvalid(format!(
                "training corpus {} has no noise observations",
                self.id
            ))),
            (None, false) => Ok(()),
        }
    }
}

fn check_observations(label: &str, rows: ArrayView2<f64>, kernel_len: usize) -> DetectResult<()> {
    let (count, width) = rows.dim();
    if width != kernel_len {
        return Err(DetectError::ConfigurationInvalid(format!(
            "{} observations have {} samples, kernel needs {}",
            label, width, kernel_len
        )));
    }
    if count < kernel_len {
        return Err(DetectError::ConfigurationInvalid(format!(
            "{} corpus has {} observations, fewer than kernel length {}",
            label, count, kernel_len
        )));
    }
    Ok(())
}

/// Immutable covariance model: unit-average-variance matrix, its
/// eigendecomposition, and the variance it was normalized by.
#[derive(Debug, Clone)]
pub struct CovarianceModel {
    pub estimator: EstimatorKind,
    pub matrix: Array2<f64>,
    pub eigen: SymmetricEigen,
    pub variance: f64,
    pub shrinkage: f64,
}

impl CovarianceModel {
    pub fn train(estimator: EstimatorKind, observations: ArrayView2<f64>) -> DetectResult<Self> {
        let shrunk = estimate(estimator, observations)?;
        Self::from_matrix(estimator, shrunk.matrix, shrunk.intensity)
    }

    /// Normalizes `matrix` to unit average variance and decomposes it.
    pub fn from_matrix(
        estimator: EstimatorKind,
        mut matrix: Array2<f64>,
        shrinkage: f64,
    ) -> DetectResult<Self> {
        let dim = matrix.nrows();
        if dim == 0 {
            return Err(DetectError::RuntimeDetectionFailure(
                "empty covariance matrix".into(),
            ));
        }
        MatrixHelper::symmetrize(&mut matrix);
        let variance = matrix.diag().sum() / dim as f64;
        if !variance.is_finite() || variance <= 0.0 {
            return Err(DetectError::RuntimeDetectionFailure(format!(
                "degenerate covariance (average variance {})",
                variance
            )));
        }
        matrix /= variance;

        let mut eigen = MatrixHelper::symmetric_eigen(matrix.view()).ok_or_else(|| {
            DetectError::RuntimeDetectionFailure("covariance eigendecomposition failed".into())
        })?;
        eigen.values.mapv_inplace(|v| v.max(0.0));

        Ok(Self {
            estimator,
            matrix,
            eigen,
            variance,
            shrinkage,
        })
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn eigenvalues(&self) -> ArrayView1<f64> {
        self.eigen.values.view()
    }

    /// Whitening transform `C^{-1/2}` with eigenvalues floored relative to the largest.
    pub fn whitener(&self) -> Array2<f64> {
        let largest = self.eigen.values.iter().copied().fold(0.0, f64::max);
        let floor = (largest * 1e-8).max(f64::MIN_POSITIVE);
        MatrixHelper::inverse_sqrt(&self.eigen, floor)
    }

    /// Signal model expressed in the coordinates whitened by `noise`.
    pub fn prewhitened(&self, noise: &CovarianceModel) -> DetectResult<CovarianceModel> {
        if noise.dim() != self.dim() {
            return Err(DetectError::RuntimeDetectionFailure(format!(
                "signal model dimension {} does not match noise model {}",
                self.dim(),
                noise.dim()
            )));
        }
        let w = noise.whitener();
        let whitened = w.dot(&self.matrix).dot(&w);
        CovarianceModel::from_matrix(self.estimator, whitened, self.shrinkage)
    }
}
