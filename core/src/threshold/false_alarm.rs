//! Neyman-Pearson operating points read off PFA/PD curves.

use crate::math::special::{
    chi2_isf, chi2_sf, gamma_isf, gamma_sf, invert_survival, noncentral_chi2_sf,
};
use ndarray::ArrayView2;

/// Detection probability pinned by `sensitivity = 0`.
pub const PD_CEILING: f64 = 0.99999;

/// Test-statistic distributions under noise only (H0) and signal plus noise (H1).
#[derive(Debug, Clone, PartialEq)]
pub enum OperatingCurves {
    /// Energy detector: central / non-central chi-squared.
    Energy { dof: f64, noncentrality: f64 },
    /// Weighted sum of chi-squared(1) terms, moment-matched to gamma laws.
    Weighted { h0: GammaLaw, h1: GammaLaw },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaLaw {
    pub shape: f64,
    pub scale: f64,
}

impl GammaLaw {
    /// Gamma law with the mean and variance of `Σ aᵢ χ²₁`.
    pub fn from_weights(weights: impl Iterator<Item = f64>) -> Option<Self> {
        let (sum, sum_sq) = weights
            .filter(|w| w.is_finite() && *w > 0.0)
            .fold((0.0, 0.0), |(s, q), w| (s + w, q + w * w));
        if sum <= 0.0 || sum_sq <= 0.0 {
            return None;
        }
        Some(Self {
            shape: sum * sum / (2.0 * sum_sq),
            scale: 2.0 * sum_sq / sum,
        })
    }
}

impl OperatingCurves {
    /// Energy detector with `dof` degrees of freedom at linear design SNR `snr`.
    pub fn energy(dof: f64, snr: f64) -> Self {
        OperatingCurves::Energy {
            dof,
            noncentrality: dof * snr.max(0.0),
        }
    }

    /// Estimator-correlator with normalized eigenvalues `eigenvalues` at design SNR `snr`.
    pub fn estimator_correlator(eigenvalues: &[f64], snr: f64) -> Option<Self> {
        let weights: Vec<f64> = eigenvalues
            .iter()
            .map(|&l| correlator_weight(l, snr))
            .collect();
        let h0 = GammaLaw::from_weights(weights.iter().copied())?;
        let h1 = GammaLaw::from_weights(
            weights
                .iter()
                .zip(eigenvalues)
                .map(|(&w, &l)| w * (snr * l.max(0.0) + 1.0)),
        )?;
        Some(OperatingCurves::Weighted { h0, h1 })
    }

    pub fn false_alarm_probability(&self, threshold: f64) -> f64 {
        match self {
            OperatingCurves::Energy { dof, .. } => chi2_sf(threshold, *dof),
            OperatingCurves::Weighted { h0, .. } => gamma_sf(threshold, h0.shape, h0.scale),
        }
    }

    pub fn detection_probability(&self, threshold: f64) -> f64 {
        match self {
            OperatingCurves::Energy { dof, noncentrality } => {
                noncentral_chi2_sf(threshold, *dof, *noncentrality)
            }
            OperatingCurves::Weighted { h1, .. } => gamma_sf(threshold, h1.shape, h1.scale),
        }
    }

    fn threshold_for_pfa(&self, pfa: f64) -> f64 {
        match self {
            OperatingCurves::Energy { dof, .. } => chi2_isf(pfa, *dof),
            OperatingCurves::Weighted { h0, .. } => gamma_isf(pfa, h0.shape, h0.scale),
        }
    }

    fn threshold_for_pd(&self, pd: f64) -> f64 {
        invert_survival(|x| self.detection_probability(x), pd)
    }
}

/// Degrees of freedom of the chi-squared law matching the first two moments
/// of `zᵀz` for `z ~ N(0, C)`: `tr(C)² / tr(C²)`. Equals the dimension for
/// white kernels and shrinks as the samples become correlated.
pub fn effective_dof(covariance: ArrayView2<f64>) -> Option<f64> {
    let trace = covariance.diag().sum();
    let trace_sq = covariance.iter().map(|v| v * v).sum::<f64>();
    if !(trace > 0.0 && trace_sq > 0.0 && trace.is_finite() && trace_sq.is_finite()) {
        return None;
    }
    Some(trace * trace / trace_sq)
}

/// Estimator-correlator weight of one eigen-direction.
pub fn correlator_weight(eigenvalue: f64, snr: f64) -> f64 {
    let scaled = snr.max(0.0) * eigenvalue.max(0.0);
    scaled / (scaled + 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub threshold: f64,
    pub pfa_threshold: f64,
    pub pd_threshold: f64,
    pub achieved_pfa: f64,
    pub achieved_pd: f64,
}

/// Interpolates between the `target_pfa` point on the H0 curve
/// (`sensitivity = 1`) and the `PD_CEILING` point on the H1 curve
/// (`sensitivity = 0`).
pub fn calibrate(curves: &OperatingCurves, target_pfa: f64, sensitivity: f64) -> Calibration {
    let sensitivity = sensitivity.clamp(0.0, 1.0);
    let pfa_threshold = curves.threshold_for_pfa(target_pfa);
    let pd_threshold = curves.threshold_for_pd(PD_CEILING);
    let threshold = sensitivity * pfa_threshold + (1.0 - sensitivity) * pd_threshold;
    Calibration {
        threshold,
        pfa_threshold,
        pd_threshold,
        achieved_pfa: curves.false_alarm_probability(threshold),
        achieved_pd: curves.detection_probability(threshold),
    }
}
