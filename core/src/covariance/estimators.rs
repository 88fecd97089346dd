//! Shrinkage covariance estimators.
//!
//! Every estimator blends the sample covariance `S` with a structured
//! target `T` as `λT + (1 - λ)S`. The Schäfer–Strimmer family (targets A–F)
//! picks `λ` from the empirical variance of the sample covariance entries;
//! Ledoit–Wolf, Rao–Blackwell Ledoit–Wolf and OAS shrink toward a scaled
//! identity with their own closed-form intensities.

use crate::prelude::{DetectError, DetectResult};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Target A: identity.
    SchaferA,
    /// Target B: diagonal, common variance.
    SchaferB,
    /// Target C: common variance, common covariance.
    SchaferC,
    /// Target D: diagonal, unequal variance.
    SchaferD,
    /// Target E: perfect positive correlation.
    SchaferE,
    /// Target F: constant correlation.
    SchaferF,
    LedoitWolf,
    RaoBlackwellLedoitWolf,
    OracleApproximating,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 9] = [
        EstimatorKind::SchaferA,
        EstimatorKind::SchaferB,
        EstimatorKind::SchaferC,
        EstimatorKind::SchaferD,
        EstimatorKind::SchaferE,
        EstimatorKind::SchaferF,
        EstimatorKind::LedoitWolf,
        EstimatorKind::RaoBlackwellLedoitWolf,
        EstimatorKind::OracleApproximating,
    ];
}

/// Shrunk covariance together with the shrinkage intensity that produced it.
#[derive(Debug, Clone)]
pub struct ShrinkageEstimate {
    pub matrix: Array2<f64>,
    pub intensity: f64,
}

/// Estimates a covariance from `observations` (one observation per row).
pub fn estimate(kind: EstimatorKind, observations: ArrayView2<f64>) -> DetectResult<ShrinkageEstimate> {
    let (n, p) = observations.dim();
    if n < 2 || p == 0 {
        return Err(DetectError::RuntimeDetectionFailure(format!(
            "need at least 2 observations of non-zero length, got {}x{}",
            n, p
        )));
    }
    if observations.iter().any(|v| !v.is_finite()) {
        return Err(DetectError::RuntimeDetectionFailure(
            "training observations contain non-finite values".into(),
        ));
    }

    let moments = Moments::new(observations);
    let estimate = match kind {
        EstimatorKind::SchaferA => schafer(SchaferTarget::Identity, &moments),
        EstimatorKind::SchaferB => schafer(SchaferTarget::CommonVariance, &moments),
        EstimatorKind::SchaferC => schafer(SchaferTarget::CommonCovariance, &moments),
        EstimatorKind::SchaferD => schafer(SchaferTarget::UnequalVariance, &moments),
        EstimatorKind::SchaferE => schafer(SchaferTarget::PerfectCorrelation, &moments),
        EstimatorKind::SchaferF => schafer(SchaferTarget::ConstantCorrelation, &moments),
        EstimatorKind::LedoitWolf => ledoit_wolf(&moments),
        EstimatorKind::RaoBlackwellLedoitWolf => rao_blackwell(&moments),
        EstimatorKind::OracleApproximating => oracle_approximating(&moments),
    };
    Ok(estimate)
}

/// Centered data and the cross-moment matrices shared by the estimators.
struct Moments {
    n: f64,
    p: usize,
    centered: Array2<f64>,
    /// Biased sample covariance `XᵀX / n`.
    biased: Array2<f64>,
}

impl Moments {
    fn new(observations: ArrayView2<f64>) -> Self {
        let (n, p) = observations.dim();
        let mean = observations.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let centered = &observations - &mean.insert_axis(Axis(0));
        let biased = centered.t().dot(&centered) / n as f64;
        Self {
            n: n as f64,
            p,
            centered,
            biased,
        }
    }

    fn unbiased(&self) -> Array2<f64> {
        &self.biased * (self.n / (self.n - 1.0))
    }

    /// `Var(s_ij)` for every entry of the unbiased sample covariance.
    fn entry_variance(&self) -> Array2<f64> {
        let squared = self.centered.mapv(|v| v * v);
        let fourth = squared.t().dot(&squared);
        let scale = self.n / (self.n - 1.0).powi(3);
        (&fourth - &(self.biased.mapv(|w| w * w) * self.n)) * scale
    }

    /// `Cov(s_ii, s_ij)` indexed as `[i, j]`.
    fn diagonal_cross_covariance(&self) -> Array2<f64> {
        let cubed = self.centered.mapv(|v| v * v * v);
        let third = cubed.t().dot(&self.centered);
        let diag = self.biased.diag().to_owned().insert_axis(Axis(1));
        let scale = self.n / (self.n - 1.0).powi(3);
        (&third - &(&self.biased * &diag * self.n)) * scale
    }
}

fn off_diagonal(p: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..p).flat_map(move |i| (0..p).filter(move |&j| j != i).map(move |j| (i, j)))
}

fn intensity(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && numerator.is_finite() {
        (numerator / denominator).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn blend(target: &Array2<f64>, sample: &Array2<f64>, lambda: f64) -> Array2<f64> {
    target * lambda + sample * (1.0 - lambda)
}

/// Structured targets of the Schäfer–Strimmer family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchaferTarget {
    Identity,
    CommonVariance,
    CommonCovariance,
    UnequalVariance,
    PerfectCorrelation,
    ConstantCorrelation,
}

fn schafer(target_kind: SchaferTarget, m: &Moments) -> ShrinkageEstimate {
    let p = m.p;
    let s = m.unbiased();
    let var = m.entry_variance();
    let diag: Vec<f64> = s.diag().to_vec();
    let mean_var = diag.iter().sum::<f64>() / p as f64;
    let total_var: f64 = var.sum();
    let off_var: f64 = off_diagonal(p).map(|(i, j)| var[[i, j]]).sum();

    let (target, lambda) = match target_kind {
        SchaferTarget::Identity => {
            let target = Array2::<f64>::eye(p);
            let den = off_diagonal(p).map(|(i, j)| s[[i, j]].powi(2)).sum::<f64>()
                + diag.iter().map(|d| (d - 1.0).powi(2)).sum::<f64>();
            (target, intensity(total_var, den))
        }
        SchaferTarget::CommonVariance => {
            let target = Array2::<f64>::eye(p) * mean_var;
            let den = off_diagonal(p).map(|(i, j)| s[[i, j]].powi(2)).sum::<f64>()
                + diag.iter().map(|d| (d - mean_var).powi(2)).sum::<f64>();
            (target, intensity(total_var, den))
        }
        SchaferTarget::CommonCovariance => {
            let pairs = (p * p.saturating_sub(1)).max(1) as f64;
            let mean_cov = off_diagonal(p).map(|(i, j)| s[[i, j]]).sum::<f64>() / pairs;
            let mut target = Array2::<f64>::from_elem((p, p), mean_cov);
            target.diag_mut().fill(mean_var);
            let den = off_diagonal(p)
                .map(|(i, j)| (s[[i, j]] - mean_cov).powi(2))
                .sum::<f64>()
                + diag.iter().map(|d| (d - mean_var).powi(2)).sum::<f64>();
            (target, intensity(total_var, den))
        }
        SchaferTarget::UnequalVariance => {
            let target = Array2::from_diag(&Array1::from(diag.clone()));
            let den = off_diagonal(p).map(|(i, j)| s[[i, j]].powi(2)).sum::<f64>();
            (target, intensity(off_var, den))
        }
        SchaferTarget::PerfectCorrelation | SchaferTarget::ConstantCorrelation => {
            let cross = m.diagonal_cross_covariance();
            let scale = |i: usize, j: usize| (diag[i] * diag[j]).max(0.0).sqrt();
            let correlation = if target_kind == SchaferTarget::ConstantCorrelation {
                let pairs = (p * p.saturating_sub(1)).max(1) as f64;
                off_diagonal(p)
                    .map(|(i, j)| {
                        let sc = scale(i, j);
                        if sc > 0.0 {
                            s[[i, j]] / sc
                        } else {
                            0.0
                        }
                    })
                    .sum::<f64>()
                    / pairs
            } else {
                1.0
            };

            let mut target = Array2::<f64>::zeros((p, p));
            let mut num = 0.0;
            let mut den = 0.0;
            for (i, j) in off_diagonal(p) {
                let t = correlation * scale(i, j);
                target[[i, j]] = t;
                let f = if diag[i] > 0.0 && diag[j] > 0.0 {
                    0.5 * ((diag[j] / diag[i]).sqrt() * cross[[i, j]]
                        + (diag[i] / diag[j]).sqrt() * cross[[j, i]])
                } else {
                    0.0
                };
                num += var[[i, j]] - correlation * f;
                den += (t - s[[i, j]]).powi(2);
            }
            for (i, &d) in diag.iter().enumerate() {
                target[[i, i]] = d;
            }
            (target, intensity(num, den))
        }
    };

    ShrinkageEstimate {
        matrix: blend(&target, &s, lambda),
        intensity: lambda,
    }
}

struct TraceStats {
    trace: f64,
    trace_sq: f64,
    mu: f64,
}

fn trace_stats(m: &Moments) -> TraceStats {
    let trace = m.biased.diag().sum();
    let trace_sq = m.biased.iter().map(|v| v * v).sum::<f64>();
    TraceStats {
        trace,
        trace_sq,
        mu: trace / m.p as f64,
    }
}

fn scaled_identity_blend(m: &Moments, mu: f64, rho: f64) -> ShrinkageEstimate {
    let target = Array2::<f64>::eye(m.p) * mu;
    ShrinkageEstimate {
        matrix: blend(&target, &m.biased, rho),
        intensity: rho,
    }
}

fn ledoit_wolf(m: &Moments) -> ShrinkageEstimate {
    let p = m.p as f64;
    let stats = trace_stats(m);
    let mut deviation = m.biased.clone();
    deviation.diag_mut().mapv_inplace(|v| v - stats.mu);
    let delta_sq = deviation.iter().map(|v| v * v).sum::<f64>() / p;

    let fourth: f64 = m
        .centered
        .rows()
        .into_iter()
        .map(|row| row.dot(&row).powi(2))
        .sum();
    let beta_bar_sq = (fourth - m.n * stats.trace_sq) / (m.n * m.n) / p;
    let beta_sq = beta_bar_sq.max(0.0).min(delta_sq);
    let rho = if delta_sq > 0.0 { beta_sq / delta_sq } else { 1.0 };
    scaled_identity_blend(m, stats.mu, rho)
}

fn rao_blackwell(m: &Moments) -> ShrinkageEstimate {
    let p = m.p as f64;
    let n = m.n;
    let stats = trace_stats(m);
    let num = (n - 2.0) / n * stats.trace_sq + stats.trace * stats.trace;
    let den = (n + 2.0) * (stats.trace_sq - stats.trace * stats.trace / p);
    let rho = if den > 0.0 { (num / den).clamp(0.0, 1.0) } else { 1.0 };
    scaled_identity_blend(m, stats.mu, rho)
}

fn oracle_approximating(m: &Moments) -> ShrinkageEstimate {
    let p = m.p as f64;
    let n = m.n;
    let stats = trace_stats(m);
    let num = (1.0 - 2.0 / p) * stats.trace_sq + stats.trace * stats.trace;
    let den = (n + 1.0 - 2.0 / p) * (stats.trace_sq - stats.trace * stats.trace / p);
    let rho = if den > 0.0 { (num / den).clamp(0.0, 1.0) } else { 1.0 };
    scaled_identity_blend(m, stats.mu, rho)
}
