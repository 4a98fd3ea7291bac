//! Augmented Dickey-Fuller regression without deterministic terms.
//!
//! `Δx_t = γ x_{t-1} + Σ_{j=1..p} φ_j Δx_{t-j} + ε_t`, with `p` picked by AIC.
//! Used on cointegrating residuals, which are already demeaned and detrended.

use super::ols::{ols, OlsFit};
use super::StatError;

/// Outcome of an ADF regression.
#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    /// t-value of γ.
    pub statistic: f64,
    /// Number of lagged differences in the final regression.
    pub used_lag: usize,
    /// Rows in the final regression.
    pub nobs: usize,
    /// Largest lag considered during selection.
    pub max_lag: usize,
}

/// Default lag ceiling: `min(⌈12 (n/100)^¼⌉, n/2 − 1)`.
pub fn default_max_lag(n: usize) -> Result<usize, StatError> {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let cap = (n / 2)
        .checked_sub(1)
        .ok_or(StatError::InsufficientObservations { needed: 2, got: n })?;
    Ok(schwert.min(cap))
}

/// Run the ADF regression on `x`, choosing the lag by AIC.
///
/// Every candidate lag is fitted on the same sample (trimmed by `max_lag`) so
/// the criteria are comparable; ties go to the smaller lag. Lags with no
/// residual degrees of freedom on that sample are not candidates. The chosen
/// lag is then refitted on its own, longer sample.
pub fn adf_no_constant(x: &[f64], max_lag: Option<usize>) -> Result<AdfResult, StatError> {
    let n = x.len();
    let max_lag = match max_lag {
        Some(lag) => lag,
        None => default_max_lag(n)?,
    };
    if n < max_lag + 3 {
        return Err(StatError::InsufficientObservations {
            needed: max_lag + 3,
            got: n,
        });
    }

    let diff: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    let (dep, cols) = design(x, &diff, max_lag, max_lag);
    let mut best_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=max_lag {
        // the common sample cannot identify this many regressors
        if dep.len() <= lag + 1 {
            break;
        }
        let views: Vec<&[f64]> = cols[..=lag].iter().map(Vec::as_slice).collect();
        let aic = ols(&dep, &views)?.aic();
        if aic < best_aic {
            best_aic = aic;
            best_lag = lag;
        }
    }

    let fit = fit_with_lag(x, &diff, best_lag)?;
    Ok(AdfResult {
        statistic: fit.t_value(0),
        used_lag: best_lag,
        nobs: fit.nobs,
        max_lag,
    })
}

fn fit_with_lag(x: &[f64], diff: &[f64], lag: usize) -> Result<OlsFit, StatError> {
    let (dep, cols) = design(x, diff, lag, lag);
    let views: Vec<&[f64]> = cols.iter().map(Vec::as_slice).collect();
    ols(&dep, &views)
}

/// Dependent vector and regressor columns `[x_{t}, Δx_{t-1}, .., Δx_{t-lags}]`
/// for `Δx_t = x_{t+1} - x_t`, starting at `t = trim`.
fn design(x: &[f64], diff: &[f64], trim: usize, lags: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let rows = trim..diff.len();
    let dep: Vec<f64> = diff[rows.clone()].to_vec();
    let mut cols = Vec::with_capacity(lags + 1);
    cols.push(x[rows.clone()].to_vec());
    for j in 1..=lags {
        cols.push(rows.clone().map(|t| diff[t - j]).collect());
    }
    (dep, cols)
}
