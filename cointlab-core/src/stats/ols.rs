//! Ordinary least squares via Householder QR.
//!
//! Columns are scaled to unit norm before factorising, so the rank check
//! does not depend on the price level of any regressor.

use super::StatError;

/// `|R_jj|` (of the unit-norm design) below which a column is treated as
/// linearly dependent on the ones before it.
const SINGULAR_TOL: f64 = 1e-10;

/// Fitted least-squares regression.
///
/// When the design is rank deficient the fit is still returned, with NaN
/// parameters and standard errors. Callers pass that through rather than
/// failing.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub residuals: Vec<f64>,
    pub ssr: f64,
    /// Centered R²: `1 - ssr / Σ(y - ȳ)²`.
    pub r_squared: f64,
    pub nobs: usize,
    pub singular: bool,
}

impl OlsFit {
    /// t-statistic of parameter `i`.
    pub fn t_value(&self, i: usize) -> f64 {
        self.params[i] / self.std_errors[i]
    }

    /// Gaussian log-likelihood at the ML variance estimate.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, `-2 llf + 2k`.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.params.len() as f64
    }

    fn singular(n: usize, k: usize) -> Self {
        Self {
            params: vec![f64::NAN; k],
            std_errors: vec![f64::NAN; k],
            residuals: vec![f64::NAN; n],
            ssr: f64::NAN,
            r_squared: f64::NAN,
            nobs: n,
            singular: true,
        }
    }
}

/// Regress `y` on the given columns. Every column must have `y.len()` rows.
pub fn ols(y: &[f64], columns: &[&[f64]]) -> Result<OlsFit, StatError> {
    let n = y.len();
    let k = columns.len();
    if n <= k {
        return Err(StatError::InsufficientObservations {
            needed: k + 1,
            got: n,
        });
    }
    if let Some(col) = columns.iter().find(|c| c.len() != n) {
        return Err(StatError::LengthMismatch {
            left: n,
            right: col.len(),
        });
    }

    let norms: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();
    if norms.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
        return Ok(OlsFit::singular(n, k));
    }

    // a[j] is column j, overwritten by R above the diagonal
    let mut a: Vec<Vec<f64>> = columns
        .iter()
        .zip(&norms)
        .map(|(c, s)| c.iter().map(|v| v / s).collect())
        .collect();
    let mut qty = y.to_vec();
    let mut r_diag = vec![0.0; k];

    for j in 0..k {
        let norm = a[j][j..].iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= SINGULAR_TOL {
            return Ok(OlsFit::singular(n, k));
        }
        let alpha = if a[j][j] > 0.0 { -norm } else { norm };
        let mut v: Vec<f64> = a[j][j..].to_vec();
        v[0] -= alpha;
        let v_norm2: f64 = v.iter().map(|x| x * x).sum();
        if v_norm2 > 0.0 {
            for col in a.iter_mut().skip(j) {
                reflect(&v, v_norm2, &mut col[j..]);
            }
            reflect(&v, v_norm2, &mut qty[j..]);
        }
        r_diag[j] = alpha;
    }

    // back substitution for the scaled coefficients, then R⁻¹ for the covariance
    let r = |i: usize, j: usize| if i == j { r_diag[i] } else { a[j][i] };
    let mut scaled = vec![0.0; k];
    for i in (0..k).rev() {
        let tail: f64 = (i + 1..k).map(|j| r(i, j) * scaled[j]).sum();
        scaled[i] = (qty[i] - tail) / r(i, i);
    }
    let mut r_inv = vec![vec![0.0; k]; k];
    for col in 0..k {
        for i in (0..=col).rev() {
            let unit = if i == col { 1.0 } else { 0.0 };
            let tail: f64 = (i + 1..=col).map(|j| r(i, j) * r_inv[j][col]).sum();
            r_inv[i][col] = (unit - tail) / r(i, i);
        }
    }

    let params: Vec<f64> = scaled.iter().zip(&norms).map(|(b, s)| b / s).collect();
    let residuals: Vec<f64> = (0..n)
        .map(|t| {
            let fitted: f64 = columns.iter().zip(&params).map(|(c, b)| c[t] * b).sum();
            y[t] - fitted
        })
        .collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (0..k)
        .map(|i| {
            let diag: f64 = r_inv[i][i..].iter().map(|v| v * v).sum();
            (sigma2 * diag).sqrt() / norms[i]
        })
        .collect();

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();

    Ok(OlsFit {
        params,
        std_errors,
        residuals,
        ssr,
        r_squared: 1.0 - ssr / tss,
        nobs: n,
        singular: false,
    })
}

/// Apply the Householder reflection `I - 2 v vᵀ / (vᵀv)` to `target`.
fn reflect(v: &[f64], v_norm2: f64, target: &mut [f64]) {
    let dot: f64 = v.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    let factor = 2.0 * dot / v_norm2;
    for (t, vi) in target.iter_mut().zip(v) {
        *t -= factor * vi;
    }
}
