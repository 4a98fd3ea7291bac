//! MacKinnon (1994) approximate p-values for unit-root and cointegration
//! t-statistics.
//!
//! Response-surface coefficients for one and two variables. Below `tau_star`
//! the small-p polynomial applies, above it the large-p one; the p-value is
//! the standard normal CDF of the polynomial.

use serde::{Deserialize, Serialize};

/// Deterministic terms in the cointegrating regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSpec {
    /// Constant only (`c`).
    Constant,
    /// Constant and linear trend (`ct`).
    ConstantTrend,
}

struct Surface {
    tau_star: f64,
    tau_min: f64,
    tau_max: f64,
    small_p: [f64; 3],
    large_p: [f64; 4],
}

const SMALL_P_SCALE: [f64; 3] = [1.0, 1.0, 1e-2];
const LARGE_P_SCALE: [f64; 4] = [1.0, 1e-1, 1e-1, 1e-2];

const CONSTANT: [Surface; 2] = [
    Surface {
        tau_star: -1.61,
        tau_min: -18.83,
        tau_max: 2.74,
        small_p: [2.1659, 1.4412, 3.8269],
        large_p: [1.7339, 9.3202, -1.2745, -1.0368],
    },
    Surface {
        tau_star: -2.62,
        tau_min: -18.86,
        tau_max: 0.92,
        small_p: [2.92, 1.5012, 3.9796],
        large_p: [2.1945, 6.4695, -2.9198, -4.2377],
    },
];

const CONSTANT_TREND: [Surface; 2] = [
    Surface {
        tau_star: -2.89,
        tau_min: -16.18,
        tau_max: 0.7,
        small_p: [3.2512, 1.6047, 4.9588],
        large_p: [2.5261, 6.1654, -3.7956, -6.0285],
    },
    Surface {
        tau_star: -3.19,
        tau_min: -21.15,
        tau_max: 0.63,
        small_p: [3.6646, 1.5419, 3.6448],
        large_p: [3.0778, 4.9529, -4.1477, -5.9359],
    },
];

/// Largest number of variables with tabulated coefficients.
pub const MAX_VARIABLES: usize = 2;

/// p-value for statistic `stat` with `n_vars` integrated variables
/// (1 for a plain unit-root test, 2 for a pairwise cointegration test).
///
/// Returns `None` when `n_vars` is outside `1..=MAX_VARIABLES`. A NaN
/// statistic gives a NaN p-value.
pub fn mackinnon_p_value(stat: f64, trend: TrendSpec, n_vars: usize) -> Option<f64> {
    let table = match trend {
        TrendSpec::Constant => &CONSTANT,
        TrendSpec::ConstantTrend => &CONSTANT_TREND,
    };
    let surface = table.get(n_vars.checked_sub(1)?)?;

    if stat > surface.tau_max {
        return Some(1.0);
    }
    if stat < surface.tau_min {
        return Some(0.0);
    }
    let z = if stat <= surface.tau_star {
        poly(&surface.small_p, &SMALL_P_SCALE, stat)
    } else {
        poly(&surface.large_p, &LARGE_P_SCALE, stat)
    };
    Some(norm_cdf(z))
}

fn poly(coefs: &[f64], scale: &[f64], x: f64) -> f64 {
    coefs
        .iter()
        .zip(scale)
        .rev()
        .fold(0.0, |acc, (c, s)| acc * x + c * s)
}

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
pub fn norm_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * z);
    let erf = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();
    0.5 * (1.0 + sign * erf)
}
