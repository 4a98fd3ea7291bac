//! Engle-Granger two-step cointegration test.

use serde::{Deserialize, Serialize};

use super::adf::adf_no_constant;
use super::mackinnon::{mackinnon_p_value, TrendSpec};
use super::ols::ols;
use super::{CointegrationTest, StatError};

/// Full outcome of one Engle-Granger test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointResult {
    /// ADF t-statistic of the cointegrating residuals.
    pub statistic: f64,
    pub p_value: f64,
    /// Lagged differences chosen by AIC; `None` when the ADF step was skipped.
    pub used_lag: Option<usize>,
    pub nobs: usize,
    /// R² of the cointegrating regression.
    pub r_squared: f64,
}

/// Regress `y` on `x` plus deterministic terms, then test the residuals for
/// a unit root. H0 is "no cointegration".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngleGranger {
    pub trend: TrendSpec,
    /// Fixed ADF lag ceiling; `None` uses the sample-size schedule.
    pub max_lag: Option<usize>,
}

impl Default for EngleGranger {
    fn default() -> Self {
        Self {
            trend: TrendSpec::ConstantTrend,
            max_lag: None,
        }
    }
}

impl EngleGranger {
    pub fn new(trend: TrendSpec) -> Self {
        Self {
            trend,
            max_lag: None,
        }
    }

    pub fn with_max_lag(mut self, max_lag: usize) -> Self {
        self.max_lag = Some(max_lag);
        self
    }

    pub fn test(&self, y: &[f64], x: &[f64]) -> Result<CointResult, StatError> {
        if y.len() != x.len() {
            return Err(StatError::LengthMismatch {
                left: y.len(),
                right: x.len(),
            });
        }
        if let Some(index) = y.iter().chain(x).position(|v| !v.is_finite()) {
            return Err(StatError::NonFinite {
                index: index % y.len().max(1),
            });
        }

        let n = y.len();
        let ones = vec![1.0; n];
        let trend: Vec<f64> = (1..=n).map(|t| t as f64).collect();
        let columns: Vec<&[f64]> = match self.trend {
            TrendSpec::Constant => vec![x, ones.as_slice()],
            TrendSpec::ConstantTrend => vec![x, ones.as_slice(), trend.as_slice()],
        };
        let fit = ols(y, &columns)?;

        if fit.singular {
            return Ok(CointResult {
                statistic: f64::NAN,
                p_value: f64::NAN,
                used_lag: None,
                nobs: n,
                r_squared: fit.r_squared,
            });
        }

        // A NaN R² (constant y) counts as a perfect fit.
        let collinear = !(fit.r_squared < 1.0 - 100.0 * f64::EPSILON.sqrt());
        let (statistic, used_lag) = if collinear {
            (f64::NEG_INFINITY, None)
        } else {
            let adf = adf_no_constant(&fit.residuals, self.max_lag)?;
            (adf.statistic, Some(adf.used_lag))
        };

        let p_value = mackinnon_p_value(statistic, self.trend, 2).unwrap_or(f64::NAN);
        Ok(CointResult {
            statistic,
            p_value,
            used_lag,
            nobs: n,
            r_squared: fit.r_squared,
        })
    }
}

impl CointegrationTest for EngleGranger {
    fn name(&self) -> &str {
        match self.trend {
            TrendSpec::Constant => "engle-granger-c",
            TrendSpec::ConstantTrend => "engle-granger-ct",
        }
    }

    fn p_value(&self, y: &[f64], x: &[f64]) -> Result<f64, StatError> {
        self.test(y, x).map(|r| r.p_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn walk(rng: &mut StdRng, n: usize, start: f64) -> Vec<f64> {
        let mut level = start;
        (0..n)
            .map(|_| {
                level += rng.gen_range(-1.0..1.0);
                level
            })
            .collect()
    }

    #[test]
    fn cointegrated_pair_has_small_p() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = walk(&mut rng, 250, 100.0);
        let y: Vec<f64> = x
            .iter()
            .map(|v| 5.0 + 0.8 * v + rng.gen_range(-0.5..0.5))
            .collect();

        let result = EngleGranger::default().test(&y, &x).unwrap();
        assert!(result.p_value < 0.01, "p = {}", result.p_value);
        assert!(result.statistic < -4.0);
    }

    #[test]
    fn independent_walks_have_large_p() {
        let mut rng = StdRng::seed_from_u64(9);
        let x = walk(&mut rng, 250, 100.0);
        let y = walk(&mut rng, 250, 80.0);

        let p = EngleGranger::default().p_value(&y, &x).unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert!(p > 0.01, "p = {p}");
    }

    #[test]
    fn exact_linear_relation_is_collinear() {
        let x: Vec<f64> = (0..60).map(|i| (i as f64 * 0.3).sin() * 10.0 + 50.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();

        let result = EngleGranger::default().test(&y, &x).unwrap();
        assert_eq!(result.statistic, f64::NEG_INFINITY);
        assert_eq!(result.p_value, 0.0);
        assert_eq!(result.used_lag, None);
    }

    #[test]
    fn x_proportional_to_trend_is_singular() {
        let x: Vec<f64> = (1..=60).map(|t| 2.0 * t as f64).collect();
        let y: Vec<f64> = (0..60).map(|i| (i as f64).cos()).collect();

        let result = EngleGranger::default().test(&y, &x).unwrap();
        assert!(result.statistic.is_nan());
        assert!(result.p_value.is_nan());
    }

    #[test]
    fn p_value_does_not_depend_on_price_level() {
        let mut rng = StdRng::seed_from_u64(5);
        let x = walk(&mut rng, 60, 100.0);
        let y = walk(&mut rng, 60, 50.0);
        let test = EngleGranger::default();
        let base = test.p_value(&y, &x).unwrap();
        assert!(base.is_finite());

        for scale in [1e6, 1e-9] {
            let xs: Vec<f64> = x.iter().map(|v| v * scale).collect();
            let ys: Vec<f64> = y.iter().map(|v| v * scale).collect();
            let both = test.p_value(&ys, &xs).unwrap();
            let only_x = test.p_value(&y, &xs).unwrap();
            assert!((both - base).abs() < 1e-6, "scale {scale}: {both} vs {base}");
            assert!((only_x - base).abs() < 1e-6, "scale {scale}: {only_x} vs {base}");
        }
    }

    #[test]
    fn high_priced_regressor_is_not_singular() {
        let mut rng = StdRng::seed_from_u64(5);
        let x: Vec<f64> = walk(&mut rng, 60, 0.0)
            .iter()
            .map(|v| 3e6 * (1.0 + 0.001 * v))
            .collect();
        let y = walk(&mut rng, 60, 1.0);

        let result = EngleGranger::default().test(&y, &x).unwrap();
        assert!(result.statistic.is_finite());
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn small_windows_never_run_out_of_observations() {
        let mut rng = StdRng::seed_from_u64(17);
        let x = walk(&mut rng, 40, 100.0);
        let y = walk(&mut rng, 40, 60.0);
        for w in 4..=40 {
            let result = EngleGranger::default().p_value(&y[..w], &x[..w]);
            assert!(result.is_ok(), "window {w}: {result:?}");
        }
    }

    #[test]
    fn mismatched_lengths() {
        let err = EngleGranger::default().p_value(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err, StatError::LengthMismatch { left: 2, right: 1 });
    }

    #[test]
    fn two_points_are_not_enough() {
        let err = EngleGranger::default().p_value(&[1.0, 2.0], &[3.0, 5.0]).unwrap_err();
        assert!(matches!(err, StatError::InsufficientObservations { .. }));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let err = EngleGranger::default()
            .p_value(&[1.0, f64::NAN, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0])
            .unwrap_err();
        assert_eq!(err, StatError::NonFinite { index: 1 });
    }

    #[test]
    fn names() {
        assert_eq!(EngleGranger::default().name(), "engle-granger-ct");
        assert_eq!(EngleGranger::new(TrendSpec::Constant).name(), "engle-granger-c");
    }
}
