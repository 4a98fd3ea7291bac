//! Panel loading for the engine.
//!
//! Given the symbols referenced by the pair list, loads closes from a
//! `PanelSource` and aligns them onto one date axis. The synthetic source
//! is a developer-only mode: its closes are fake and every run on them is
//! tagged as synthetic.

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

use cointlab_core::data::{align_points, AlignedPanel, DataError, PanelSource};
use cointlab_core::domain::PricePoint;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("panel source '{source_name}' failed: {error}")]
    Source {
        source_name: String,
        #[source]
        error: DataError,
    },
}

/// An aligned panel plus its provenance.
#[derive(Debug)]
pub struct LoadedPanel {
    pub panel: AlignedPanel,
    /// BLAKE3 over the aligned panel.
    pub dataset_hash: String,
    pub source: String,
    pub has_synthetic: bool,
    pub points_loaded: usize,
}

/// Load and align closes for `symbols` from `source`.
///
/// Symbols the source has no data for are simply absent from the panel;
/// the planner reports them as a configuration error.
pub fn load_panel(source: &dyn PanelSource, symbols: &[String]) -> Result<LoadedPanel, LoadError> {
    let points = source
        .load_points(symbols)
        .map_err(|error| LoadError::Source {
            source_name: source.name().to_string(),
            error,
        })?;
    let points_loaded = points.len();
    let panel = align_points(points);
    let dataset_hash = panel.dataset_hash();

    if source.is_synthetic() {
        warn!(source = source.name(), "panel is synthetic; results are tagged");
    }
    info!(
        source = source.name(),
        symbols = panel.symbols.len(),
        dates = panel.len(),
        points = points_loaded,
        "panel loaded"
    );

    Ok(LoadedPanel {
        panel,
        dataset_hash,
        source: source.name().to_string(),
        has_synthetic: source.is_synthetic(),
        points_loaded,
    })
}

/// Deterministic random-walk closes for any requested symbol.
#[derive(Debug, Clone)]
pub struct SyntheticPanel {
    pub start: NaiveDate,
    pub days: usize,
}

impl SyntheticPanel {
    pub fn new(start: NaiveDate, days: usize) -> Self {
        Self { start, days }
    }

    /// Closes ending yesterday (UTC), `days` long.
    pub fn trailing(days: usize) -> Self {
        let today = chrono::Utc::now().date_naive();
        Self::new(today - Duration::days(days as i64), days)
    }
}

impl PanelSource for SyntheticPanel {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load_points(&self, symbols: &[String]) -> Result<Vec<PricePoint>, DataError> {
        Ok(symbols
            .iter()
            .flat_map(|s| generate_synthetic_closes(s, self.start, self.days))
            .collect())
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

/// Generate synthetic daily closes for testing/development.
///
/// A shared market factor plus a symbol-specific walk, so some pairs drift
/// together. Seeded from the symbol name with BLAKE3.
fn generate_synthetic_closes(symbol: &str, start: NaiveDate, days: usize) -> Vec<PricePoint> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut market = StdRng::from_seed(*blake3::hash(b"synthetic-market").as_bytes());
    let mut own = StdRng::from_seed(*blake3::hash(symbol.as_bytes()).as_bytes());

    let beta: f64 = own.gen_range(0.5..1.5);
    let mut log_price = own.gen_range(0.0_f64..5.0);

    (0..days)
        .map(|i| {
            let market_return: f64 = market.gen_range(-0.02..0.02);
            let idiosyncratic: f64 = own.gen_range(-0.015..0.015);
            log_price += beta * market_return + idiosyncratic;
            PricePoint::new(start + Duration::days(i as i64), symbol, log_price.exp())
        })
        .collect()
}
