//! Export — CSV result tables.

use std::path::Path;

use anyhow::{Context, Result};
use cointlab_core::domain::CointegrationRecord;

// ─── CSV export ─────────────────────────────────────────────────────

/// Export records as CSV.
///
/// Columns: symbol_one, symbol_two, date, window_size, p_value.
/// Untestable windows are written as `-1`, NaN p-values as `NaN`.
pub fn export_records_csv(records: &[CointegrationRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["symbol_one", "symbol_two", "date", "window_size", "p_value"])?;

    for r in records {
        wtr.write_record([
            &r.symbol_one,
            &r.symbol_two,
            &r.date.to_string(),
            &r.window_size.to_string(),
            &r.p_value.to_stored().to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// Write records as CSV to `path`, creating parent directories.
pub fn save_records_csv(records: &[CointegrationRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let csv = export_records_csv(records)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}
