//! End-to-end runs against a real SQLite file: kline ingestion, full and
//! incremental runs, invocation status, export.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::path::Path;

use cointlab_core::data::{load_kline_file, PanelSource, ParquetCache};
use cointlab_core::domain::{CointegrationRecord, PValue};
use cointlab_core::stats::EngleGranger;
use cointlab_runner::{
    export_records_csv, handle_invocation, Collaborators, Engine, EngineOptions, MemoryStore,
    ResultSink, SqliteStore,
};

// ── Helpers ──────────────────────────────────────────────────────────

const DAY_MS: i64 = 86_400_000;
// 2023-01-01T00:00:00Z
const START_MS: i64 = 1_672_531_200_000;

/// Write a Binance-style kline file with `days` rows.
fn write_klines(dir: &Path, symbol: &str, days: usize, phase: f64, gap: Option<usize>) {
    let rows: Vec<String> = (0..days)
        .filter(|i| Some(*i) != gap)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + t * 0.05 + (t * 0.3 + phase).sin() * 3.0 + (t * 0.07).cos();
            let open_ms = START_MS + i as i64 * DAY_MS;
            format!(
                r#"[{open_ms},"{o:.4}","{h:.4}","{l:.4}","{close:.4}","1000.0",{close_ms},"100000.0",512,"500.0","50000.0","0"]"#,
                o = close - 0.5,
                h = close + 1.0,
                l = close - 1.0,
                close_ms = open_ms + DAY_MS - 1,
            )
        })
        .collect();
    std::fs::write(dir.join(format!("{symbol}.json")), format!("[{}]", rows.join(","))).unwrap();
}

fn ingest(store: &SqliteStore, dir: &Path, symbols: &[&str]) {
    for symbol in symbols {
        let bars = load_kline_file(&dir.join(format!("{symbol}.json"))).unwrap();
        store.upsert_bars(&bars).unwrap();
    }
}

fn engine(window_size: usize) -> Engine<EngleGranger> {
    Engine::new(
        EngleGranger::default(),
        EngineOptions {
            window_size,
            threads: 2,
            deadline: None,
        },
    )
    .unwrap()
}

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(n)
}

// ── Full and incremental runs ────────────────────────────────────────

#[test]
fn ingest_then_full_then_incremental_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("coint.db")).unwrap();

    for (symbol, phase) in [("BTCUSDT", 0.0), ("ETHUSDT", 0.4), ("SOLUSDT", 1.3)] {
        write_klines(dir.path(), symbol, 90, phase, None);
    }
    ingest(&store, dir.path(), &["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let first = engine(60)
        .run_and_persist(&["BTCUSDT"], &["ETHUSDT", "SOLUSDT"], &store, &store, &store)
        .unwrap();
    assert_eq!(first.pairs_total, 2);
    assert_eq!(first.rows_new, 2 * 30);
    assert!(first.pairs_failed.is_empty());
    for record in &first.records {
        let p = record.p_value.value().unwrap();
        assert!(p.is_nan() || (0.0..=1.0).contains(&p));
    }

    // nothing new: a rerun writes nothing
    let rerun = engine(60)
        .run_and_persist(&["BTCUSDT"], &["ETHUSDT", "SOLUSDT"], &store, &store, &store)
        .unwrap();
    assert_eq!(rerun.rows_new, 0);

    // ten more days arrive
    for (symbol, phase) in [("BTCUSDT", 0.0), ("ETHUSDT", 0.4), ("SOLUSDT", 1.3)] {
        write_klines(dir.path(), symbol, 100, phase, None);
    }
    ingest(&store, dir.path(), &["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let third = engine(60)
        .run_and_persist(&["BTCUSDT"], &["ETHUSDT", "SOLUSDT"], &store, &store, &store)
        .unwrap();
    assert_eq!(third.rows_new, 2 * 10);
    assert!(third.records.iter().all(|r| r.date >= day(90)));
    assert_eq!(store.load_records(60, None).unwrap().len(), 2 * 40);
}

#[test]
fn gap_in_kline_file_yields_untestable_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_in_memory().unwrap();
    write_klines(dir.path(), "AAA", 65, 0.0, None);
    write_klines(dir.path(), "BBB", 65, 0.9, Some(40));
    ingest(&store, dir.path(), &["AAA", "BBB"]);

    let report = engine(60)
        .run_and_persist(&["AAA"], &["BBB"], &store, &store, &store)
        .unwrap();
    assert_eq!(report.rows_new, 5);
    assert_eq!(report.rows_untestable, 5);

    let stored = store.load_records(60, None).unwrap();
    assert!(stored.iter().all(|r| r.p_value == PValue::Untestable));
}

#[test]
fn different_window_sizes_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_in_memory().unwrap();
    write_klines(dir.path(), "AAA", 80, 0.0, None);
    write_klines(dir.path(), "BBB", 80, 0.7, None);
    ingest(&store, dir.path(), &["AAA", "BBB"]);

    let w60 = engine(60).run_and_persist(&["AAA"], &["BBB"], &store, &store, &store).unwrap();
    let w30 = engine(30).run_and_persist(&["AAA"], &["BBB"], &store, &store, &store).unwrap();
    assert_eq!(w60.rows_new, 20);
    assert_eq!(w30.rows_new, 50);
    assert_eq!(store.load_records(30, None).unwrap().len(), 50);
}

#[test]
fn parquet_cache_feeds_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path().join("cache"));
    write_klines(dir.path(), "AAA", 70, 0.0, None);
    write_klines(dir.path(), "BBB", 70, 0.5, None);
    for symbol in ["AAA", "BBB"] {
        let bars = load_kline_file(&dir.path().join(format!("{symbol}.json"))).unwrap();
        cache.write(symbol, &bars).unwrap();
    }
    let prior = MemoryStore::new();

    let report = engine(60).run(&["AAA"], &["BBB"], &cache, &prior).unwrap();
    assert_eq!(report.rows_new, 10);
    assert_eq!(cache.name(), "parquet-cache");
}

// ── Invocation ───────────────────────────────────────────────────────

#[test]
fn invocation_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_in_memory().unwrap();
    write_klines(dir.path(), "AAA", 70, 0.0, None);
    write_klines(dir.path(), "BBB", 70, 0.5, None);
    ingest(&store, dir.path(), &["AAA", "BBB"]);

    let collaborators = Collaborators {
        panel: &store,
        prior: &store,
        sink: Some(&store),
        threads: 0,
        deadline: None,
    };
    let ok = handle_invocation(
        r#"{"group1_symbols":["AAA"],"group2_symbols":["BBB"],"window_size":60}"#,
        &collaborators,
    );
    assert_eq!(ok.status_code, 200, "{}", ok.body);
    assert_eq!(ok.body["rows_persisted"], 10);

    let missing = handle_invocation(r#"{"group2_symbols":["BBB"]}"#, &collaborators);
    assert_eq!(missing.status_code, 400);

    let small = handle_invocation(
        r#"{"group1_symbols":["AAA"],"group2_symbols":["BBB"],"window_size":1}"#,
        &collaborators,
    );
    assert_eq!(small.status_code, 400);
}

#[test]
fn export_matches_stored_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_in_memory().unwrap();
    write_klines(dir.path(), "AAA", 63, 0.0, None);
    write_klines(dir.path(), "BBB", 63, 0.5, None);
    ingest(&store, dir.path(), &["AAA", "BBB"]);
    engine(60).run_and_persist(&["AAA"], &["BBB"], &store, &store, &store).unwrap();

    let csv = export_records_csv(&store.load_records(60, None).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("AAA,BBB,2023-03-02,60,"));
}

// ── Sink idempotence ─────────────────────────────────────────────────

fn arb_records() -> impl Strategy<Value = Vec<CointegrationRecord>> {
    prop::collection::vec(
        (0usize..3, 0i64..20, prop_oneof![Just(PValue::Untestable), (0.0..1.0_f64).prop_map(PValue::Tested)]),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(pair, d, p_value)| {
                let (a, b) = [("A", "B"), ("A", "C"), ("B", "C")][pair];
                CointegrationRecord {
                    symbol_one: a.into(),
                    symbol_two: b.into(),
                    date: day(d),
                    window_size: 60,
                    p_value,
                }
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sqlite_and_memory_agree_and_upsert_is_idempotent(records in arb_records()) {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        let memory = MemoryStore::new();

        sqlite.upsert(&records).unwrap();
        sqlite.upsert(&records).unwrap();
        memory.upsert(&records).unwrap();

        let from_sqlite = sqlite.load_records(60, None).unwrap();
        let from_memory = memory.records().unwrap();
        prop_assert_eq!(from_sqlite, from_memory);
    }
}
