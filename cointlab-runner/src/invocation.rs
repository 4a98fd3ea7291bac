//! Request/response entry point.
//!
//! Parses an invocation event, runs the engine against the supplied
//! collaborators, and always returns a structured status:
//! - 200 with the run summary
//! - 400 for configuration errors (bad event, missing groups, unknown symbols)
//! - 500 for data, persistence, or unexpected failures

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::{error, info};

use cointlab_core::data::PanelSource;
use cointlab_core::stats::EngleGranger;

use crate::config::{ConfigError, GroupSettings, RunConfig, DEFAULT_WINDOW_SIZE};
use crate::engine::{Engine, EngineError, EngineOptions, RunSummary};
use crate::store::{PriorResultsSource, ResultSink};

/// Invocation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    pub group1_symbols: Option<Vec<String>>,
    pub group2_symbols: Option<Vec<String>>,
    pub window_size: Option<usize>,
}

impl InvocationEvent {
    pub fn from_json(body: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(body).map_err(|e| ConfigError::Parse(format!("invocation event: {e}")))
    }

    /// Merge into a run configuration; event values win.
    pub fn to_config(&self, base: &RunConfig) -> RunConfig {
        let mut config = base.clone();
        config.groups = GroupSettings {
            group1: self.group1_symbols.clone(),
            group2: self.group2_symbols.clone(),
        };
        config.engine.window_size = self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE);
        config
    }
}

/// Everything the handler talks to.
pub struct Collaborators<'a> {
    pub panel: &'a dyn PanelSource,
    pub prior: &'a dyn PriorResultsSource,
    /// `None` computes without persisting (dry run).
    pub sink: Option<&'a dyn ResultSink>,
    pub threads: usize,
    pub deadline: Option<Duration>,
}

/// Structured status returned for every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: Value,
}

impl InvocationResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    fn error(status_code: u16, kind: &str, message: String) -> Self {
        Self {
            status_code,
            body: json!({ "error": kind, "message": message }),
        }
    }
}

/// Parse a JSON event and run it.
pub fn handle_invocation(event_json: &str, collaborators: &Collaborators<'_>) -> InvocationResponse {
    match InvocationEvent::from_json(event_json) {
        Ok(event) => handle_event(&event, collaborators),
        Err(e) => InvocationResponse::error(400, "configuration", e.to_string()),
    }
}

/// Run an already-parsed event. Never panics outward.
pub fn handle_event(event: &InvocationEvent, collaborators: &Collaborators<'_>) -> InvocationResponse {
    let mut base = RunConfig::default();
    base.engine.threads = collaborators.threads;
    base.engine.deadline_secs = collaborators.deadline.map(|d| d.as_secs());
    let config = event.to_config(&base);

    let outcome = catch_unwind(AssertUnwindSafe(|| run_config(&config, collaborators)));
    let response = match outcome {
        Ok(Ok(summary)) => match serde_json::to_value(&summary) {
            Ok(body) => InvocationResponse {
                status_code: 200,
                body,
            },
            Err(e) => InvocationResponse::error(500, "internal", e.to_string()),
        },
        Ok(Err(e)) => response_for(&e),
        Err(_) => InvocationResponse::error(500, "internal", "run panicked".into()),
    };

    if response.is_success() {
        info!(fingerprint = %config.fingerprint(), "invocation succeeded");
    } else {
        error!(status = response.status_code, body = %response.body, "invocation failed");
    }
    response
}

fn run_config(config: &RunConfig, c: &Collaborators<'_>) -> Result<RunSummary, EngineError> {
    let groups = config.validate()?;
    let mut options = EngineOptions::from_config(config);
    options.deadline = c.deadline;
    let engine = Engine::new(EngleGranger::default(), options)?;

    let report = match c.sink {
        Some(sink) => engine.run_and_persist(groups.group1, groups.group2, c.panel, c.prior, sink)?,
        None => engine.run(groups.group1, groups.group2, c.panel, c.prior)?,
    };
    Ok(report.summary())
}

fn response_for(err: &EngineError) -> InvocationResponse {
    match err {
        EngineError::Config(e) => InvocationResponse::error(400, "configuration", e.to_string()),
        EngineError::Load(e) => InvocationResponse::error(500, "data", e.to_string()),
        EngineError::Store(e) => InvocationResponse::error(500, "persistence", e.to_string()),
        EngineError::Pool(e) => InvocationResponse::error(500, "internal", e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use cointlab_core::domain::PricePoint;

    fn store(days: i64) -> MemoryStore {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = ["A", "B"]
            .iter()
            .enumerate()
            .flat_map(|(k, s)| {
                (0..days).map(move |i| {
                    let t = i as f64;
                    PricePoint::new(
                        start + chrono::Duration::days(i),
                        *s,
                        50.0 + t * 0.1 + (t * (0.7 + k as f64)).sin() * 2.0,
                    )
                })
            })
            .collect();
        MemoryStore::with_points(points)
    }

    fn collaborators(db: &MemoryStore) -> Collaborators<'_> {
        Collaborators {
            panel: db,
            prior: db,
            sink: Some(db),
            threads: 1,
            deadline: None,
        }
    }

    #[test]
    fn success_returns_summary() {
        let db = store(70);
        let response = handle_invocation(
            r#"{"group1_symbols": ["A"], "group2_symbols": ["B"], "window_size": 60}"#,
            &collaborators(&db),
        );
        assert_eq!(response.status_code, 200, "{}", response.body);
        assert_eq!(response.body["rows_new"], 10);
        assert_eq!(db.record_count(), 10);
    }

    #[test]
    fn window_defaults_to_sixty() {
        let db = store(65);
        let response = handle_invocation(
            r#"{"group1_symbols": ["A"], "group2_symbols": ["B"]}"#,
            &collaborators(&db),
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["window_size"], 60);
    }

    #[test]
    fn missing_group_is_400() {
        let db = store(10);
        let response = handle_invocation(r#"{"group1_symbols": ["A"]}"#, &collaborators(&db));
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body["error"], "configuration");
    }

    #[test]
    fn malformed_event_is_400() {
        let db = store(10);
        let response = handle_invocation("not json", &collaborators(&db));
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn unknown_symbol_is_400() {
        let db = store(70);
        let response = handle_invocation(
            r#"{"group1_symbols": ["A"], "group2_symbols": ["B", "NOPE"]}"#,
            &collaborators(&db),
        );
        assert_eq!(response.status_code, 400);
        assert!(response.body["message"].as_str().unwrap().contains("NOPE"));
    }

    #[test]
    fn persistence_failure_is_500() {
        let db = store(70);
        db.set_fail_writes(true);
        let response = handle_invocation(
            r#"{"group1_symbols": ["A"], "group2_symbols": ["B"]}"#,
            &collaborators(&db),
        );
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body["error"], "persistence");
    }

    #[test]
    fn dry_run_does_not_persist() {
        let db = store(70);
        let mut c = collaborators(&db);
        c.sink = None;
        let response = handle_invocation(
            r#"{"group1_symbols": ["A"], "group2_symbols": ["B"]}"#,
            &c,
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["rows_persisted"], Value::Null);
        assert_eq!(db.record_count(), 0);
    }

    #[test]
    fn response_serializes_to_json() {
        let response = InvocationResponse::error(400, "configuration", "bad".into());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status_code":400"#));
    }
}
