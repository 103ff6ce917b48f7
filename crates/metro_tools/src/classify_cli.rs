#![forbid(unsafe_code)]

use metro_engines::{EngineConfig, RunClassifier};
use metro_os::classification::{
    BatchOutcome, ClassificationWiring, ClassificationWiringConfig, RowIssue,
};
use metro_os::ingest::TabularRow;
use metro_os::report::{
    daily_tallies, find_serial, monthly_tallies, DailyTally, MonthlyTally, RunReport,
    APPROVAL_TARGET_PCT,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    runs: Vec<RunReport>,
    errors: Vec<RowIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily: Option<Vec<DailyTally>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    monthly: Option<Vec<MonthlyTally>>,
}

/// Optional rollups appended to the classify output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    pub daily: bool,
    pub monthly: bool,
}

pub fn parse_rows(rows_json: &str) -> Result<Vec<TabularRow>, String> {
    serde_json::from_str(rows_json)
        .map_err(|e| format!("rows file must be a JSON array of objects: {e}"))
}

pub fn load_engine_config(config_json: Option<&str>) -> Result<EngineConfig, String> {
    match config_json {
        Some(text) => {
            EngineConfig::from_json_str(text).map_err(|e| format!("invalid engine config: {e}"))
        }
        None => Ok(EngineConfig::mvp_v1()),
    }
}

fn classify_rows(rows_json: &str, config_json: Option<&str>) -> Result<BatchOutcome, String> {
    let rows = parse_rows(rows_json)?;
    let engine = RunClassifier::new(load_engine_config(config_json)?)
        .map_err(|e| format!("invalid engine config: {e}"))?;
    let wiring = ClassificationWiring::new(ClassificationWiringConfig::mvp_v1(), engine);
    Ok(wiring.classify_batch(&rows))
}

pub fn execute_classify_command(
    rows_json: &str,
    config_json: Option<&str>,
    summaries: SummaryOptions,
) -> Result<String, String> {
    let batch = classify_rows(rows_json, config_json)?;
    let daily = summaries.daily.then(|| daily_tallies(&batch.reports));
    let monthly = summaries
        .monthly
        .then(|| monthly_tallies(&batch.reports, APPROVAL_TARGET_PCT));
    let out = ClassifyOutput {
        runs: batch.reports,
        errors: batch.issues,
        daily,
        monthly,
    };
    serde_json::to_string_pretty(&out).map_err(|e| format!("failed to render output: {e}"))
}

pub fn execute_search_command(
    rows_json: &str,
    config_json: Option<&str>,
    serial_fragment: &str,
) -> Result<String, String> {
    if serial_fragment.trim().is_empty() {
        return Err("serial fragment must not be empty".to_string());
    }
    let batch = classify_rows(rows_json, config_json)?;
    let hits = find_serial(&batch.reports, serial_fragment);
    serde_json::to_string_pretty(&hits).map_err(|e| format!("failed to render output: {e}"))
}
