#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use metro_kernel_contracts::bench::{
    AccuracyClass, BenchKind, ChannelId, MeterSlot, RawReadings, TestRun, ABSENT_SENTINEL,
};
use metro_kernel_contracts::verdict::{
    FailureReason, RunTally, RunVerdict, SlotStatus, Verdict,
};
use metro_kernel_contracts::{ContractViolation, SchemaVersion, METRO_CONTRACT_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Verbatim cell text shown next to the verdict; `-` for absent cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReadings {
    pub nominal: String,
    pub light: String,
    pub low: String,
    pub indicator: String,
    pub register_start: String,
    pub register_end: String,
}

impl SlotReadings {
    fn from_raw(raw: &RawReadings) -> Self {
        Self {
            nominal: RawReadings::display(raw.channel(ChannelId::Nominal)),
            light: RawReadings::display(raw.channel(ChannelId::Light)),
            low: RawReadings::display(raw.channel(ChannelId::Low)),
            indicator: RawReadings::display(raw.indicator.as_deref()),
            register_start: RawReadings::display(raw.register_start.as_deref()),
            register_end: RawReadings::display(raw.register_end.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotReport {
    pub position: u16,
    pub serial: String,
    pub status: SlotStatus,
    pub reasons: Vec<FailureReason>,
    pub failing_channels: Vec<ChannelId>,
    pub guardband_channels: Vec<ChannelId>,
    pub limit_used: f64,
    pub guardband_used: Option<f64>,
    pub against_consumer_points: u8,
    pub readings: SlotReadings,
    pub register_delta: Option<f64>,
}

impl SlotReport {
    pub fn from_parts(slot: &MeterSlot, verdict: &Verdict) -> Self {
        let register_delta = match (slot.register_start, slot.register_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };
        Self {
            position: verdict.position,
            serial: slot.serial.clone(),
            status: verdict.status,
            reasons: verdict.reasons.clone(),
            failing_channels: verdict.failing_channels.clone(),
            guardband_channels: verdict.guardband_channels.clone(),
            limit_used: verdict.limit_used,
            guardband_used: verdict.guardband_used,
            against_consumer_points: verdict.against_consumer_points,
            readings: SlotReadings::from_raw(&slot.raw),
            register_delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: SchemaVersion,
    pub run_id: String,
    pub date: Option<String>,
    pub bench: BenchKind,
    pub bench_label: String,
    pub temperature: Option<String>,
    pub declared_class: String,
    pub resolved_class: AccuracyClass,
    pub limit_used: f64,
    pub guardband_used: Option<f64>,
    pub slots: Vec<SlotReport>,
    pub tally: RunTally,
    pub verdict_digest: String,
}

impl RunReport {
    /// `run` and `verdict` must be aligned by position; the wiring checks this first.
    pub fn build(
        run: &TestRun,
        verdict: &RunVerdict,
        include_not_tested_slots: bool,
    ) -> Result<Self, ContractViolation> {
        let slots = run
            .slots
            .iter()
            .zip(&verdict.verdicts)
            .filter(|(_, v)| include_not_tested_slots || v.status.is_tested())
            .map(|(slot, v)| SlotReport::from_parts(slot, v))
            .collect();
        Ok(Self {
            schema_version: METRO_CONTRACT_VERSION,
            run_id: run.run_id.clone(),
            date: run.date.clone(),
            bench: run.bench,
            bench_label: run.bench_label.clone(),
            temperature: run.temperature.clone(),
            declared_class: run.declared_class.clone(),
            resolved_class: verdict.resolved_class,
            limit_used: verdict.limit_used,
            guardband_used: verdict.guardband_used,
            slots,
            tally: verdict.tally(),
            verdict_digest: verdict_digest(verdict)?,
        })
    }
}

/// SHA-256 over the canonical JSON of a run verdict, hex encoded.
pub fn verdict_digest(verdict: &RunVerdict) -> Result<String, ContractViolation> {
    let bytes = serde_json::to_vec(verdict).map_err(|_| ContractViolation::InvalidValue {
        field: "run_report.verdict_digest",
        reason: "run verdict failed to serialize",
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialMatch {
    pub run_id: String,
    pub date: Option<String>,
    pub bench_label: String,
    pub temperature: Option<String>,
    pub slot: SlotReport,
}

/// Case-insensitive substring search over serials of tested slots.
pub fn find_serial(reports: &[RunReport], needle: &str) -> Vec<SerialMatch> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let needle = needle.as_str();
    reports
        .iter()
        .flat_map(move |run| {
            run.slots
                .iter()
                .filter(move |slot| {
                    slot.status.is_tested()
                        && slot.serial != ABSENT_SENTINEL
                        && slot.serial.to_lowercase().contains(needle)
                })
                .map(move |slot| SerialMatch {
                    run_id: run.run_id.clone(),
                    date: run.date.clone(),
                    bench_label: run.bench_label.clone(),
                    temperature: run.temperature.clone(),
                    slot: slot.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTally {
    pub date: String,
    pub runs: u32,
    pub tally: RunTally,
    pub approval_rate_pct: f64,
}

/// Rolls run tallies up per test date, oldest first. Runs without a date group under `-`.
pub fn daily_tallies(reports: &[RunReport]) -> Vec<DailyTally> {
    let mut by_day: BTreeMap<(DateKey, String), (u32, RunTally)> = BTreeMap::new();
    for report in reports {
        let date = report
            .date
            .clone()
            .unwrap_or_else(|| ABSENT_SENTINEL.to_string());
        let entry = by_day
            .entry((DateKey::parse(&date), date))
            .or_insert((0, RunTally::default()));
        entry.0 += 1;
        entry.1.merge(&report.tally);
    }
    by_day
        .into_iter()
        .map(|((_, date), (runs, tally))| DailyTally {
            date,
            runs,
            approval_rate_pct: tally.approval_rate_pct(),
            tally,
        })
        .collect()
}

/// Monthly approval target used by the lab's quality dashboard, in percent.
pub const APPROVAL_TARGET_PCT: f64 = 95.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTally {
    pub year: u32,
    pub month: u32,
    pub runs: u32,
    pub tally: RunTally,
    pub approval_rate_pct: f64,
    pub target_pct: f64,
    /// Negative when the month missed the target.
    pub delta_vs_target_pct: f64,
    pub meets_target: bool,
}

/// Rolls run tallies up per calendar month, oldest first.
///
/// Runs whose date cannot be read as `dd/mm/yy[yy]` belong to no month and are left out.
pub fn monthly_tallies(reports: &[RunReport], target_pct: f64) -> Vec<MonthlyTally> {
    let mut by_month: BTreeMap<(u32, u32), (u32, RunTally)> = BTreeMap::new();
    for report in reports {
        let Some(key) = report
            .date
            .as_deref()
            .and_then(|d| DateKey::parse(d).year_month())
        else {
            continue;
        };
        let entry = by_month.entry(key).or_insert((0, RunTally::default()));
        entry.0 += 1;
        entry.1.merge(&report.tally);
    }
    by_month
        .into_iter()
        .map(|((year, month), (runs, tally))| {
            let approval_rate_pct = tally.approval_rate_pct();
            MonthlyTally {
                year,
                month,
                runs,
                tally,
                approval_rate_pct,
                target_pct,
                delta_vs_target_pct: approval_rate_pct - target_pct,
                meets_target: approval_rate_pct >= target_pct,
            }
        })
        .collect()
}

// Sheet dates are day-first (`dd/mm/yy` or `dd/mm/yyyy`); unparseable dates sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DateKey {
    Ymd(u32, u32, u32),
    Unparsed,
}

impl DateKey {
    fn parse(text: &str) -> Self {
        let parts: Vec<&str> = text.trim().split(['/', '-', '.']).collect();
        let [d, m, y] = parts.as_slice() else {
            return DateKey::Unparsed;
        };
        match (d.parse::<u32>(), m.parse::<u32>(), y.parse::<u32>()) {
            (Ok(d), Ok(m), Ok(y)) if (1..=31).contains(&d) && (1..=12).contains(&m) => {
                let year = if y < 100 { 2000 + y } else { y };
                DateKey::Ymd(year, m, d)
            }
            _ => DateKey::Unparsed,
        }
    }

    fn year_month(self) -> Option<(u32, u32)> {
        match self {
            DateKey::Ymd(y, m, _) => Some((y, m)),
            DateKey::Unparsed => None,
        }
    }
}
