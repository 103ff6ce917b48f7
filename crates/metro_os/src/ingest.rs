#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use metro_kernel_contracts::bench::{
    clean_cell_text, parse_reading, BenchKind, ChannelId, MeterSlot, RawReadings, TestRun,
};
use metro_kernel_contracts::ContractViolation;
use serde_json::Value;
use tracing::warn;

/// One flat sheet row: column name to cell.
pub type TabularRow = BTreeMap<String, Value>;

pub mod columns {
    pub const CLASS: &str = "Classe";
    pub const BENCH: &str = "Bancada";
    pub const BENCH_ALT: &str = "Bancada_Nome";
    pub const RUN_ID: &str = "N_ENSAIO";
    pub const DATE: &str = "Data";
    pub const TEMPERATURE: &str = "Temperatura";

    pub fn serial(pos: u16) -> String {
        format!("P{pos}_Série")
    }

    pub fn channel(pos: u16, label: &str) -> String {
        format!("P{pos}_{label}")
    }

    pub fn indicator(pos: u16) -> String {
        format!("P{pos}_MV")
    }

    pub fn register_start(pos: u16) -> String {
        format!("P{pos}_REG_Inicio")
    }

    pub fn register_end(pos: u16) -> String {
        format!("P{pos}_REG_Fim")
    }
}

/// Cell text with control characters blanked, or `None` for null and blank cells.
pub fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => clean_cell_text(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn optional_cell(row: &TabularRow, column: &str) -> Option<String> {
    row.get(column).and_then(cell_text)
}

fn require_column<'a>(
    row: &'a TabularRow,
    column: &str,
) -> Result<&'a Value, ContractViolation> {
    row.get(column).ok_or_else(|| ContractViolation::MissingColumn {
        column: column.to_string(),
    })
}

/// Reading cells that carry text but parse to no value.
pub fn unparsed_reading_cells(raw: &RawReadings) -> Vec<&'static str> {
    let readings = [
        (ChannelId::Nominal.legacy_label(), raw.nominal.as_deref()),
        (ChannelId::Light.legacy_label(), raw.light.as_deref()),
        (ChannelId::Low.legacy_label(), raw.low.as_deref()),
        ("REG_Inicio", raw.register_start.as_deref()),
        ("REG_Fim", raw.register_end.as_deref()),
    ];
    readings
        .into_iter()
        .filter(|(_, cell)| cell.is_some() && parse_reading(*cell).is_none())
        .map(|(label, _)| label)
        .collect()
}

/// Builds a run from one sheet row.
///
/// Missing channel columns for the declared bench size are a caller error. Blank
/// or malformed cells are not: they reach the engine as absent readings. Free-text
/// cells (serial, indicator, class, run id) are never refused for their content.
pub fn test_run_from_row(row: &TabularRow) -> Result<TestRun, ContractViolation> {
    let run_id = cell_text(require_column(row, columns::RUN_ID)?).ok_or(
        ContractViolation::InvalidValue {
            field: "row.N_ENSAIO",
            reason: "must not be empty",
        },
    )?;
    let bench_label = match row.get(columns::BENCH).or_else(|| row.get(columns::BENCH_ALT)) {
        Some(v) => cell_text(v).unwrap_or_default(),
        None => {
            return Err(ContractViolation::MissingColumn {
                column: columns::BENCH.to_string(),
            })
        }
    };
    let bench = BenchKind::from_identifier(&bench_label);

    let mut slots = Vec::with_capacity(bench.slot_count() as usize);
    for pos in 1..=bench.slot_count() {
        let mut channel_cells = [None, None, None];
        for (cell, channel) in channel_cells.iter_mut().zip(ChannelId::ALL) {
            let column = columns::channel(pos, channel.legacy_label());
            *cell = cell_text(require_column(row, &column)?);
        }
        let [nominal, light, low] = channel_cells;
        let raw = RawReadings {
            nominal,
            light,
            low,
            indicator: optional_cell(row, &columns::indicator(pos)),
            register_start: optional_cell(row, &columns::register_start(pos)),
            register_end: optional_cell(row, &columns::register_end(pos)),
        };
        for label in unparsed_reading_cells(&raw) {
            warn!(
                run_id = %run_id,
                position = pos,
                column = label,
                "unparseable reading treated as absent"
            );
        }
        slots.push(MeterSlot::from_cells_v1(
            pos,
            optional_cell(row, &columns::serial(pos)),
            raw,
        )?);
    }

    TestRun::v1(
        run_id,
        optional_cell(row, columns::DATE),
        bench,
        bench_label,
        optional_cell(row, columns::CLASS).unwrap_or_default(),
        optional_cell(row, columns::TEMPERATURE),
        slots,
    )
}
