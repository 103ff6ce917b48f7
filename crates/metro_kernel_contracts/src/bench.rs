#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_finite_range;
use crate::{ContractViolation, SchemaVersion, Validate, METRO_CONTRACT_VERSION};

/// Display sentinel for a cell that carried no value.
pub const ABSENT_SENTINEL: &str = "-";

pub const MAX_SLOTS_PER_RUN: u16 = 20;

/// Class annotations that select the electromechanical limit regardless of letter.
pub const ELECTROMECHANICAL_MARKERS: [&str; 2] = ["ELETROMEC", "ELECTROMEC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccuracyClass {
    A,
    B,
    C,
    D,
    Electromechanical,
}

impl AccuracyClass {
    pub fn as_str(self) -> &'static str {
        match self {
            AccuracyClass::A => "A",
            AccuracyClass::B => "B",
            AccuracyClass::C => "C",
            AccuracyClass::D => "D",
            AccuracyClass::Electromechanical => "ELECTROMECHANICAL",
        }
    }

    /// Bare class letter lookup. Annotations are handled by the threshold resolver.
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim().to_ascii_uppercase().as_str() {
            "A" => Some(AccuracyClass::A),
            "B" => Some(AccuracyClass::B),
            "C" => Some(AccuracyClass::C),
            "D" => Some(AccuracyClass::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BenchKind {
    TenSlot,
    TwentySlot,
    Other,
}

impl BenchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BenchKind::TenSlot => "TEN_SLOT",
            BenchKind::TwentySlot => "TWENTY_SLOT",
            BenchKind::Other => "OTHER",
        }
    }

    /// Maps the bench identifier used on the lab sheets (`BANC_10_POS`, `BANC_20_POS`).
    pub fn from_identifier(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BANC_10_POS" | "TEN_SLOT" => BenchKind::TenSlot,
            "BANC_20_POS" | "TWENTY_SLOT" => BenchKind::TwentySlot,
            _ => BenchKind::Other,
        }
    }

    pub fn slot_count(self) -> u16 {
        match self {
            BenchKind::TwentySlot => 20,
            BenchKind::TenSlot | BenchKind::Other => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelId {
    Nominal,
    Light,
    Low,
}

impl ChannelId {
    pub const ALL: [ChannelId; 3] = [ChannelId::Nominal, ChannelId::Light, ChannelId::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::Nominal => "NOMINAL",
            ChannelId::Light => "LIGHT",
            ChannelId::Low => "LOW",
        }
    }

    /// Column suffix on the bench sheets.
    pub fn legacy_label(self) -> &'static str {
        match self {
            ChannelId::Nominal => "CN",
            ChannelId::Light => "CP",
            ChannelId::Low => "CI",
        }
    }
}

/// Converts one cell to a numeric reading.
///
/// Accepts `,` as the decimal separator and a trailing `%`. Empty, unparseable and
/// non-finite text all become `None`; a bad cell is never read as zero.
pub fn parse_reading(raw: Option<&str>) -> Option<f64> {
    let text = raw?.trim();
    let text = text.strip_suffix('%').unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }
    let normalized = text.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Sheet text with control characters turned into spaces, trimmed. Length is kept.
pub fn clean_cell_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Verbatim cell text for one slot, kept for display next to the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReadings {
    pub nominal: Option<String>,
    pub light: Option<String>,
    pub low: Option<String>,
    pub indicator: Option<String>,
    pub register_start: Option<String>,
    pub register_end: Option<String>,
}

impl RawReadings {
    pub fn channel(&self, channel: ChannelId) -> Option<&str> {
        match channel {
            ChannelId::Nominal => self.nominal.as_deref(),
            ChannelId::Light => self.light.as_deref(),
            ChannelId::Low => self.low.as_deref(),
        }
    }

    pub fn display(value: Option<&str>) -> String {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => ABSENT_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSlot {
    pub schema_version: SchemaVersion,
    pub position: u16,
    pub serial: String,
    pub err_nominal: Option<f64>,
    pub err_light: Option<f64>,
    pub err_low: Option<f64>,
    pub indicator: String,
    pub register_start: Option<f64>,
    pub register_end: Option<f64>,
    pub raw: RawReadings,
}

impl MeterSlot {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        position: u16,
        serial: String,
        err_nominal: Option<f64>,
        err_light: Option<f64>,
        err_low: Option<f64>,
        indicator: String,
        register_start: Option<f64>,
        register_end: Option<f64>,
    ) -> Result<Self, ContractViolation> {
        let fmt = |v: Option<f64>| v.map(|x| x.to_string());
        let raw = RawReadings {
            nominal: fmt(err_nominal),
            light: fmt(err_light),
            low: fmt(err_low),
            indicator: Some(indicator.clone()),
            register_start: fmt(register_start),
            register_end: fmt(register_end),
        };
        let slot = Self {
            schema_version: METRO_CONTRACT_VERSION,
            position,
            serial,
            err_nominal,
            err_light,
            err_low,
            indicator,
            register_start,
            register_end,
            raw,
        };
        slot.validate()?;
        Ok(slot)
    }

    /// Builds a slot from sheet cells, running the reading parse step once.
    pub fn from_cells_v1(
        position: u16,
        serial: Option<String>,
        raw: RawReadings,
    ) -> Result<Self, ContractViolation> {
        let serial = serial.as_deref().map(clean_cell_text);
        let indicator = raw.indicator.as_deref().map(clean_cell_text);
        let slot = Self {
            schema_version: METRO_CONTRACT_VERSION,
            position,
            serial: RawReadings::display(serial.as_deref()),
            err_nominal: parse_reading(raw.nominal.as_deref()),
            err_light: parse_reading(raw.light.as_deref()),
            err_low: parse_reading(raw.low.as_deref()),
            indicator: RawReadings::display(indicator.as_deref()),
            register_start: parse_reading(raw.register_start.as_deref()),
            register_end: parse_reading(raw.register_end.as_deref()),
            raw,
        };
        slot.validate()?;
        Ok(slot)
    }

    pub fn channel(&self, channel: ChannelId) -> Option<f64> {
        match channel {
            ChannelId::Nominal => self.err_nominal,
            ChannelId::Light => self.err_light,
            ChannelId::Low => self.err_low,
        }
    }

    pub fn channel_readings(&self) -> [(ChannelId, Option<f64>); 3] {
        ChannelId::ALL.map(|c| (c, self.channel(c)))
    }

    pub fn all_channels_absent(&self) -> bool {
        ChannelId::ALL.iter().all(|c| self.channel(*c).is_none())
    }
}

impl Validate for MeterSlot {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != METRO_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "meter_slot.schema_version",
                reason: "must match METRO_CONTRACT_VERSION",
            });
        }
        if self.position == 0 || self.position > MAX_SLOTS_PER_RUN {
            return Err(ContractViolation::InvalidValue {
                field: "meter_slot.position",
                reason: "must be within 1..=20",
            });
        }
        for (field, value) in [
            ("meter_slot.err_nominal", self.err_nominal),
            ("meter_slot.err_light", self.err_light),
            ("meter_slot.err_low", self.err_low),
            ("meter_slot.register_start", self.register_start),
            ("meter_slot.register_end", self.register_end),
        ] {
            if let Some(v) = value {
                validate_finite_range(field, v, f64::MIN, f64::MAX)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub schema_version: SchemaVersion,
    pub run_id: String,
    pub date: Option<String>,
    pub bench: BenchKind,
    pub bench_label: String,
    /// Class text as declared on the sheet, annotations included. Empty when absent.
    pub declared_class: String,
    pub temperature: Option<String>,
    pub slots: Vec<MeterSlot>,
}

impl TestRun {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        run_id: String,
        date: Option<String>,
        bench: BenchKind,
        bench_label: String,
        declared_class: String,
        temperature: Option<String>,
        slots: Vec<MeterSlot>,
    ) -> Result<Self, ContractViolation> {
        let run = Self {
            schema_version: METRO_CONTRACT_VERSION,
            run_id,
            date,
            bench,
            bench_label,
            declared_class,
            temperature,
            slots,
        };
        run.validate()?;
        Ok(run)
    }
}

impl Validate for TestRun {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != METRO_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "test_run.schema_version",
                reason: "must match METRO_CONTRACT_VERSION",
            });
        }
        if self.run_id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "test_run.run_id",
                reason: "must not be empty",
            });
        }
        if self.slots.len() != self.bench.slot_count() as usize {
            return Err(ContractViolation::InvalidValue {
                field: "test_run.slots",
                reason: "slot count must match the bench kind",
            });
        }
        for (idx, slot) in self.slots.iter().enumerate() {
            slot.validate()?;
            if slot.position as usize != idx + 1 {
                return Err(ContractViolation::InvalidValue {
                    field: "test_run.slots",
                    reason: "positions must run 1..N in ascending order",
                });
            }
        }
        Ok(())
    }
}
