#![forbid(unsafe_code)]

use metro_kernel_contracts::bench::AccuracyClass;
use metro_kernel_contracts::{ContractViolation, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GUARDBAND_FRACTION: f64 = 0.90;
pub const DEFAULT_AGAINST_CONSUMER_MIN_POINTS: u8 = 2;
pub const MAX_REGISTER_TOLERANCE: f64 = 0.5;

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    Contract(ContractViolation),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "config json error: {err}"),
            Self::Contract(err) => write!(f, "config rejected: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ContractViolation> for ConfigError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

/// Accuracy class to error limit (percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassLimitTable {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub electromechanical: f64,
}

impl ClassLimitTable {
    pub fn mvp_v1() -> Self {
        Self {
            a: 1.0,
            b: 1.3,
            c: 2.0,
            d: 0.3,
            electromechanical: 4.0,
        }
    }

    pub fn limit_for(&self, class: AccuracyClass) -> f64 {
        match class {
            AccuracyClass::A => self.a,
            AccuracyClass::B => self.b,
            AccuracyClass::C => self.c,
            AccuracyClass::D => self.d,
            AccuracyClass::Electromechanical => self.electromechanical,
        }
    }
}

impl Default for ClassLimitTable {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl Validate for ClassLimitTable {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            ("class_limits.a", self.a),
            ("class_limits.b", self.b),
            ("class_limits.c", self.c),
            ("class_limits.d", self.d),
            ("class_limits.electromechanical", self.electromechanical),
        ] {
            if !value.is_finite() {
                return Err(ContractViolation::NotFinite { field });
            }
            if value <= 0.0 || value > 100.0 {
                return Err(ContractViolation::InvalidRange {
                    field,
                    min: 0.0,
                    max: 100.0,
                    got: value,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorPolicyKind {
    /// Exact match against the bench's expected token.
    BenchToken,
    /// Fails on a fixed set of rejection tokens, regardless of bench.
    Blocklist,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub class_limits: ClassLimitTable,
    /// `None` disables CRITICAL_ZONE.
    pub guardband_fraction: Option<f64>,
    pub indicator_policy: IndicatorPolicyKind,
    pub against_consumer_min_points: u8,
    /// Used for TWENTY_SLOT runs that declare no class, before the class B default.
    pub twenty_slot_default_class: Option<AccuracyClass>,
    /// Allowed deviation of the register delta from one unit. Zero keeps `delta != 1` exact.
    pub register_tolerance: f64,
}

impl EngineConfig {
    pub fn mvp_v1() -> Self {
        Self {
            class_limits: ClassLimitTable::mvp_v1(),
            guardband_fraction: None,
            indicator_policy: IndicatorPolicyKind::BenchToken,
            against_consumer_min_points: DEFAULT_AGAINST_CONSUMER_MIN_POINTS,
            twenty_slot_default_class: None,
            register_tolerance: 0.0,
        }
    }

    pub fn with_guardband_v1() -> Self {
        Self {
            guardband_fraction: Some(DEFAULT_GUARDBAND_FRACTION),
            ..Self::mvp_v1()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.class_limits.validate()?;
        if let Some(fraction) = self.guardband_fraction {
            if !fraction.is_finite() {
                return Err(ContractViolation::NotFinite {
                    field: "engine_config.guardband_fraction",
                });
            }
            if fraction <= 0.0 || fraction > 1.0 {
                return Err(ContractViolation::InvalidRange {
                    field: "engine_config.guardband_fraction",
                    min: 0.0,
                    max: 1.0,
                    got: fraction,
                });
            }
        }
        if !self.register_tolerance.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "engine_config.register_tolerance",
            });
        }
        if !(0.0..=MAX_REGISTER_TOLERANCE).contains(&self.register_tolerance) {
            return Err(ContractViolation::InvalidRange {
                field: "engine_config.register_tolerance",
                min: 0.0,
                max: MAX_REGISTER_TOLERANCE,
                got: self.register_tolerance,
            });
        }
        if self.against_consumer_min_points == 0 || self.against_consumer_min_points > 3 {
            return Err(ContractViolation::InvalidValue {
                field: "engine_config.against_consumer_min_points",
                reason: "must be within 1..=3",
            });
        }
        Ok(())
    }
}
