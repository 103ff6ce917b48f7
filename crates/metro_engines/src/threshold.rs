#![forbid(unsafe_code)]

use metro_kernel_contracts::bench::{AccuracyClass, BenchKind, ELECTROMECHANICAL_MARKERS};
use tracing::warn;

use crate::config::{ClassLimitTable, EngineConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedThreshold {
    pub class: AccuracyClass,
    pub limit: f64,
    /// `None` when no guardband fraction is configured.
    pub guardband_limit: Option<f64>,
    /// True when the declared class was empty or unrecognized.
    pub defaulted: bool,
}

#[derive(Debug, Clone)]
pub struct ThresholdResolver {
    limits: ClassLimitTable,
    guardband_fraction: Option<f64>,
    twenty_slot_default_class: Option<AccuracyClass>,
}

impl ThresholdResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            limits: config.class_limits,
            guardband_fraction: config.guardband_fraction,
            twenty_slot_default_class: config.twenty_slot_default_class,
        }
    }

    /// Never fails: unknown or missing classes fall back to class B.
    pub fn resolve(&self, declared_class: &str, bench: BenchKind) -> ResolvedThreshold {
        let (class, defaulted) = self.resolve_class(declared_class, bench);
        let limit = self.limits.limit_for(class);
        ResolvedThreshold {
            class,
            limit,
            guardband_limit: self.guardband_fraction.map(|f| limit * f),
            defaulted,
        }
    }

    fn resolve_class(&self, declared_class: &str, bench: BenchKind) -> (AccuracyClass, bool) {
        let upper = declared_class.trim().to_uppercase();
        if ELECTROMECHANICAL_MARKERS.iter().any(|m| upper.contains(m)) {
            return (AccuracyClass::Electromechanical, false);
        }
        if upper.is_empty() {
            if bench == BenchKind::TwentySlot {
                if let Some(class) = self.twenty_slot_default_class {
                    return (class, true);
                }
            }
            return (AccuracyClass::B, true);
        }
        match AccuracyClass::from_letter(&upper) {
            Some(class) => (class, false),
            None => {
                warn!(declared_class, "unrecognized accuracy class, using class B");
                (AccuracyClass::B, true)
            }
        }
    }
}
