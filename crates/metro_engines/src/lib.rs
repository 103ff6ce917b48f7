#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod indicator;
pub mod register;
pub mod run;
pub mod slot;
pub mod threshold;

pub use config::{ClassLimitTable, ConfigError, EngineConfig, IndicatorPolicyKind};
pub use run::RunClassifier;
pub use slot::SlotClassifier;
pub use threshold::{ResolvedThreshold, ThresholdResolver};
