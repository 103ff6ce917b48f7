#![forbid(unsafe_code)]

pub mod bench;
pub mod common;
pub mod verdict;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, Validate};

pub const METRO_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);
