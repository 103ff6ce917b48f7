#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::bench::{AccuracyClass, BenchKind, ChannelId};
use crate::common::validate_finite_range;
use crate::{ContractViolation, SchemaVersion, Validate, METRO_CONTRACT_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    NotTested,
    Approved,
    Rejected,
    AgainstConsumer,
    CriticalZone,
}

impl SlotStatus {
    pub const ALL: [SlotStatus; 5] = [
        SlotStatus::NotTested,
        SlotStatus::Approved,
        SlotStatus::Rejected,
        SlotStatus::AgainstConsumer,
        SlotStatus::CriticalZone,
    ];

    /// Stable token; locale text is mapped from this by the presentation layer.
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::NotTested => "NOT_TESTED",
            SlotStatus::Approved => "APPROVED",
            SlotStatus::Rejected => "REJECTED",
            SlotStatus::AgainstConsumer => "AGAINST_CONSUMER",
            SlotStatus::CriticalZone => "CRITICAL_ZONE",
        }
    }

    pub fn is_tested(self) -> bool {
        !matches!(self, SlotStatus::NotTested)
    }

    pub fn is_passing(self) -> bool {
        matches!(self, SlotStatus::Approved | SlotStatus::CriticalZone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    Accuracy,
    Register,
    Indicator,
    AgainstConsumer,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Accuracy => "ACCURACY",
            FailureReason::Register => "REGISTER",
            FailureReason::Indicator => "INDICATOR",
            FailureReason::AgainstConsumer => "AGAINST_CONSUMER",
        }
    }
}

/// Classification outcome for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub schema_version: SchemaVersion,
    pub position: u16,
    pub status: SlotStatus,
    pub reasons: Vec<FailureReason>,
    pub failing_channels: Vec<ChannelId>,
    /// Near-limit channels; only populated for CRITICAL_ZONE.
    pub guardband_channels: Vec<ChannelId>,
    pub limit_used: f64,
    pub guardband_used: Option<f64>,
    pub against_consumer_points: u8,
}

impl Verdict {
    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

impl Validate for Verdict {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != METRO_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "verdict.schema_version",
                reason: "must match METRO_CONTRACT_VERSION",
            });
        }
        if self.position == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "verdict.position",
                reason: "must be > 0",
            });
        }
        validate_finite_range("verdict.limit_used", self.limit_used, f64::MIN_POSITIVE, 100.0)?;
        if let Some(gb) = self.guardband_used {
            validate_finite_range("verdict.guardband_used", gb, 0.0, self.limit_used)?;
        }
        if self.against_consumer_points > 3 {
            return Err(ContractViolation::InvalidValue {
                field: "verdict.against_consumer_points",
                reason: "must be <= 3",
            });
        }
        if !is_channel_ordered(&self.failing_channels)
            || !is_channel_ordered(&self.guardband_channels)
        {
            return Err(ContractViolation::InvalidValue {
                field: "verdict.channels",
                reason: "channel lists must be unique and in NOMINAL, LIGHT, LOW order",
            });
        }
        match self.status {
            SlotStatus::NotTested | SlotStatus::Approved => {
                if !self.reasons.is_empty() || !self.failing_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "must be empty when NOT_TESTED or APPROVED",
                    });
                }
                if !self.guardband_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.guardband_channels",
                        reason: "must be empty when NOT_TESTED or APPROVED",
                    });
                }
            }
            SlotStatus::CriticalZone => {
                if !self.reasons.is_empty() || !self.failing_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "must be empty when CRITICAL_ZONE",
                    });
                }
                if self.guardband_channels.is_empty() || self.guardband_used.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.guardband_channels",
                        reason: "CRITICAL_ZONE requires a guardband and a near-limit channel",
                    });
                }
            }
            SlotStatus::Rejected => {
                if self.reasons.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "REJECTED requires at least one reason",
                    });
                }
                if self.reasons.contains(&FailureReason::AgainstConsumer) {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "AGAINST_CONSUMER reason is reserved for its own status",
                    });
                }
                if self.reasons.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "must follow ACCURACY, REGISTER, INDICATOR order",
                    });
                }
                let accuracy = self.reasons.contains(&FailureReason::Accuracy);
                if accuracy == self.failing_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.failing_channels",
                        reason: "must be non-empty exactly when ACCURACY is a reason",
                    });
                }
                if !self.guardband_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.guardband_channels",
                        reason: "must be empty when REJECTED",
                    });
                }
            }
            SlotStatus::AgainstConsumer => {
                if self.reasons != [FailureReason::AgainstConsumer] {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.reasons",
                        reason: "AGAINST_CONSUMER carries exactly its own reason",
                    });
                }
                if self.against_consumer_points == 0 {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.against_consumer_points",
                        reason: "AGAINST_CONSUMER requires scored points",
                    });
                }
                if !self.guardband_channels.is_empty() {
                    return Err(ContractViolation::InvalidValue {
                        field: "verdict.guardband_channels",
                        reason: "must be empty when AGAINST_CONSUMER",
                    });
                }
            }
        }
        Ok(())
    }
}

fn is_channel_ordered(channels: &[ChannelId]) -> bool {
    channels.windows(2).all(|w| w[0] < w[1])
}

/// Per-run result set, aligned by position with the input slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub schema_version: SchemaVersion,
    pub run_id: String,
    pub bench: BenchKind,
    pub resolved_class: AccuracyClass,
    pub limit_used: f64,
    pub guardband_used: Option<f64>,
    pub verdicts: Vec<Verdict>,
}

impl RunVerdict {
    pub fn tally(&self) -> RunTally {
        RunTally::from_verdicts(&self.verdicts)
    }
}

impl Validate for RunVerdict {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != METRO_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "run_verdict.schema_version",
                reason: "must match METRO_CONTRACT_VERSION",
            });
        }
        if self.run_id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "run_verdict.run_id",
                reason: "must not be empty",
            });
        }
        if self.verdicts.len() != self.bench.slot_count() as usize {
            return Err(ContractViolation::InvalidValue {
                field: "run_verdict.verdicts",
                reason: "verdict count must match the bench kind",
            });
        }
        for (idx, verdict) in self.verdicts.iter().enumerate() {
            verdict.validate()?;
            if verdict.position as usize != idx + 1 {
                return Err(ContractViolation::InvalidValue {
                    field: "run_verdict.verdicts",
                    reason: "positions must run 1..N in ascending order",
                });
            }
            if verdict.limit_used != self.limit_used
                || verdict.guardband_used != self.guardband_used
            {
                return Err(ContractViolation::InvalidValue {
                    field: "run_verdict.verdicts",
                    reason: "every slot must use the run-level limit",
                });
            }
        }
        Ok(())
    }
}

/// Status counts for a set of verdicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub total: u32,
    pub not_tested: u32,
    pub approved: u32,
    pub rejected: u32,
    pub against_consumer: u32,
    pub critical_zone: u32,
}

impl RunTally {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut tally = Self::default();
        for v in verdicts {
            tally.record(v.status);
        }
        tally
    }

    pub fn record(&mut self, status: SlotStatus) {
        self.total += 1;
        match status {
            SlotStatus::NotTested => self.not_tested += 1,
            SlotStatus::Approved => self.approved += 1,
            SlotStatus::Rejected => self.rejected += 1,
            SlotStatus::AgainstConsumer => self.against_consumer += 1,
            SlotStatus::CriticalZone => self.critical_zone += 1,
        }
    }

    pub fn merge(&mut self, other: &RunTally) {
        self.total += other.total;
        self.not_tested += other.not_tested;
        self.approved += other.approved;
        self.rejected += other.rejected;
        self.against_consumer += other.against_consumer;
        self.critical_zone += other.critical_zone;
    }

    pub fn count(&self, status: SlotStatus) -> u32 {
        match status {
            SlotStatus::NotTested => self.not_tested,
            SlotStatus::Approved => self.approved,
            SlotStatus::Rejected => self.rejected,
            SlotStatus::AgainstConsumer => self.against_consumer,
            SlotStatus::CriticalZone => self.critical_zone,
        }
    }

    pub fn tested(&self) -> u32 {
        self.total - self.not_tested
    }

    /// Passing share of tested slots, in percent. CRITICAL_ZONE counts as passing.
    pub fn approval_rate_pct(&self) -> f64 {
        let tested = self.tested();
        if tested == 0 {
            return 0.0;
        }
        let passing: u32 = SlotStatus::ALL
            .into_iter()
            .filter(|s| s.is_passing())
            .map(|s| self.count(s))
            .sum();
        f64::from(passing) * 100.0 / f64::from(tested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(status: SlotStatus) -> Verdict {
        Verdict {
            schema_version: METRO_CONTRACT_VERSION,
            position: 1,
            status,
            reasons: Vec::new(),
            failing_channels: Vec::new(),
            guardband_channels: Vec::new(),
            limit_used: 1.3,
            guardband_used: None,
            against_consumer_points: 0,
        }
    }

    #[test]
    fn at_verdict_contract_01_approved_forbids_reasons_and_channels() {
        assert!(verdict(SlotStatus::Approved).validate().is_ok());
        let mut v = verdict(SlotStatus::Approved);
        v.failing_channels = vec![ChannelId::Light];
        assert!(v.validate().is_err());
    }

    #[test]
    fn at_verdict_contract_02_rejected_requires_ordered_reasons() {
        let mut v = verdict(SlotStatus::Rejected);
        assert!(v.validate().is_err());
        v.reasons = vec![FailureReason::Indicator, FailureReason::Register];
        assert!(v.validate().is_err());
        v.reasons = vec![FailureReason::Register, FailureReason::Indicator];
        assert!(v.validate().is_ok());
        assert_eq!(v.reason_summary(), "REGISTER / INDICATOR");
    }

    #[test]
    fn at_verdict_contract_03_accuracy_reason_tracks_failing_channels() {
        let mut v = verdict(SlotStatus::Rejected);
        v.reasons = vec![FailureReason::Accuracy];
        assert!(v.validate().is_err());
        v.failing_channels = vec![ChannelId::Nominal, ChannelId::Low];
        assert!(v.validate().is_ok());
        v.failing_channels = vec![ChannelId::Low, ChannelId::Nominal];
        assert!(v.validate().is_err());
    }

    #[test]
    fn at_verdict_contract_04_critical_zone_requires_guardband() {
        let mut v = verdict(SlotStatus::CriticalZone);
        v.guardband_channels = vec![ChannelId::Nominal];
        assert!(v.validate().is_err());
        v.guardband_used = Some(1.17);
        assert!(v.validate().is_ok());
        v.guardband_used = Some(1.5);
        assert!(v.validate().is_err());
    }

    #[test]
    fn at_verdict_contract_05_against_consumer_carries_only_its_reason() {
        let mut v = verdict(SlotStatus::AgainstConsumer);
        v.against_consumer_points = 2;
        v.reasons = vec![FailureReason::AgainstConsumer];
        v.failing_channels = vec![ChannelId::Nominal];
        assert!(v.validate().is_ok());
        v.reasons = vec![FailureReason::Accuracy, FailureReason::AgainstConsumer];
        assert!(v.validate().is_err());
    }

    #[test]
    fn at_verdict_contract_06_tally_rate_excludes_not_tested() {
        let verdicts = vec![
            verdict(SlotStatus::Approved),
            verdict(SlotStatus::NotTested),
            verdict(SlotStatus::Rejected),
            verdict(SlotStatus::CriticalZone),
            verdict(SlotStatus::AgainstConsumer),
        ];
        let tally = RunTally::from_verdicts(&verdicts);
        assert_eq!(tally.total, 5);
        assert_eq!(tally.tested(), 4);
        assert_eq!(tally.approval_rate_pct(), 50.0);
        assert_eq!(RunTally::default().approval_rate_pct(), 0.0);

        let mut merged = tally;
        merged.merge(&tally);
        assert_eq!(merged.total, 10);
        assert_eq!(merged.against_consumer, 2);
    }

    #[test]
    fn at_verdict_contract_07_passing_statuses_drive_the_rate() {
        let passing: Vec<SlotStatus> = SlotStatus::ALL
            .into_iter()
            .filter(|s| s.is_passing())
            .collect();
        assert_eq!(passing, vec![SlotStatus::Approved, SlotStatus::CriticalZone]);

        let mut tally = RunTally::default();
        for status in SlotStatus::ALL {
            tally.record(status);
        }
        for status in SlotStatus::ALL {
            assert_eq!(tally.count(status), 1, "{}", status.as_str());
        }
        assert_eq!(tally.approval_rate_pct(), 50.0);
    }
}
