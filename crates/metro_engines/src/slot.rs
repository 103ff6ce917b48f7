#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::sync::Arc;

use metro_kernel_contracts::bench::{BenchKind, MeterSlot};
use metro_kernel_contracts::verdict::{FailureReason, SlotStatus, Verdict};
use metro_kernel_contracts::METRO_CONTRACT_VERSION;
use tracing::debug;

use crate::channel::{ChannelEvaluator, ChannelOutcome};
use crate::config::EngineConfig;
use crate::indicator::{policy_for, IndicatorEvaluator, IndicatorPolicy};
use crate::register::{RegisterEvaluator, RegisterOutcome};
use crate::threshold::ResolvedThreshold;

/// Scores independent evidence that a meter over-registers against the consumer.
pub trait AgainstConsumerRule: Debug + Send + Sync {
    fn points(
        &self,
        channels: &ChannelOutcome,
        register: &RegisterOutcome,
        indicator_failed: bool,
    ) -> u8;

    fn fires(&self, points: u8) -> bool;
}

/// One point each for: a positive over-limit channel, a failed indicator, an
/// oversized register increment. Fires at `min_points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorroboratedOverRegistration {
    pub min_points: u8,
}

impl AgainstConsumerRule for CorroboratedOverRegistration {
    fn points(
        &self,
        channels: &ChannelOutcome,
        register: &RegisterOutcome,
        indicator_failed: bool,
    ) -> u8 {
        [
            channels.positive_over_limit,
            indicator_failed,
            register.oversized_increment,
        ]
        .into_iter()
        .filter(|hit| *hit)
        .count() as u8
    }

    fn fires(&self, points: u8) -> bool {
        points >= self.min_points
    }
}

#[derive(Debug, Clone)]
pub struct SlotClassifier {
    indicator: IndicatorEvaluator,
    register: RegisterEvaluator,
    against_consumer: Arc<dyn AgainstConsumerRule>,
}

impl SlotClassifier {
    pub fn new(
        indicator_policy: Arc<dyn IndicatorPolicy>,
        against_consumer: Arc<dyn AgainstConsumerRule>,
    ) -> Self {
        Self {
            indicator: IndicatorEvaluator::new(indicator_policy),
            register: RegisterEvaluator::default(),
            against_consumer,
        }
    }

    pub fn with_register_tolerance(mut self, tolerance: f64) -> Self {
        self.register = RegisterEvaluator::new(tolerance);
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            policy_for(config.indicator_policy),
            Arc::new(CorroboratedOverRegistration {
                min_points: config.against_consumer_min_points,
            }),
        )
        .with_register_tolerance(config.register_tolerance)
    }

    pub fn indicator_policy_name(&self) -> &'static str {
        self.indicator.policy_name()
    }

    /// Strict priority: NOT_TESTED, AGAINST_CONSUMER, REJECTED, CRITICAL_ZONE, APPROVED.
    pub fn classify(
        &self,
        slot: &MeterSlot,
        bench: BenchKind,
        threshold: &ResolvedThreshold,
    ) -> Verdict {
        let mut verdict = Verdict {
            schema_version: METRO_CONTRACT_VERSION,
            position: slot.position,
            status: SlotStatus::NotTested,
            reasons: Vec::new(),
            failing_channels: Vec::new(),
            guardband_channels: Vec::new(),
            limit_used: threshold.limit,
            guardband_used: threshold.guardband_limit,
            against_consumer_points: 0,
        };
        if slot.all_channels_absent() {
            debug!(position = slot.position, "slot not tested");
            return verdict;
        }

        let channels = ChannelEvaluator::new(threshold).evaluate(slot);
        let register = self
            .register
            .evaluate(slot.register_start, slot.register_end);
        let indicator_failed = self.indicator.has_failure(&slot.indicator, bench);

        let points = self
            .against_consumer
            .points(&channels, &register, indicator_failed);
        verdict.against_consumer_points = points;

        if self.against_consumer.fires(points) {
            verdict.status = SlotStatus::AgainstConsumer;
            verdict.reasons = vec![FailureReason::AgainstConsumer];
            verdict.failing_channels = channels.failing;
        } else if channels.has_accuracy_failure() || register.has_failure || indicator_failed {
            verdict.status = SlotStatus::Rejected;
            if channels.has_accuracy_failure() {
                verdict.reasons.push(FailureReason::Accuracy);
            }
            if register.has_failure {
                verdict.reasons.push(FailureReason::Register);
            }
            if indicator_failed {
                verdict.reasons.push(FailureReason::Indicator);
            }
            verdict.failing_channels = channels.failing;
        } else if !channels.guardband.is_empty() {
            verdict.status = SlotStatus::CriticalZone;
            verdict.guardband_channels = channels.guardband;
        } else {
            verdict.status = SlotStatus::Approved;
        }

        debug!(
            position = slot.position,
            status = verdict.status.as_str(),
            points,
            reasons = %verdict.reason_summary(),
            "slot classified"
        );
        verdict
    }
}
