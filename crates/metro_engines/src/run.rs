#![forbid(unsafe_code)]

use metro_kernel_contracts::bench::TestRun;
use metro_kernel_contracts::verdict::RunVerdict;
use metro_kernel_contracts::{ContractViolation, Validate, METRO_CONTRACT_VERSION};
use tracing::debug;

use crate::config::EngineConfig;
use crate::slot::SlotClassifier;
use crate::threshold::{ResolvedThreshold, ThresholdResolver};

/// Classifies every slot of one run. Stateless across runs.
#[derive(Debug, Clone)]
pub struct RunClassifier {
    config: EngineConfig,
    resolver: ThresholdResolver,
    slots: SlotClassifier,
}

impl RunClassifier {
    pub fn new(config: EngineConfig) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self::with_slot_classifier(
            config,
            SlotClassifier::from_config(&config),
        ))
    }

    pub fn mvp_v1() -> Self {
        let config = EngineConfig::mvp_v1();
        Self::with_slot_classifier(config, SlotClassifier::from_config(&config))
    }

    /// For deployments that plug in their own indicator or against-consumer strategy.
    pub fn with_slot_classifier(config: EngineConfig, slots: SlotClassifier) -> Self {
        Self {
            config,
            resolver: ThresholdResolver::new(&config),
            slots,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolve_threshold(&self, run: &TestRun) -> ResolvedThreshold {
        self.resolver.resolve(&run.declared_class, run.bench)
    }

    /// Assumes the run passed `TestRun::validate`; slot order is taken as given.
    pub fn classify(&self, run: &TestRun) -> RunVerdict {
        let threshold = self.resolve_threshold(run);
        debug!(
            run_id = %run.run_id,
            class = threshold.class.as_str(),
            limit = threshold.limit,
            defaulted = threshold.defaulted,
            indicator_policy = self.slots.indicator_policy_name(),
            "threshold resolved"
        );
        let verdicts = run
            .slots
            .iter()
            .map(|slot| self.slots.classify(slot, run.bench, &threshold))
            .collect();
        RunVerdict {
            schema_version: METRO_CONTRACT_VERSION,
            run_id: run.run_id.clone(),
            bench: run.bench,
            resolved_class: threshold.class,
            limit_used: threshold.limit,
            guardband_used: threshold.guardband_limit,
            verdicts,
        }
    }
}
