#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::sync::Arc;

use metro_kernel_contracts::bench::BenchKind;

use crate::config::IndicatorPolicyKind;

pub const TEN_SLOT_EXPECTED_TOKEN: &str = "+";
pub const DEFAULT_EXPECTED_TOKEN: &str = "OK";
pub const REJECTION_TOKENS: [&str; 4] = ["REPROVADO", "NOK", "FAIL", "-"];

/// Decides whether a slot's visual indicator verdict counts as a failure.
///
/// The two lab conventions disagree on some tokens, so a deployment picks one.
pub trait IndicatorPolicy: Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn indicator_fails(&self, token: &str, bench: BenchKind) -> bool;
}

/// Exact match against the token the bench prints for a pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BenchTokenPolicy;

impl BenchTokenPolicy {
    pub fn expected_token(bench: BenchKind) -> &'static str {
        match bench {
            BenchKind::TenSlot => TEN_SLOT_EXPECTED_TOKEN,
            BenchKind::TwentySlot | BenchKind::Other => DEFAULT_EXPECTED_TOKEN,
        }
    }
}

impl IndicatorPolicy for BenchTokenPolicy {
    fn name(&self) -> &'static str {
        "BENCH_TOKEN"
    }

    fn indicator_fails(&self, token: &str, bench: BenchKind) -> bool {
        token.trim() != Self::expected_token(bench)
    }
}

/// Fails on any known rejection token; everything else passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlocklistPolicy;

impl IndicatorPolicy for BlocklistPolicy {
    fn name(&self) -> &'static str {
        "BLOCKLIST"
    }

    fn indicator_fails(&self, token: &str, _bench: BenchKind) -> bool {
        let upper = token.trim().to_uppercase();
        REJECTION_TOKENS.contains(&upper.as_str())
    }
}

pub fn policy_for(kind: IndicatorPolicyKind) -> Arc<dyn IndicatorPolicy> {
    match kind {
        IndicatorPolicyKind::BenchToken => Arc::new(BenchTokenPolicy),
        IndicatorPolicyKind::Blocklist => Arc::new(BlocklistPolicy),
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorEvaluator {
    policy: Arc<dyn IndicatorPolicy>,
}

impl IndicatorEvaluator {
    pub fn new(policy: Arc<dyn IndicatorPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn has_failure(&self, token: &str, bench: BenchKind) -> bool {
        self.policy.indicator_fails(token, bench)
    }
}
