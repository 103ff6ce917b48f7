#![forbid(unsafe_code)]

use metro_kernel_contracts::bench::{ChannelId, MeterSlot};

use crate::threshold::ResolvedThreshold;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    /// Channels whose absolute error strictly exceeds the limit.
    pub failing: Vec<ChannelId>,
    /// Non-failing channels whose absolute error strictly exceeds the guardband limit.
    pub guardband: Vec<ChannelId>,
    /// At least one failing channel carries a positive error (meter over-registers).
    pub positive_over_limit: bool,
}

impl ChannelOutcome {
    pub fn has_accuracy_failure(&self) -> bool {
        !self.failing.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelEvaluator {
    limit: f64,
    guardband_limit: Option<f64>,
}

impl ChannelEvaluator {
    pub fn new(threshold: &ResolvedThreshold) -> Self {
        Self {
            limit: threshold.limit,
            guardband_limit: threshold.guardband_limit,
        }
    }

    pub fn evaluate(&self, slot: &MeterSlot) -> ChannelOutcome {
        let mut out = ChannelOutcome {
            failing: Vec::new(),
            guardband: Vec::new(),
            positive_over_limit: false,
        };
        for (channel, reading) in slot.channel_readings() {
            // absent readings take no part in any comparison
            let Some(v) = reading else {
                continue;
            };
            if v.abs() > self.limit {
                out.failing.push(channel);
                if v > 0.0 {
                    out.positive_over_limit = true;
                }
            } else if self.guardband_limit.is_some_and(|gb| v.abs() > gb) {
                out.guardband.push(channel);
            }
        }
        out
    }
}
