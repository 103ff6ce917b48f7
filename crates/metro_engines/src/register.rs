#![forbid(unsafe_code)]

pub const REGISTER_EXPECTED_INCREMENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterOutcome {
    /// `end - start`, or `None` when the check was skipped.
    pub delta: Option<f64>,
    pub has_failure: bool,
    /// Register advanced by more than the expected unit.
    pub oversized_increment: bool,
}

impl RegisterOutcome {
    pub fn skipped() -> Self {
        Self {
            delta: None,
            has_failure: false,
            oversized_increment: false,
        }
    }
}

/// Exact `delta != 1` comparison unless a tolerance is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterEvaluator {
    tolerance: f64,
}

impl RegisterEvaluator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn evaluate(&self, start: Option<f64>, end: Option<f64>) -> RegisterOutcome {
        let (Some(start), Some(end)) = (start, end) else {
            return RegisterOutcome::skipped();
        };
        let delta = end - start;
        let deviation = delta - REGISTER_EXPECTED_INCREMENT;
        RegisterOutcome {
            delta: Some(delta),
            has_failure: deviation.abs() > self.tolerance,
            oversized_increment: deviation > self.tolerance,
        }
    }
}
