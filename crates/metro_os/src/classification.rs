#![forbid(unsafe_code)]

use metro_engines::RunClassifier;
use metro_kernel_contracts::bench::TestRun;
use metro_kernel_contracts::verdict::RunVerdict;
use metro_kernel_contracts::{ContractViolation, ReasonCodeId, Validate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ingest::{test_run_from_row, TabularRow};
use crate::report::RunReport;

pub mod reason_codes {
    use metro_kernel_contracts::ReasonCodeId;

    // Classification wiring reason-code namespace.
    pub const CLASSIFY_ENGINE_OUTPUT_INVALID: ReasonCodeId = ReasonCodeId(0x4D45_0101);
    pub const CLASSIFY_ENGINE_RUN_MISMATCH: ReasonCodeId = ReasonCodeId(0x4D45_0102);
    pub const CLASSIFY_ROW_REJECTED: ReasonCodeId = ReasonCodeId(0x4D45_01F1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationWiringConfig {
    /// Keep NOT_TESTED slots in run reports. Tallies always count them.
    pub include_not_tested_slots: bool,
    pub parallel_batch: bool,
}

impl ClassificationWiringConfig {
    pub fn mvp_v1() -> Self {
        Self {
            include_not_tested_slots: true,
            parallel_batch: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Classified(RunReport),
    Refused {
        reason_code: ReasonCodeId,
        message: &'static str,
    },
}

pub trait RunClassificationEngine {
    fn classify(&self, run: &TestRun) -> RunVerdict;
}

impl RunClassificationEngine for RunClassifier {
    fn classify(&self, run: &TestRun) -> RunVerdict {
        RunClassifier::classify(self, run)
    }
}

/// A row that produced no report, by input position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_index: usize,
    pub reason_code: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
    /// In input order.
    pub reports: Vec<RunReport>,
    pub issues: Vec<RowIssue>,
}

#[derive(Debug, Clone)]
pub struct ClassificationWiring<E>
where
    E: RunClassificationEngine,
{
    config: ClassificationWiringConfig,
    engine: E,
}

impl<E> ClassificationWiring<E>
where
    E: RunClassificationEngine,
{
    pub fn new(config: ClassificationWiringConfig, engine: E) -> Self {
        Self { config, engine }
    }

    pub fn classify_run(&self, run: &TestRun) -> Result<ClassificationOutcome, ContractViolation> {
        run.validate()?;

        let verdict = self.engine.classify(run);
        if verdict.validate().is_err() {
            warn!(run_id = %run.run_id, "engine verdict failed contract validation");
            return Ok(ClassificationOutcome::Refused {
                reason_code: reason_codes::CLASSIFY_ENGINE_OUTPUT_INVALID,
                message: "invalid run verdict contract",
            });
        }
        if verdict.run_id != run.run_id || verdict.bench != run.bench {
            warn!(
                run_id = %run.run_id,
                verdict_run_id = %verdict.run_id,
                "engine answered for another run"
            );
            return Ok(ClassificationOutcome::Refused {
                reason_code: reason_codes::CLASSIFY_ENGINE_RUN_MISMATCH,
                message: "run verdict does not match the submitted run",
            });
        }

        let report = RunReport::build(run, &verdict, self.config.include_not_tested_slots)?;
        info!(
            run_id = %report.run_id,
            bench = report.bench.as_str(),
            class = report.resolved_class.as_str(),
            approved = report.tally.approved,
            rejected = report.tally.rejected,
            against_consumer = report.tally.against_consumer,
            critical_zone = report.tally.critical_zone,
            "run classified"
        );
        Ok(ClassificationOutcome::Classified(report))
    }

    pub fn classify_row(
        &self,
        row: &TabularRow,
    ) -> Result<ClassificationOutcome, ContractViolation> {
        let run = test_run_from_row(row)?;
        self.classify_run(&run)
    }

    fn classify_indexed(&self, row_index: usize, row: &TabularRow) -> Result<RunReport, RowIssue> {
        match self.classify_row(row) {
            Ok(ClassificationOutcome::Classified(report)) => Ok(report),
            Ok(ClassificationOutcome::Refused {
                reason_code,
                message,
            }) => Err(RowIssue {
                row_index,
                reason_code: reason_code.0,
                message: message.to_string(),
            }),
            Err(violation) => {
                warn!(row_index, %violation, "row skipped");
                Err(RowIssue {
                    row_index,
                    reason_code: reason_codes::CLASSIFY_ROW_REJECTED.0,
                    message: violation.to_string(),
                })
            }
        }
    }
}

impl<E> ClassificationWiring<E>
where
    E: RunClassificationEngine + Sync,
{
    /// Bulk reprocessing; one bad row never stops the batch.
    pub fn classify_batch(&self, rows: &[TabularRow]) -> BatchOutcome {
        let results: Vec<Result<RunReport, RowIssue>> = if self.config.parallel_batch {
            rows.par_iter()
                .enumerate()
                .map(|(idx, row)| self.classify_indexed(idx, row))
                .collect()
        } else {
            rows.iter()
                .enumerate()
                .map(|(idx, row)| self.classify_indexed(idx, row))
                .collect()
        };

        let mut out = BatchOutcome::default();
        for result in results {
            match result {
                Ok(report) => out.reports.push(report),
                Err(issue) => out.issues.push(issue),
            }
        }
        info!(
            rows = rows.len(),
            reports = out.reports.len(),
            issues = out.issues.len(),
            "batch classified"
        );
        out
    }
}
