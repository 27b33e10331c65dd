use std::collections::BTreeMap;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_space::{Case, CaseId};
use serde::{Deserialize, Serialize};

use crate::collab::StepOutput;
use crate::graph::{JobId, JobKind};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// Not dispatched yet.
    Pending,
    /// Handed to a worker.
    Running,
    /// Finished without error.
    Succeeded,
    /// The solver reported a failure.
    Failed,
    /// Not run because an upstream job failed.
    Skipped,
}

impl JobState {
    /// True once the job will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Skipped
        )
    }
}

/// Final record of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: JobId,
    /// Work the job performed.
    pub kind: JobKind,
    /// Owning case.
    pub case_id: CaseId,
    /// Terminal state.
    pub state: JobState,
    /// True when the result was loaded from a previous run.
    #[serde(default)]
    pub resumed: bool,
    /// Failure or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-state job counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunSummary {
    /// Total jobs in the graph.
    pub total: usize,
    /// Jobs that succeeded (including resumed ones).
    pub succeeded: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs skipped because of an upstream failure.
    pub skipped: usize,
    /// Jobs still pending; non-zero only if the run was interrupted.
    pub pending: usize,
    /// Cases restored from the work directory.
    pub resumed_cases: usize,
}

impl RunSummary {
    /// Tallies the records.
    pub fn from_records(records: &[JobRecord], resumed_cases: usize) -> Self {
        let mut summary = Self {
            total: records.len(),
            resumed_cases,
            ..Self::default()
        };
        for record in records {
            match record.state {
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Failed => summary.failed += 1,
                JobState::Skipped => summary.skipped += 1,
                JobState::Pending | JobState::Running => summary.pending += 1,
            }
        }
        summary
    }
}

/// The first failure of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
    /// Failed case.
    pub case_id: CaseId,
    /// Step whose solver invocation failed.
    pub step: usize,
    /// Failure message.
    pub error: String,
}

/// Outcome of dispatching a job graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// True only when every job succeeded.
    pub success: bool,
    /// Stable hash of the case set that was run.
    pub case_set_hash: String,
    /// Aggregate counts.
    pub summary: RunSummary,
    /// Failed cases in expansion order.
    pub failures: Vec<CaseFailure>,
    /// Every job in arena order.
    pub jobs: Vec<JobRecord>,
}

impl RunReport {
    /// Builds the report from the final job records.
    pub fn new(
        case_set_hash: String,
        jobs: Vec<JobRecord>,
        failures: Vec<CaseFailure>,
        resumed_cases: usize,
    ) -> Self {
        let summary = RunSummary::from_records(&jobs, resumed_cases);
        Self {
            success: summary.succeeded == summary.total,
            case_set_hash,
            summary,
            failures,
            jobs,
        }
    }

    /// Converts an unsuccessful run into an external error listing failed cases.
    pub fn ensure_success(&self) -> Result<(), OlmError> {
        if self.success {
            return Ok(());
        }
        let mut info = ErrorInfo::new(
            "run_failed",
            format!(
                "{} of {} jobs failed and {} were skipped",
                self.summary.failed, self.summary.total, self.summary.skipped
            ),
        );
        for failure in &self.failures {
            info = info.with_context(
                failure.case_id.to_string(),
                format!("step {}: {}", failure.step, failure.error),
            );
        }
        Err(OlmError::External(info))
    }
}

/// Step outputs of one case, present only when every step succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    /// The case that was run.
    pub case: Case,
    /// Outputs in step order; empty for failed cases.
    pub outputs: Vec<StepOutput>,
    /// Whether all steps and the aggregate succeeded.
    pub complete: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Job level report.
    pub report: RunReport,
    /// Per-case results in expansion order.
    pub results: Vec<CaseResult>,
}

impl RunOutcome {
    /// Results of the cases that completed.
    pub fn completed(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|result| result.complete)
    }

    /// Complete results keyed by case id.
    pub fn by_case(&self) -> BTreeMap<&CaseId, &CaseResult> {
        self.completed()
            .map(|result| (&result.case.id, result))
            .collect()
    }
}
