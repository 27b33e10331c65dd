use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_space::{Case, CaseSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::collab::{InputArtifact, Solver, SolverFailure, StepOutput, StepRequest, Templater};
use crate::graph::{DryRunPlan, JobGraph, JobId, JobKind};
use crate::report::{CaseFailure, CaseResult, JobRecord, JobState, RunOutcome, RunReport};
use crate::store::{case_fingerprint, CaseState, CaseStatus, WorkDir};

/// Options governing graph execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOpts {
    /// Maximum number of solver invocations in flight.
    #[serde(default = "RunOpts::default_concurrency")]
    pub concurrency: usize,
    /// Reuse completed cases found in the work directory.
    #[serde(default)]
    pub resume: bool,
    /// Where inputs, step outputs and statuses are persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl RunOpts {
    fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
            resume: false,
            work_dir: None,
        }
    }
}

/// Dispatches the job graph of a case set over a bounded worker pool.
///
/// The scheduling loop runs on the calling thread and is the only writer of
/// job state; workers send completions back over a channel.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    opts: RunOpts,
}

type Completion = (JobId, Result<StepOutput, SolverFailure>);

impl Runner {
    /// Creates a runner with the given options.
    pub fn new(opts: RunOpts) -> Self {
        Self { opts }
    }

    /// Options in use.
    pub fn opts(&self) -> &RunOpts {
        &self.opts
    }

    /// Builds and validates the graph without dispatching anything.
    pub fn plan(&self, cases: &CaseSet) -> Result<DryRunPlan, OlmError> {
        let plan = JobGraph::build(cases).plan(self.opts.concurrency)?;
        info!(
            cases = plan.cases,
            steps = plan.steps,
            waves = plan.critical_path,
            "dry run planned"
        );
        Ok(plan)
    }

    /// Renders every case, then runs all step jobs respecting their dependencies.
    ///
    /// Only configuration and persistence problems are returned as errors; a
    /// failing solver marks its case failed and the rest of the run continues.
    /// A persistence failure during dispatch still lets the graph drain and
    /// `run_report.json` be written before the error is returned.
    pub fn run(
        &self,
        cases: &CaseSet,
        templater: &dyn Templater,
        solver: &dyn Solver,
    ) -> Result<RunOutcome, OlmError> {
        if self.opts.resume && self.opts.work_dir.is_none() {
            return Err(OlmError::configuration(
                "resume_without_work_dir",
                "resume requires a work directory",
            ));
        }
        let graph = JobGraph::build(cases);
        graph.validate()?;
        let case_set_hash = cases.hash()?;
        let span = info_span!("run", case_set = %case_set_hash);
        let _guard = span.enter();

        let case_list: Vec<Case> = cases.cases().collect();
        let inputs = case_list
            .iter()
            .map(|case| render(templater, case))
            .collect::<Result<Vec<_>, _>>()?;
        let fingerprints = case_list
            .iter()
            .zip(&inputs)
            .map(|(case, input)| case_fingerprint(case, input))
            .collect::<Result<Vec<_>, _>>()?;
        let store = self
            .opts
            .work_dir
            .as_ref()
            .map(|dir| WorkDir::open(dir.clone()))
            .transpose()?;

        let mut case_jobs: Vec<Vec<JobId>> = vec![Vec::new(); case_list.len()];
        for node in graph.nodes() {
            case_jobs[node.kind.case()].push(node.id);
        }

        let mut states = vec![JobState::Pending; graph.len()];
        let mut errors: Vec<Option<String>> = vec![None; graph.len()];
        let mut resumed = vec![false; graph.len()];
        let mut outputs: Vec<Vec<Option<StepOutput>>> = case_list
            .iter()
            .map(|case| vec![None; case.schedule.len()])
            .collect();
        let mut failures: Vec<(usize, CaseFailure)> = Vec::new();
        let mut resumed_cases = 0usize;

        if let Some(store) = &store {
            for ((case, input), fingerprint) in case_list.iter().zip(&inputs).zip(&fingerprints) {
                if self.opts.resume {
                    let loaded =
                        store.load_complete(&case.id, case.schedule.len(), fingerprint)?;
                    if let Some(loaded) = loaded {
                        for job in &case_jobs[case.index()] {
                            states[job.0] = JobState::Succeeded;
                            resumed[job.0] = true;
                        }
                        outputs[case.index()] = loaded.into_iter().map(Some).collect();
                        resumed_cases += 1;
                        debug!(case = %case.id, "resumed from work directory");
                        continue;
                    }
                }
                store.cleanup_incomplete(&case.id);
                store.write_input(&case.id, input)?;
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.concurrency.max(1))
            .build()
            .map_err(|err| OlmError::configuration("thread_pool", err.to_string()))?;
        let dependents = graph.dependents();
        let mut ready: VecDeque<JobId> = graph
            .nodes()
            .iter()
            .filter(|node| {
                states[node.id.0] == JobState::Pending
                    && node.deps.iter().all(|dep| states[dep.0] == JobState::Succeeded)
            })
            .map(|node| node.id)
            .collect();
        info!(
            cases = case_list.len(),
            jobs = graph.len(),
            resumed = resumed_cases,
            concurrency = self.opts.concurrency.max(1),
            "dispatching job graph"
        );

        let (tx, rx) = mpsc::channel::<Completion>();
        let mut persist_error: Option<OlmError> = None;
        pool.in_place_scope(|scope| {
            let mut in_flight = 0usize;
            loop {
                while let Some(id) = ready.pop_front() {
                    let node = &graph.nodes()[id.0];
                    match node.kind {
                        JobKind::Aggregate { case } => {
                            states[id.0] = JobState::Succeeded;
                            let status = CaseStatus {
                                state: CaseState::Complete,
                                steps_completed: case_list[case].schedule.len(),
                                error: None,
                                fingerprint: Some(fingerprints[case].clone()),
                            };
                            if let Some(store) = &store {
                                if let Err(err) = store.write_status(&node.case_id, &status) {
                                    persist_error.get_or_insert(err);
                                }
                            }
                            debug!(case = %node.case_id, "case complete");
                        }
                        JobKind::Step { case, step } => {
                            states[id.0] = JobState::Running;
                            let previous = step
                                .checked_sub(1)
                                .and_then(|prior| outputs[case][prior].clone());
                            let case_ref = &case_list[case];
                            let input = &inputs[case];
                            let tx = tx.clone();
                            scope.spawn(move |_| {
                                let request = StepRequest {
                                    case: case_ref,
                                    input,
                                    step: &case_ref.schedule.steps()[step],
                                    previous: previous.as_ref(),
                                };
                                let result =
                                    panic::catch_unwind(AssertUnwindSafe(|| solver.execute(&request)))
                                        .unwrap_or_else(|_| {
                                            Err(SolverFailure::new("solver_panic", "solver panicked"))
                                        });
                                let _ = tx.send((id, result));
                            });
                            in_flight += 1;
                        }
                    }
                }
                if in_flight == 0 {
                    break;
                }
                let Ok((id, result)) = rx.recv() else {
                    break;
                };
                in_flight -= 1;
                let node = &graph.nodes()[id.0];
                let JobKind::Step { case, step } = node.kind else {
                    continue;
                };
                match result {
                    Ok(output) => {
                        if let Some(store) = &store {
                            if let Err(err) = store.write_step(&node.case_id, step, &output) {
                                persist_error.get_or_insert(err);
                            }
                        }
                        outputs[case][step] = Some(output);
                        states[id.0] = JobState::Succeeded;
                        for child in &dependents[id.0] {
                            let child_node = &graph.nodes()[child.0];
                            if states[child.0] == JobState::Pending
                                && child_node
                                    .deps
                                    .iter()
                                    .all(|dep| states[dep.0] == JobState::Succeeded)
                            {
                                ready.push_back(*child);
                            }
                        }
                    }
                    Err(failure) => {
                        let message = format!("{}: {}", failure.code, failure.message);
                        warn!(case = %node.case_id, step, error = %message, "step failed");
                        states[id.0] = JobState::Failed;
                        errors[id.0] = Some(message.clone());
                        skip_downstream(id, &dependents, &mut states, &mut errors);
                        if let Some(store) = &store {
                            let status = CaseStatus {
                                state: CaseState::Failed,
                                steps_completed: step,
                                error: Some(message.clone()),
                                fingerprint: Some(fingerprints[case].clone()),
                            };
                            if let Err(err) = store.write_status(&node.case_id, &status) {
                                persist_error.get_or_insert(err);
                            }
                        }
                        failures.push((
                            case,
                            CaseFailure {
                                case_id: node.case_id.clone(),
                                step,
                                error: message,
                            },
                        ));
                    }
                }
            }
        });

        failures.sort_by_key(|(case, _)| *case);
        let records = graph
            .nodes()
            .iter()
            .map(|node| JobRecord {
                id: node.id,
                kind: node.kind,
                case_id: node.case_id.clone(),
                state: states[node.id.0],
                resumed: resumed[node.id.0],
                error: errors[node.id.0].clone(),
            })
            .collect();
        let report = RunReport::new(
            case_set_hash,
            records,
            failures.into_iter().map(|(_, failure)| failure).collect(),
            resumed_cases,
        );
        if let Some(store) = &store {
            store.write_report(&report)?;
        }
        if let Some(err) = persist_error {
            warn!(error = %err, "run report written after a persistence failure");
            return Err(err);
        }
        info!(
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            success = report.success,
            "run finished"
        );

        let results = case_list
            .into_iter()
            .zip(outputs)
            .zip(&case_jobs)
            .map(|((case, steps), jobs)| {
                let complete = jobs
                    .iter()
                    .all(|job| states[job.0] == JobState::Succeeded);
                CaseResult {
                    outputs: if complete {
                        steps.into_iter().flatten().collect()
                    } else {
                        Vec::new()
                    },
                    complete,
                    case,
                }
            })
            .collect();
        Ok(RunOutcome { report, results })
    }
}

fn render(templater: &dyn Templater, case: &Case) -> Result<InputArtifact, OlmError> {
    templater.render(case).map_err(|err| {
        OlmError::Configuration(
            ErrorInfo::new("template_render", err.to_string())
                .with_context("case", case.id.to_string()),
        )
    })
}

fn skip_downstream(
    failed: JobId,
    dependents: &[Vec<JobId>],
    states: &mut [JobState],
    errors: &mut [Option<String>],
) {
    let mut queue: VecDeque<JobId> = dependents[failed.0].iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        if states[id.0] != JobState::Pending {
            continue;
        }
        states[id.0] = JobState::Skipped;
        errors[id.0] = Some(format!("upstream {failed} failed"));
        queue.extend(dependents[id.0].iter().copied());
    }
}
