#![deny(missing_docs)]
#![doc = "Job graph construction and bounded parallel dispatch of OLM cases."]

/// Templating and solver collaborators with the built-in implementations.
pub mod collab;
/// Job arena, validation and dry-run planning.
pub mod graph;
/// Job states and run reports.
pub mod report;
/// Scheduling loop over the rayon worker pool.
pub mod runner;
/// Work directory persistence used for resume.
pub mod store;

pub use collab::{
    AnalyticSolver, CommandSolver, InputArtifact, JsonTemplater, Quantities, Quantity, Solver,
    SolverFailure, StepOutput, StepRequest, Templater,
};
pub use graph::{DryRunPlan, JobGraph, JobId, JobKind, JobNode};
pub use report::{
    CaseFailure, CaseResult, JobRecord, JobState, RunOutcome, RunReport, RunSummary,
};
pub use runner::{RunOpts, Runner};
pub use store::{case_fingerprint, CaseState, CaseStatus, WorkDir};
