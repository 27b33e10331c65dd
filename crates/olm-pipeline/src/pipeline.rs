use std::fs;
use std::path::{Path, PathBuf};

use olm_check::{CheckReport, ConsistencyChecker, ReferenceSet};
use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::provenance::RunProvenance;
use olm_core::serde::{from_json_slice, to_canonical_json_pretty};
use olm_lib::{save_library, Assembler, Library, LibraryFormat, LibrarySummary};
use olm_run::{CaseResult, DryRunPlan, JsonTemplater, RunOutcome, RunReport, Runner, StepOutput};
use olm_space::CaseSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::config::PipelineConfig;

/// Tool name recorded in library provenance.
pub const TOOL_NAME: &str = "olm";

fn io_error(code: &str, path: &Path, err: impl ToString) -> OlmError {
    OlmError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OlmError> {
    let bytes = to_canonical_json_pretty(value)?;
    fs::write(path, bytes).map_err(|err| io_error("artifact_write", path, err))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, OlmError> {
    let bytes = fs::read(path).map_err(|err| io_error("artifact_read", path, err))?;
    from_json_slice(&bytes)
}

/// Locations of every artefact a pipeline run writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Output directory.
    pub dir: PathBuf,
    /// Canonical copy of the configuration.
    pub config: PathBuf,
    /// Case manifest.
    pub manifest: PathBuf,
    /// Dry-run plan.
    pub plan: PathBuf,
    /// Run report.
    pub run_report: PathBuf,
    /// Full-resolution outputs used by the checks.
    pub reference: PathBuf,
    /// Assembled library.
    pub library: PathBuf,
    /// Consistency check report.
    pub check_report: PathBuf,
}

impl OutputPaths {
    /// Conventional file names under `dir`.
    pub fn new(dir: impl Into<PathBuf>, format: LibraryFormat) -> Self {
        let dir = dir.into();
        Self {
            config: dir.join("config.yaml"),
            manifest: dir.join("manifest.json"),
            plan: dir.join("plan.json"),
            run_report: dir.join("run_report.json"),
            reference: dir.join("reference.json"),
            library: dir.join(format!("library.{}", format.extension())),
            check_report: dir.join("check_report.json"),
            dir,
        }
    }

    /// Paths for the configured output directory and format.
    pub fn for_config(config: &PipelineConfig) -> Self {
        Self::new(config.output_dir(), config.output.format)
    }

    fn create(&self) -> Result<(), OlmError> {
        fs::create_dir_all(&self.dir).map_err(|err| io_error("output_dir", &self.dir, err))
    }
}

/// What an end-to-end invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Where artefacts were written.
    pub paths: OutputPaths,
    /// Present for dry runs.
    pub plan: Option<DryRunPlan>,
    /// Present once the runner finished.
    pub run: Option<RunReport>,
    /// Present once the library was assembled.
    pub library: Option<LibrarySummary>,
    /// Present once checks were evaluated.
    pub checks: Option<CheckReport>,
}

impl PipelineOutcome {
    /// True when the run succeeded and every check passed; dry runs count as success.
    pub fn success(&self) -> bool {
        self.run.as_ref().map_or(true, |run| run.success)
            && self.checks.as_ref().map_or(true, |checks| checks.pass)
    }
}

/// Validates the configuration and plans the job graph without running anything.
pub fn plan(config: &PipelineConfig) -> Result<DryRunPlan, OlmError> {
    let cases = config.case_set()?;
    Runner::new(config.run_opts()).plan(&cases)
}

/// Runs every case of `cases` with the configured solver.
pub fn execute(config: &PipelineConfig, cases: &CaseSet) -> Result<RunOutcome, OlmError> {
    let solver = config.solver();
    Runner::new(config.run_opts()).run(cases, &JsonTemplater, solver.as_ref())
}

/// Assembles the library from run results, stamping provenance.
pub fn assemble(
    config: &PipelineConfig,
    cases: &CaseSet,
    results: &[CaseResult],
) -> Result<Library, OlmError> {
    let provenance = RunProvenance::stamp(
        config.config_hash()?,
        cases.hash()?,
        TOOL_NAME,
        env!("CARGO_PKG_VERSION"),
    );
    Assembler::new(config.assembly.clone())?.assemble(cases.space(), results, provenance)
}

/// Evaluates the configured checks.
pub fn check(
    config: &PipelineConfig,
    library: &Library,
    reference: &ReferenceSet,
) -> Result<CheckReport, OlmError> {
    ConsistencyChecker::new(config.checks.clone())?.run(library, reference)
}

/// Rebuilds case results from persisted reference outputs.
///
/// Cases absent from the reference come back incomplete; a reference whose
/// burnups disagree with the case schedule is rejected.
pub fn results_from_reference(
    cases: &CaseSet,
    reference: &ReferenceSet,
) -> Result<Vec<CaseResult>, OlmError> {
    cases
        .cases()
        .map(|case| match reference.get(&case.id) {
            Some(stored) => {
                if stored.burnups != case.schedule.burnups()
                    || stored.steps.len() != stored.burnups.len()
                {
                    return Err(OlmError::Schema(
                        ErrorInfo::new(
                            "reference_mismatch",
                            "reference outputs do not match the case burnup schedule",
                        )
                        .with_context("case", case.id.to_string())
                        .with_hint("re-run the cases with the current configuration"),
                    ));
                }
                let outputs = stored
                    .steps
                    .iter()
                    .map(|quantities| StepOutput {
                        quantities: quantities.clone(),
                        ..StepOutput::default()
                    })
                    .collect();
                Ok(CaseResult {
                    case,
                    outputs,
                    complete: true,
                })
            }
            None => Ok(CaseResult {
                case,
                outputs: Vec::new(),
                complete: false,
            }),
        })
        .collect()
}

/// Reads a reference set written by a previous run.
pub fn load_reference(path: &Path) -> Result<ReferenceSet, OlmError> {
    read_json(path)
}

/// Writes a reference set.
pub fn save_reference(reference: &ReferenceSet, path: &Path) -> Result<(), OlmError> {
    write_json(path, reference)
}

/// Writes any report as canonical pretty JSON.
pub fn save_report<T: Serialize>(report: &T, path: &Path) -> Result<(), OlmError> {
    write_json(path, report)
}

/// Expands, runs, assembles and checks, writing every artefact under the
/// output directory. With `dry_run` only the plan is produced.
///
/// Case failures stop the pipeline after the run report is written; failing
/// checks do not, they are reported in the outcome.
pub fn run_pipeline(config: &PipelineConfig, dry_run: bool) -> Result<PipelineOutcome, OlmError> {
    let cases = config.case_set()?;
    let paths = OutputPaths::for_config(config);
    let span = info_span!("pipeline", library = %config.assembly.name);
    let _guard = span.enter();
    paths.create()?;
    fs::write(&paths.config, config.to_yaml_string()?)
        .map_err(|err| io_error("artifact_write", &paths.config, err))?;
    write_json(&paths.manifest, &cases.manifest())?;

    let mut outcome = PipelineOutcome {
        paths: paths.clone(),
        plan: None,
        run: None,
        library: None,
        checks: None,
    };

    if dry_run {
        let plan = Runner::new(config.run_opts()).plan(&cases)?;
        write_json(&paths.plan, &plan)?;
        outcome.plan = Some(plan);
        return Ok(outcome);
    }

    let run = execute(config, &cases)?;
    write_json(&paths.run_report, &run.report)?;
    let reference = ReferenceSet::from_results(&run.results);
    save_reference(&reference, &paths.reference)?;
    run.report.ensure_success()?;
    outcome.run = Some(run.report.clone());

    let library = assemble(config, &cases, &run.results)?;
    save_library(&library, &paths.library, config.output.format)?;
    outcome.library = Some(library.summary());

    let report = check(config, &library, &reference)?;
    write_json(&paths.check_report, &report)?;
    if report.pass {
        info!(checks = report.checks.len(), "pipeline finished");
    } else {
        warn!(
            failed = report.failures().count(),
            checks = report.checks.len(),
            "pipeline finished with failing checks"
        );
    }
    outcome.checks = Some(report);
    Ok(outcome)
}
