use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::serde::to_canonical_json_pretty;
use olm_space::{BurnupStep, Case};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named numeric result reported by the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    /// Single value.
    Scalar(f64),
    /// Fixed-length vector (e.g. a nuclide inventory).
    Vector(Vec<f64>),
}

impl Quantity {
    /// Components as a slice; a scalar has exactly one.
    pub fn components(&self) -> &[f64] {
        match self {
            Quantity::Scalar(value) => std::slice::from_ref(value),
            Quantity::Vector(values) => values,
        }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components().len()
    }

    /// True for an empty vector.
    pub fn is_empty(&self) -> bool {
        self.components().is_empty()
    }

    /// Shape descriptor used to compare entries (`None` for scalars).
    pub fn shape(&self) -> Option<usize> {
        match self {
            Quantity::Scalar(_) => None,
            Quantity::Vector(values) => Some(values.len()),
        }
    }

    fn from_json(name: &str, value: &Value) -> Result<Self, SolverFailure> {
        match value {
            Value::Number(number) => number
                .as_f64()
                .map(Quantity::Scalar)
                .ok_or_else(|| SolverFailure::new("solver_bad_number", name)),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_f64())
                .collect::<Option<Vec<_>>>()
                .map(Quantity::Vector)
                .ok_or_else(|| SolverFailure::new("solver_bad_vector", name)),
            _ => Err(SolverFailure::new(
                "solver_bad_quantity",
                format!("quantity `{name}` is neither a number nor an array"),
            )),
        }
    }
}

/// Named quantities of one step.
pub type Quantities = BTreeMap<String, Quantity>;

/// Structured output of one solver invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepOutput {
    /// Quantities entering the library.
    pub quantities: Quantities,
    /// Opaque state carried into the next step (e.g. isotopic inventory).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
}

/// Input file produced by the templating collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputArtifact {
    /// File name to use when the artifact is persisted.
    pub file_name: String,
    /// Rendered content, opaque to the core.
    pub content: String,
}

/// Everything the solver needs for one step of one case.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    /// Case being depleted.
    pub case: &'a Case,
    /// Rendered input for the case.
    pub input: &'a InputArtifact,
    /// Step to reach.
    pub step: &'a BurnupStep,
    /// Output of the previous step, absent for step 0.
    pub previous: Option<&'a StepOutput>,
}

/// Failure signal returned by a solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverFailure {
    /// Stable failure code.
    pub code: String,
    /// Diagnostic message.
    pub message: String,
}

impl SolverFailure {
    /// Creates a failure signal.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<SolverFailure> for OlmError {
    fn from(failure: SolverFailure) -> Self {
        OlmError::External(ErrorInfo::new(failure.code, failure.message))
    }
}

/// Turns a case into a solver input artifact.
pub trait Templater: Send + Sync {
    /// Renders the input for `case`.
    fn render(&self, case: &Case) -> Result<InputArtifact, OlmError>;
}

/// Executes one burnup step of one case.
pub trait Solver: Send + Sync {
    /// Runs the step and returns its quantities or a failure signal.
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure>;
}

/// Renders the full case description as canonical JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonTemplater;

impl Templater for JsonTemplater {
    fn render(&self, case: &Case) -> Result<InputArtifact, OlmError> {
        let bytes = to_canonical_json_pretty(case)?;
        let content = String::from_utf8(bytes)
            .map_err(|err| OlmError::Serde(ErrorInfo::new("template_utf8", err.to_string())))?;
        Ok(InputArtifact {
            file_name: "input.json".to_string(),
            content,
        })
    }
}

/// Closed-form depletion surrogate.
///
/// Each configured quantity decays as `exp(-rate * scale * burnup)` where
/// `scale = 1 + 0.01 * sum(coordinates)`. The value is advanced from the
/// previous step's carried state, so results only match the closed form when
/// steps run in order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticSolver {
    rates: BTreeMap<String, f64>,
}

impl AnalyticSolver {
    /// Creates a solver reporting one scalar per named decay rate.
    pub fn new(rates: BTreeMap<String, f64>) -> Self {
        Self { rates }
    }

    fn scale(case: &Case) -> f64 {
        1.0 + 0.01 * case.point.values().iter().sum::<f64>()
    }
}

impl Default for AnalyticSolver {
    fn default() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert("u235".to_string(), 4.0e-5);
        rates.insert("pu239".to_string(), 1.5e-5);
        Self::new(rates)
    }
}

impl Solver for AnalyticSolver {
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
        let scale = Self::scale(request.case);
        let previous: BTreeMap<String, f64> = match request.previous {
            Some(output) => serde_json::from_value(output.state.clone())
                .map_err(|err| SolverFailure::new("analytic_state", err.to_string()))?,
            None => self.rates.keys().map(|name| (name.clone(), 1.0)).collect(),
        };
        let delta = request.step.delta_time * request.step.specific_power;

        let mut inventory = BTreeMap::new();
        for (name, rate) in &self.rates {
            let start = previous.get(name).copied().ok_or_else(|| {
                SolverFailure::new("analytic_state", format!("missing carried `{name}`"))
            })?;
            inventory.insert(name.clone(), start * (-rate * scale * delta).exp());
        }

        let mut quantities: Quantities = inventory
            .iter()
            .map(|(name, value)| (name.clone(), Quantity::Scalar(*value)))
            .collect();
        quantities.insert(
            "inventory".to_string(),
            Quantity::Vector(inventory.values().copied().collect()),
        );
        quantities.insert(
            "time".to_string(),
            Quantity::Scalar(request.step.time),
        );
        let state = serde_json::to_value(&inventory)
            .map_err(|err| SolverFailure::new("analytic_state", err.to_string()))?;
        Ok(StepOutput { quantities, state })
    }
}

/// Runs an external executable once per step.
///
/// The process receives `OLM_CASE`, `OLM_INPUT`, `OLM_STEP`, `OLM_BURNUP`,
/// `OLM_TIME`, `OLM_POWER` and, after step 0, `OLM_PREVIOUS` (a JSON file with
/// the previous output). It must print either `{"quantities": {...}, "state":
/// ...}` or a flat map of quantities on stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSolver {
    program: PathBuf,
    args: Vec<String>,
    scratch: PathBuf,
}

impl CommandSolver {
    /// Creates a solver writing its per-step files under `scratch`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch: scratch.into(),
        }
    }

    fn parse_stdout(stdout: &[u8]) -> Result<StepOutput, SolverFailure> {
        let value: Value = serde_json::from_slice(stdout)
            .map_err(|err| SolverFailure::new("solver_bad_output", err.to_string()))?;
        let (map, state) = match value {
            Value::Object(mut object) => match object.remove("quantities") {
                Some(Value::Object(quantities)) => {
                    (quantities, object.remove("state").unwrap_or(Value::Null))
                }
                Some(_) => {
                    return Err(SolverFailure::new(
                        "solver_bad_output",
                        "`quantities` must be an object",
                    ))
                }
                None => (object, Value::Null),
            },
            _ => {
                return Err(SolverFailure::new(
                    "solver_bad_output",
                    "solver output must be a JSON object",
                ))
            }
        };
        let mut quantities = Quantities::new();
        for (name, value) in &map {
            quantities.insert(name.clone(), Quantity::from_json(name, value)?);
        }
        Ok(StepOutput { quantities, state })
    }
}

impl Solver for CommandSolver {
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
        let io_failure = |err: std::io::Error| SolverFailure::new("solver_io", err.to_string());
        let dir = self.scratch.join(request.case.id.as_str());
        fs::create_dir_all(&dir).map_err(io_failure)?;
        let input_path = dir.join(&request.input.file_name);
        fs::write(&input_path, &request.input.content).map_err(io_failure)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("OLM_CASE", request.case.id.as_str())
            .env("OLM_INPUT", &input_path)
            .env("OLM_STEP", request.step.index.to_string())
            .env("OLM_BURNUP", request.step.burnup.to_string())
            .env("OLM_TIME", request.step.time.to_string())
            .env("OLM_POWER", request.step.specific_power.to_string());
        if let Some(previous) = request.previous {
            let previous_path = dir.join(format!("previous_{}.json", request.step.index));
            let bytes = serde_json::to_vec(previous)
                .map_err(|err| SolverFailure::new("solver_io", err.to_string()))?;
            fs::write(&previous_path, bytes).map_err(io_failure)?;
            command.env("OLM_PREVIOUS", previous_path);
        }

        let output = command.output().map_err(|err| {
            SolverFailure::new(
                "solver_spawn",
                format!("failed to start {}: {err}", self.program.display()),
            )
        })?;
        if !output.status.success() {
            let tail = stderr_tail(&String::from_utf8_lossy(&output.stderr));
            return Err(SolverFailure::new(
                "solver_exit",
                format!("solver exited with {}: {tail}", output.status),
            ));
        }
        Self::parse_stdout(&output.stdout)
    }
}

/// Last five stderr lines in the order they were written.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    lines[lines.len().saturating_sub(5)..].join(" | ")
}
