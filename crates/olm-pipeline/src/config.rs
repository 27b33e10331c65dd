use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use olm_check::CheckSpec;
use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::hash::stable_hash_string;
use olm_core::serde::{from_yaml_slice, to_yaml_string};
use olm_lib::{AssemblySpec, LibraryFormat};
use olm_run::{AnalyticSolver, CommandSolver, RunOpts, Solver};
use olm_space::{
    AxisSpec, BurnupSchedule, BurnupSpec, CaseSet, CompositionSpec, ExpansionStrategy, StateSpace,
    StaticParams,
};
use serde::{Deserialize, Serialize};

/// Which solver advances the cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SolverSpec {
    /// Built-in closed-form depletion surrogate.
    #[default]
    Analytic,
    /// Analytic surrogate with explicit decay rates per quantity.
    Rates {
        /// Decay rate per reported quantity.
        rates: BTreeMap<String, f64>,
    },
    /// External program invoked once per step.
    Command {
        /// Program to execute.
        program: PathBuf,
        /// Arguments passed verbatim.
        #[serde(default)]
        args: Vec<String>,
        /// Directory for per-step scratch files; defaults to `<output>/scratch`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scratch: Option<PathBuf>,
    },
}

/// Where and how the pipeline writes its artefacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output directory, relative to the configuration file.
    #[serde(default = "OutputSpec::default_dir")]
    pub dir: PathBuf,
    /// Library serialization format.
    #[serde(default)]
    pub format: LibraryFormat,
}

impl OutputSpec {
    fn default_dir() -> PathBuf {
        PathBuf::from("olm-out")
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            format: LibraryFormat::default(),
        }
    }
}

/// Complete, immutable description of one library generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// State space axes in declaration order.
    pub axes: Vec<AxisSpec>,
    /// Expansion strategy.
    #[serde(default)]
    pub strategy: ExpansionStrategy,
    /// Burnup checkpoints and power.
    pub burnup: BurnupSpec,
    /// Static parameters copied into every case.
    #[serde(default)]
    pub params: StaticParams,
    /// Fuel composition calculator applied per state point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionSpec>,
    /// Execution options.
    #[serde(default)]
    pub run: RunOpts,
    /// Solver selection.
    #[serde(default)]
    pub solver: SolverSpec,
    /// Assembly options.
    pub assembly: AssemblySpec,
    /// Consistency checks applied to the assembled library.
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
    /// Output location and format.
    #[serde(default)]
    pub output: OutputSpec,
    /// Directory containing the configuration on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PipelineConfig {
    /// Deterministic hash of the configuration contents.
    pub fn config_hash(&self) -> Result<String, OlmError> {
        stable_hash_string(self)
    }

    /// Canonical YAML representation.
    pub fn to_yaml_string(&self) -> Result<String, OlmError> {
        to_yaml_string(self)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    /// Run options with the work directory resolved against the config location.
    pub fn run_opts(&self) -> RunOpts {
        let mut opts = self.run.clone();
        opts.work_dir = opts.work_dir.as_deref().map(|dir| self.resolve(dir));
        opts
    }

    /// Expands the state space and builds the case set.
    pub fn case_set(&self) -> Result<CaseSet, OlmError> {
        let space = StateSpace::from_specs(&self.axes, self.strategy.clone())?;
        let schedule = BurnupSchedule::from_spec(&self.burnup)?;
        let cases = CaseSet::new(
            space,
            schedule,
            self.burnup.power_axis.clone(),
            self.params.clone(),
        )?;
        match &self.composition {
            Some(spec) => cases.with_composition(spec.clone()),
            None => Ok(cases),
        }
    }

    /// Instantiates the configured solver.
    pub fn solver(&self) -> Box<dyn Solver> {
        match &self.solver {
            SolverSpec::Analytic => Box::new(AnalyticSolver::default()),
            SolverSpec::Rates { rates } => Box::new(AnalyticSolver::new(rates.clone())),
            SolverSpec::Command {
                program,
                args,
                scratch,
            } => {
                let scratch = scratch
                    .as_deref()
                    .map(|dir| self.resolve(dir))
                    .unwrap_or_else(|| self.output_dir().join("scratch"));
                Box::new(CommandSolver::new(self.resolve(program), args.clone(), scratch))
            }
        }
    }
}

/// Loads a configuration from disk and records its directory for path resolution.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, OlmError> {
    let config_path = path.as_ref();
    let bytes = fs::read(config_path).map_err(|err| {
        OlmError::Io(
            ErrorInfo::new("config_read", err.to_string())
                .with_context("path", config_path.display().to_string()),
        )
    })?;
    let mut config: PipelineConfig = from_yaml_slice(&bytes)?;
    config.base_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok(config)
}
