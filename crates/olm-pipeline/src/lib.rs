#![deny(missing_docs)]
#![doc = "Configuration-driven orchestration of expansion, execution, assembly and checks."]

/// YAML pipeline configuration.
pub mod config;
/// Stage functions and the end-to-end driver.
pub mod pipeline;

pub use config::{load_config, OutputSpec, PipelineConfig, SolverSpec};
pub use pipeline::{
    assemble, check, execute, load_reference, plan, results_from_reference, run_pipeline,
    save_reference, save_report, OutputPaths, PipelineOutcome, TOOL_NAME,
};
