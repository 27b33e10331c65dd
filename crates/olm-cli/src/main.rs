use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    assemble::{self, AssembleArgs},
    check::{self, CheckArgs},
    pipeline::{self, PipelineArgs},
    plan::{self, PlanArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "olm", version, about = "Reactor library generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand the configuration and print the job graph without running it.
    Plan(PlanArgs),
    /// Run every case and persist the run report and reference outputs.
    Run(RunArgs),
    /// Build the library from persisted reference outputs.
    Assemble(AssembleArgs),
    /// Evaluate the configured consistency checks against a library.
    Check(CheckArgs),
    /// Expand, run, assemble and check in one go.
    Pipeline(PipelineArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,olm_run=info,olm_lib=info,olm_check=info,olm_pipeline=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Plan(args) => plan::run(&args),
        Command::Run(args) => run::run(&args),
        Command::Assemble(args) => assemble::run(&args),
        Command::Check(args) => check::run(&args),
        Command::Pipeline(args) => pipeline::run(&args),
    }
}
