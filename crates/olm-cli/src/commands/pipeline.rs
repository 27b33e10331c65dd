use std::error::Error;

use clap::Args;
use olm_pipeline::run_pipeline;

use super::{print_json, ConfigArgs};

#[derive(Args, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Validate and plan only; nothing is executed.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &PipelineArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.load()?;
    let outcome = run_pipeline(&config, args.dry_run)?;
    if let Some(plan) = &outcome.plan {
        println!(
            "planned {} cases / {} steps, critical path {} -> {}",
            plan.cases,
            plan.steps,
            plan.critical_path,
            outcome.paths.plan.display()
        );
        return Ok(());
    }
    if let Some(summary) = &outcome.library {
        print_json(summary)?;
        println!("library -> {}", outcome.paths.library.display());
    }
    if let Some(checks) = &outcome.checks {
        checks.ensure_passed()?;
    }
    Ok(())
}
