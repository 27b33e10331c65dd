use std::error::Error;

use clap::Args;
use olm_pipeline::{save_report, OutputPaths};

use super::{print_json, ConfigArgs};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Print every job instead of the summary.
    #[arg(long)]
    pub jobs: bool,
    /// Also write `plan.json` to the output directory.
    #[arg(long)]
    pub write: bool,
}

pub fn run(args: &PlanArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.load()?;
    let plan = olm_pipeline::plan(&config)?;
    if args.write {
        let paths = OutputPaths::for_config(&config);
        std::fs::create_dir_all(&paths.dir)?;
        save_report(&plan, &paths.plan)?;
    }
    if args.jobs {
        return print_json(&plan);
    }
    let summary = serde_json::json!({
        "cases": plan.cases,
        "steps": plan.steps,
        "concurrency": plan.concurrency,
        "critical_path": plan.critical_path,
        "config_hash": config.config_hash()?,
    });
    print_json(&summary)
}
