use std::error::Error;

use clap::Args;
use olm_check::ReferenceSet;
use olm_pipeline::{execute, save_reference, save_report, OutputPaths};

use super::{print_json, ConfigArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.load()?;
    let cases = config.case_set()?;
    let paths = OutputPaths::for_config(&config);
    std::fs::create_dir_all(&paths.dir)?;

    let outcome = execute(&config, &cases)?;
    save_report(&outcome.report, &paths.run_report)?;
    save_reference(&ReferenceSet::from_results(&outcome.results), &paths.reference)?;
    print_json(&outcome.report.summary)?;
    for failure in &outcome.report.failures {
        eprintln!(
            "case {} failed at step {}: {}",
            failure.case_id, failure.step, failure.error
        );
    }
    outcome.report.ensure_success()?;
    Ok(())
}
