use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_pipeline::{load_config, PipelineConfig};
use serde::Serialize;

pub mod assemble;
pub mod check;
pub mod pipeline;
pub mod plan;
pub mod run;

/// Options shared by every command that reads a pipeline configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML pipeline configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Override the output directory from the configuration.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Override the number of concurrent solver invocations.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Reuse completed cases from the work directory.
    #[arg(long)]
    pub resume: bool,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<PipelineConfig, Box<dyn Error>> {
        let mut config = load_config(&self.config)?;
        if let Some(out) = &self.out {
            config.output.dir = std::env::current_dir()?.join(out);
        }
        if let Some(concurrency) = self.concurrency {
            config.run.concurrency = concurrency;
        }
        if self.resume {
            config.run.resume = true;
        }
        Ok(config)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
