use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_lib::{load_library, LibraryFormat};
use olm_pipeline::{load_reference, save_report, OutputPaths};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Library to check; defaults to the output directory.
    #[arg(long)]
    pub library: Option<PathBuf>,
    /// Reference outputs; defaults to the output directory.
    #[arg(long)]
    pub reference: Option<PathBuf>,
}

pub fn run(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.load()?;
    let paths = OutputPaths::for_config(&config);
    let (library_path, format) = match &args.library {
        Some(path) => (path.clone(), LibraryFormat::from_path(path)),
        None => (paths.library.clone(), config.output.format),
    };
    let reference_path = args.reference.clone().unwrap_or_else(|| paths.reference.clone());

    let library = load_library(&library_path, format)?;
    let reference = load_reference(&reference_path)?;
    let report = olm_pipeline::check(&config, &library, &reference)?;
    std::fs::create_dir_all(&paths.dir)?;
    save_report(&report, &paths.check_report)?;

    for result in &report.checks {
        let verdict = if result.pass { "pass" } else { "FAIL" };
        println!(
            "{verdict:4} {:<28} n={:<6} tight={:.4} loose={:.4} max_rel={:.3e}",
            result.name,
            result.comparisons,
            result.tight_fraction,
            result.loose_fraction,
            result.max_rel_deviation
        );
        if let Some(note) = &result.note {
            println!("     {note}");
        }
    }
    report.ensure_passed()?;
    Ok(())
}
