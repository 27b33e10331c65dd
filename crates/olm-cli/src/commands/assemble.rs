use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_lib::{save_library, LibraryFormat};
use olm_pipeline::{load_reference, results_from_reference, OutputPaths};

use super::{print_json, ConfigArgs};

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Reference outputs written by `olm run`; defaults to the output directory.
    #[arg(long)]
    pub reference: Option<PathBuf>,
    /// Library destination; `.bin` selects bincode.
    #[arg(long)]
    pub library: Option<PathBuf>,
}

pub fn run(args: &AssembleArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.load()?;
    let paths = OutputPaths::for_config(&config);
    let reference_path = args.reference.clone().unwrap_or(paths.reference);
    let (library_path, format) = match &args.library {
        Some(path) => (path.clone(), LibraryFormat::from_path(path)),
        None => (paths.library, config.output.format),
    };

    let cases = config.case_set()?;
    let reference = load_reference(&reference_path)?;
    let results = results_from_reference(&cases, &reference)?;
    let library = olm_pipeline::assemble(&config, &cases, &results)?;
    save_library(&library, &library_path, format)?;
    print_json(&library.summary())
}
