//! Debug command - print the loaded configuration.

use std::path::PathBuf;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("debug");

    let service = runner.create_service()?;
    println!("Config file: {}", runner.config_path().display());
    print!("{}", service.debug_info());
    Ok(())
}
