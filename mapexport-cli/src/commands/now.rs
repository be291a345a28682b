//! Now command - run every export once.

use std::path::PathBuf;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("now");

    let service = runner.create_service()?;
    let summary = service.run_once()?;
    println!("{}", summary);
    Ok(())
}
