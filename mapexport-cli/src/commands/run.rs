//! Run command - scheduled exports with a console on stdin.
//!
//! The export service and its blocking HTTP client live on the main thread;
//! the timer runs on a tokio runtime and hands each cycle to the blocking
//! pool. Console lines arrive from a reader thread over a channel.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mapexport::config::format_duration;
use mapexport::ExportService;

use crate::error::CliError;
use crate::runner::CliRunner;

/// How often the console loop checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Grace period for runtime tasks at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands accepted on stdin while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Now,
    Reload,
    Debug,
    Quit,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "now" => Ok(ConsoleCommand::Now),
            "reload" => Ok(ConsoleCommand::Reload),
            "debug" => Ok(ConsoleCommand::Debug),
            "quit" | "exit" | "stop" => Ok(ConsoleCommand::Quit),
            "help" | "?" => Ok(ConsoleCommand::Help),
            other => Err(format!("Unknown command '{}', try 'help'", other)),
        }
    }
}

/// Run the run command.
pub fn run(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("run");

    // The blocking client must be built outside the runtime
    let service = Arc::new(runner.create_service()?);
    let shutdown = service.shutdown_token();

    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mapexport-rt")
        .build()
        .map_err(|e| CliError::Config(format!("Failed to start async runtime: {}", e)))?;

    let scheduler = {
        let _enter = runtime.enter();
        service.start()
    };

    match runner.config().export.schedule {
        Some(interval) => println!("Exporting every {}", format_duration(interval)),
        None => println!("No schedule configured, use 'now' to export"),
    }
    println!("Commands: now, reload, debug, quit (Ctrl+C to stop)");

    let console = spawn_console()?;
    console_loop(&runner, &service, &console, &shutdown, &runtime);

    println!("Shutting down...");
    service.stop();
    if let Some(handle) = scheduler {
        if let Err(e) = runtime.block_on(handle) {
            warn!(error = %e, "Export scheduler ended abnormally");
        }
    }
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    info!("MapExport stopped");
    Ok(())
}

fn spawn_console() -> Result<mpsc::Receiver<String>, CliError> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| CliError::Config(format!("Failed to start console: {}", e)))?;
    Ok(rx)
}

fn console_loop(
    runner: &CliRunner,
    service: &ExportService,
    console: &mpsc::Receiver<String>,
    shutdown: &CancellationToken,
    runtime: &tokio::runtime::Runtime,
) {
    while !shutdown.is_cancelled() {
        let line = match console.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // stdin closed, keep running until Ctrl+C
                runtime.block_on(shutdown.cancelled());
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => execute(command, runner, service),
            Err(msg) => println!("{}", msg),
        }
    }
}

fn execute(command: ConsoleCommand, runner: &CliRunner, service: &ExportService) {
    match command {
        ConsoleCommand::Now => match service.run_once() {
            Ok(summary) => println!("{}", summary),
            Err(e) => println!("Export failed: {}", e),
        },
        ConsoleCommand::Reload => {
            let result = runner
                .reload_config()
                .and_then(|config| service.reload(config).map_err(CliError::from));
            match result {
                Ok(()) => println!("Reloaded configuration (schedule changes apply after restart)"),
                Err(e) => println!("Reload failed: {}", e),
            }
        }
        ConsoleCommand::Debug => print!("{}", service.debug_info()),
        ConsoleCommand::Help => {
            println!("now     run every export once");
            println!("reload  re-read the configuration file");
            println!("debug   show worlds, maps and exports");
            println!("quit    stop exporting and exit");
        }
        ConsoleCommand::Quit => {}
    }
}
