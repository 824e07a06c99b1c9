use piraterf::cli::Args;
use piraterf::logger::initialize as LoggerInitialize;
use piraterf::runner::{log_dir, run};

use std::fs::create_dir_all;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // The command still runs without a log file.
    let log_dir = log_dir(&args);
    match create_dir_all(&log_dir) {
        Ok(()) => {
            if let Err(e) = LoggerInitialize(&log_dir, args.debug) {
                eprintln!("{e}");
            }
        }
        Err(e) => eprintln!("Failed to create log directory {}: {e}", log_dir.display()),
    }

    info!("piraterf starting: {:?}", args.command);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
