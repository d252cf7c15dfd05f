//! aptprice - Main Entry Point
//!
//! Batch ETL and price model for apartment transaction records.

use clap::Parser;
use aptprice::cli::{report_error, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Logs go to stderr so stage output on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aptprice=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}
