mod cli;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use cli::Cli;
use mp4fpsmod::{is_usage_error, retime, Options};
use std::io;
use std::process::ExitCode;

/// Exit status for command-line misuse.
const EXIT_USAGE: u8 = 1;
/// Exit status for failures while retiming.
const EXIT_FAILURE: u8 = 2;

fn usage_error(message: &dyn std::fmt::Display) -> ExitCode {
    eprintln!("error: {}\n", message);
    eprintln!("{}", Cli::command().render_help());
    ExitCode::from(EXIT_USAGE)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mp4fpsmod=trace,mp4fpsmod_timing=trace,mp4fpsmod_media=trace".to_string()
        } else {
            "mp4fpsmod=info,mp4fpsmod_timing=info,mp4fpsmod_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let options = Options::from(cli);
    if let Err(err) = options.validate() {
        return usage_error(&err);
    }

    match retime(&options) {
        Ok(report) => {
            if let Err(err) = report.write_to(&mut io::stderr().lock()) {
                tracing::warn!("Failed to print report: {}", err);
            }
            ExitCode::SUCCESS
        }
        Err(err) if is_usage_error(&err) => usage_error(&err),
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
