//! CLI binary for `status_tracker`.
//!
//! This binary is a thin wrapper that reads stdin and delegates to the library.

use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use status_tracker::cli::{Cli, Settings};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::resolve(cli.data_dir.clone(), cli.db.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::from(1);
        }
    };

    // RUST_LOG wins over the configured filter; --verbose wins over both.
    let filter = if cli.verbose {
        EnvFilter::new("status_tracker=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.config.log_filter))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Only read stdin for commands that need it (avoids blocking on terminal)
    let stdin = if cli.command.needs_stdin() { read_stdin() } else { String::new() };

    let output = status_tracker::cli::run(cli.command, &settings, &stdin);

    for line in output.stdout {
        println!("{line}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }

    output.exit_code
}

fn read_stdin() -> String {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Error reading stdin: {e}");
    }
    input
}
