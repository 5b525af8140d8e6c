//! `tessera` binary entry point.

use std::process::ExitCode;

use clap::Parser;
use tessera_admin::{Cli, commands, logging};
use tessera_types::CodedError;

fn main() -> ExitCode {
    // clap handles --help and --version
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        },
    };

    logging::init_logging(&config.logging);

    let mut stdout = std::io::stdout().lock();
    match commands::run(&cli.command, &config, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = %e.code(), "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    }
}
