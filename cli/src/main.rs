//! vmtools - run commands and move files inside guest VMs through the hypervisor

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vmtools_cli::cli::Cli;
use vmtools_cli::domain::GuestOpsError;
use vmtools_cli::output::json;
use vmtools_common::ConfigError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json_errors = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            let rendered = json_errors
                .then(|| json::format_error(&message, error_code(&e)).ok())
                .flatten();
            match rendered {
                Some(obj) => println!("{obj}"),
                None => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. `VMTOOLS_LOG` overrides the `-v` level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("VMTOOLS_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn error_code(e: &anyhow::Error) -> &'static str {
    e.chain()
        .find_map(|cause| {
            if let Some(err) = cause.downcast_ref::<GuestOpsError>() {
                Some(err.code())
            } else {
                cause.downcast_ref::<ConfigError>().map(|_| "CONFIG")
            }
        })
        .unwrap_or("ERROR")
}
