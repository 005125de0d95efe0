//! `vmtools exec`: run a command inside the guest.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::GuestConnection;
use crate::application::ports::{HypervisorConnector, TransferClient};
use crate::domain::{ExecOutput, GuestCommand, PollPolicy};
use crate::output::{json, progress};

/// Arguments for the exec command.
#[derive(Args)]
#[command(trailing_var_arg = true)]
pub struct ExecArgs {
    /// Quote each argument and run them through the guest's shell
    /// (`/bin/sh -c` or `cmd.exe /c`) instead of splitting on the first space
    #[arg(long)]
    pub argv: bool,

    /// Seconds between two process-list polls
    #[arg(long, value_name = "SECS", default_value = "1", value_parser = parse_interval)]
    pub poll_interval: Duration,

    /// Give up (and kill the guest process) after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Command and arguments to run in the guest
    #[arg(required = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ExecArgs {
    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.poll_interval,
            deadline: self.timeout,
        }
    }

    /// Without `--argv` the words are joined back into one command line.
    #[must_use]
    pub fn guest_command(&self) -> GuestCommand {
        if self.argv {
            GuestCommand::Argv(self.command.clone())
        } else {
            GuestCommand::Shell(self.command.join(" "))
        }
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{raw}': {e}"))
}

/// Shortest accepted poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn parse_interval(raw: &str) -> Result<Duration, String> {
    let interval = parse_seconds(raw)?;
    if interval < MIN_POLL_INTERVAL {
        return Err(format!(
            "'{raw}': poll interval must be at least {}s",
            MIN_POLL_INTERVAL.as_secs_f64()
        ));
    }
    Ok(interval)
}

/// Run a command in the guest, print its output and exit with its code.
///
/// Ctrl-C cancels the wait and kills the guest process.
///
/// # Errors
///
/// Returns an error if the command cannot be run or its output fetched.
pub async fn run<C, T>(
    app: &AppContext,
    conn: &mut GuestConnection<C, T>,
    args: &ExecArgs,
) -> Result<ExitCode>
where
    C: HypervisorConnector,
    T: TransferClient,
{
    let command = args.guest_command();
    let cancel = conn.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling guest command");
            cancel.cancel();
        }
    });

    let spinner = app.output.spinner(&format!("running {}", args.command.join(" ")));
    let result = conn.exec(&command).await;
    interrupt.abort();

    let output = match result {
        Ok(output) => {
            spinner.finish_and_clear();
            output
        }
        Err(e) => {
            progress::finish_error(&spinner, "guest command failed");
            return Err(e).context("exec failed");
        }
    };

    if app.is_json() {
        println!("{}", json::format_exec(conn.guest(), &output)?);
    } else {
        print!("{}", output.stdout);
        eprint!("{}", output.stderr);
    }
    Ok(exit_code(&output))
}

fn exit_code(output: &ExecOutput) -> ExitCode {
    ExitCode::from(exit_byte(output.exit_code))
}

/// Remote exit codes outside `0..=255` (including the unknown `-1`) map to 1.
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
