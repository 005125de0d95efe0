//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, HostVarFlags, OutputFlags};
use crate::commands;
use crate::output::progress;

/// Run commands and move files inside guest VMs through the hypervisor
#[derive(Parser)]
#[command(
    name = "vmtools",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug); `VMTOOLS_LOG` takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Hosts file [default: ~/.vmtools/hosts.yaml, or VMTOOLS_HOSTS]
    #[arg(long, global = true, value_name = "PATH")]
    pub hosts: Option<PathBuf>,

    /// Target name in the hosts file [default: the only one, or VMTOOLS_TARGET]
    #[arg(short, long, global = true, value_name = "NAME")]
    pub target: Option<String>,

    /// Extra host variable, overrides the hosts file (repeatable)
    #[arg(short = 'e', long = "extra-var", global = true, value_name = "KEY=VALUE")]
    pub extra_vars: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a command in the guest and print its output
    Exec(commands::exec::ExecArgs),

    /// Upload a local file into the guest
    Put(commands::put::PutArgs),

    /// Download a guest file
    Fetch(commands::fetch::FetchArgs),

    /// Log in, locate the guest and validate guest credentials
    Check,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// Every command runs against one freshly connected session, which is
    /// closed again before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, connecting, or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose: _,
            hosts,
            target,
            extra_vars,
            command,
        } = self;

        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            host_vars: HostVarFlags {
                hosts,
                target,
                extra_vars,
            },
        })?;

        let (connection, vm) = app.settings()?;
        let poll = match &command {
            Command::Exec(args) => args.poll_policy(),
            _ => crate::domain::PollPolicy::default(),
        };
        let mut conn = app.guest_connection(&connection, poll)?;

        let spinner = app.output.spinner(&format!("connecting to {}", connection.host));
        let connected = conn.connect(&connection, &vm).await;
        match &connected {
            Ok(()) => progress::finish_ok(&spinner, &format!("connected via {}", connection.host)),
            Err(_) => progress::finish_error(&spinner, "connection failed"),
        }
        connected.with_context(|| format!("cannot connect to guest via {}", connection.host))?;

        let result = match command {
            Command::Exec(args) => commands::exec::run(&app, &mut conn, &args).await,
            Command::Put(args) => commands::put::run(&app, &mut conn, &args).await,
            Command::Fetch(args) => commands::fetch::run(&app, &mut conn, &args).await,
            Command::Check => commands::check::run(&app, &conn),
        };

        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "logout failed");
        }
        result
    }
}
