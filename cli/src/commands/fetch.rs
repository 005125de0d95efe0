//! `vmtools fetch`: download a guest file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::GuestConnection;
use crate::application::ports::{HypervisorConnector, TransferClient};
use crate::output::json;

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// Source path inside the guest
    pub remote: String,

    /// Local destination; missing parent directories are created
    pub local: PathBuf,
}

/// Download `args.remote` to `args.local`.
///
/// # Errors
///
/// Returns an error if the download fails. Nothing is left at the
/// destination in that case.
pub async fn run<C, T>(
    app: &AppContext,
    conn: &mut GuestConnection<C, T>,
    args: &FetchArgs,
) -> Result<ExitCode>
where
    C: HypervisorConnector,
    T: TransferClient,
{
    let spinner = app.output.spinner(&format!("downloading {}", args.remote));
    let received = conn.fetch_file(&args.remote, &args.local).await;
    spinner.finish_and_clear();
    let bytes = received.with_context(|| {
        format!("cannot download {} to {}", args.remote, args.local.display())
    })?;

    let local = args.local.display().to_string();
    if app.is_json() {
        println!(
            "{}",
            json::format_transfer(conn.guest(), "fetch", &local, &args.remote, bytes)?
        );
    } else {
        app.output.success(&format!("{} → {local} ({bytes} bytes)", args.remote));
    }
    Ok(ExitCode::SUCCESS)
}
