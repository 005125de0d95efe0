//! `vmtools put`: upload a local file into the guest.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::GuestConnection;
use crate::application::ports::{HypervisorConnector, TransferClient};
use crate::output::json;

/// Arguments for the put command.
#[derive(Args)]
pub struct PutArgs {
    /// Local file to upload
    pub local: PathBuf,

    /// Destination path inside the guest
    pub remote: String,
}

/// Upload `args.local` to `args.remote`.
///
/// # Errors
///
/// Returns an error if the local file is missing or the upload fails.
pub async fn run<C, T>(
    app: &AppContext,
    conn: &mut GuestConnection<C, T>,
    args: &PutArgs,
) -> Result<ExitCode>
where
    C: HypervisorConnector,
    T: TransferClient,
{
    let spinner = app.output.spinner(&format!("uploading {}", args.local.display()));
    let sent = conn.put_file(&args.local, &args.remote).await;
    spinner.finish_and_clear();
    let bytes = sent.with_context(|| {
        format!("cannot upload {} to {}", args.local.display(), args.remote)
    })?;

    let local = args.local.display().to_string();
    if app.is_json() {
        println!(
            "{}",
            json::format_transfer(conn.guest(), "put", &local, &args.remote, bytes)?
        );
    } else {
        app.output.success(&format!("{local} → {} ({bytes} bytes)", args.remote));
    }
    Ok(ExitCode::SUCCESS)
}
