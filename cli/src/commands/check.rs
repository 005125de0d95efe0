//! `vmtools check`: verify that the target is reachable and the credentials work.
//!
//! All of the work happens in `connect`; this only reports the result.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::GuestConnection;
use crate::application::ports::{HypervisorConnector, TransferClient};
use crate::output::json;

/// Report the connected guest.
///
/// # Errors
///
/// Returns an error only if JSON serialization fails.
pub fn run<C, T>(app: &AppContext, conn: &GuestConnection<C, T>) -> Result<ExitCode>
where
    C: HypervisorConnector,
    T: TransferClient,
{
    if app.is_json() {
        println!("{}", json::format_check(conn.guest())?);
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(guest) = conn.guest() {
        app.output.success("hypervisor and guest credentials accepted");
        app.output.kv("vm", &guest.name);
        app.output.kv("id", &guest.id);
    }
    Ok(ExitCode::SUCCESS)
}
