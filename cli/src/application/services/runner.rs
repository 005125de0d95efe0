//! Remote Process Runner: capture files, start, poll, collect, clean up.
//!
//! Output is captured by redirecting the process into two guest temp files
//! which are read back over the transfer channel. Once both temp files
//! exist they are always deleted (best effort) before returning, whatever
//! happened in between.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{GuestFileManager, GuestInfo, GuestProcessManager, TransferClient};
use crate::application::services::GuestTarget;
use crate::application::services::transfer::fetch_text;
use crate::domain::error::Result;
use crate::domain::process::TEMP_FILE_SUFFIX;
use crate::domain::{
    ExecOutput, GuestCommand, GuestOpsError, PollPolicy, RemoteProcessHandle, RemoteProcessSpec,
    TempFileRole,
};

/// Exit code reported when the guest marks a process finished without one.
const UNKNOWN_EXIT_CODE: i32 = -1;

/// Run `command` in the guest and return its exit code and captured output.
///
/// # Errors
///
/// [`GuestOpsError::GuestFile`] if a capture file cannot be allocated,
/// [`GuestOpsError::ProcessStart`] if the guest refuses to start the program,
/// [`GuestOpsError::Timeout`] / [`GuestOpsError::Cancelled`] if the wait is cut
/// short, [`GuestOpsError::Transfer`] if captured output cannot be fetched.
pub async fn run<S>(
    guest: GuestTarget<'_, S>,
    transfer: &impl TransferClient,
    command: &GuestCommand,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<ExecOutput>
where
    S: GuestFileManager + GuestProcessManager + GuestInfo,
{
    let stdout_path = allocate_temp_file(guest, TempFileRole::Stdout).await?;
    let stderr_path = match allocate_temp_file(guest, TempFileRole::Stderr).await {
        Ok(path) => path,
        Err(e) => {
            remove_temp_files(guest, &[&stdout_path]).await;
            return Err(e);
        }
    };

    let result = run_captured(
        guest,
        transfer,
        command,
        policy,
        cancel,
        &stdout_path,
        &stderr_path,
    )
    .await;

    remove_temp_files(guest, &[&stdout_path, &stderr_path]).await;
    result
}

async fn run_captured<S>(
    guest: GuestTarget<'_, S>,
    transfer: &impl TransferClient,
    command: &GuestCommand,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    stdout_path: &str,
    stderr_path: &str,
) -> Result<ExecOutput>
where
    S: GuestFileManager + GuestProcessManager + GuestInfo,
{
    let spec = match command {
        GuestCommand::Shell(line) => RemoteProcessSpec::from_shell(line, stdout_path, stderr_path)?,
        GuestCommand::Argv(argv) => {
            let family = guest.api.guest_family(guest.vm).await?;
            RemoteProcessSpec::from_argv(argv, &family, stdout_path, stderr_path)?
        }
    };

    let pid = guest.api.start_program(guest.vm, guest.auth, &spec).await?;
    tracing::debug!(pid, program = %spec.program_path, "guest process started");

    let process = match wait_for_completion(guest, pid, policy, cancel).await {
        Ok(process) => process,
        Err(e @ (GuestOpsError::Timeout { .. } | GuestOpsError::Cancelled { .. })) => {
            if let Err(kill) = guest.api.terminate_process(guest.vm, guest.auth, pid).await {
                tracing::warn!(pid, error = %kill, "could not terminate abandoned guest process");
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let exit_code = process.final_exit_code().unwrap_or_else(|| {
        tracing::warn!(pid, "guest reported no exit code for finished process");
        UNKNOWN_EXIT_CODE
    });

    let stdout = fetch_text(guest, transfer, stdout_path).await?;
    let stderr = fetch_text(guest, transfer, stderr_path).await?;

    Ok(ExecOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// Poll the guest process list until `pid` has an end time.
///
/// Sleeps `policy.interval` between polls. Never returns a handle whose end
/// time is unset.
///
/// # Errors
///
/// [`GuestOpsError::Timeout`] once `policy.deadline` has passed,
/// [`GuestOpsError::Cancelled`] when `cancel` fires,
/// [`GuestOpsError::ProcessLost`] if the pid disappears from the listing.
pub async fn wait_for_completion<S: GuestProcessManager>(
    guest: GuestTarget<'_, S>,
    pid: i64,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<RemoteProcessHandle> {
    let started = Instant::now();
    let deadline = policy.deadline.map(|d| started + d);

    loop {
        if cancel.is_cancelled() {
            return Err(GuestOpsError::Cancelled { pid });
        }

        let process = guest
            .api
            .list_processes(guest.vm, guest.auth, &[pid])
            .await?
            .into_iter()
            .find(|p| p.pid == pid)
            .ok_or(GuestOpsError::ProcessLost { pid })?;

        if process.is_finished() {
            tracing::debug!(pid, waited_ms = started.elapsed().as_millis(), "guest process finished");
            return Ok(process);
        }

        let mut wake = Instant::now() + policy.interval;
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(GuestOpsError::Timeout {
                    pid,
                    waited: started.elapsed(),
                });
            }
            wake = wake.min(deadline);
        }

        tokio::select! {
            () = cancel.cancelled() => return Err(GuestOpsError::Cancelled { pid }),
            () = tokio::time::sleep_until(wake) => {}
        }
    }
}

async fn allocate_temp_file<S: GuestFileManager>(
    guest: GuestTarget<'_, S>,
    role: TempFileRole,
) -> Result<String> {
    let path = guest
        .api
        .create_temp_file(guest.vm, guest.auth, role.prefix(), TEMP_FILE_SUFFIX)
        .await?;
    tracing::debug!(stream = role.label(), path = %path, "allocated capture file");
    Ok(path)
}

async fn remove_temp_files<S: GuestFileManager>(guest: GuestTarget<'_, S>, paths: &[&str]) {
    for path in paths {
        if let Err(e) = guest.api.delete_file(guest.vm, guest.auth, path).await {
            tracing::warn!(path = %path, error = %e, "could not delete guest temp file");
        }
    }
}
