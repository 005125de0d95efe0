//! Remote process runner: capture, poll timing, cleanup.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vmtools_cli::application::services::{GuestTarget, runner};
use vmtools_cli::domain::{GuestCommand, GuestFamily, GuestOpsError, PollPolicy};

use crate::mocks::{FakeGuest, FakeSession, Script, auth, vm};

fn shell(cmd: &str) -> GuestCommand {
    GuestCommand::Shell(cmd.to_string())
}

async fn run_with(
    guest: &FakeGuest,
    command: &GuestCommand,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<vmtools_cli::domain::ExecOutput, GuestOpsError> {
    let session: FakeSession = guest.session();
    let (vm, auth) = (vm(), auth("guestpw"));
    let target = GuestTarget {
        api: &session,
        vm: &vm,
        auth: &auth,
    };
    runner::run(target, &guest.transfer(), command, &policy, cancel).await
}

fn echo_hi() -> FakeGuest {
    FakeGuest::new(|s| {
        s.script = Script {
            stdout: "hi\n".into(),
            ..Script::default()
        };
    })
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_echo_returns_output_and_cleans_up() {
    let guest = echo_hi();
    let out = run_with(
        &guest,
        &shell("echo hi"),
        PollPolicy::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(out.exit_code, 0);
    assert_eq!(out.stdout, "hi\n");
    assert_eq!(out.stderr, "");

    let state = guest.state();
    assert_eq!(state.deleted, state.temp_files);
    assert!(state.files.is_empty(), "both capture files removed");
    let spec = &state.started[0];
    assert_eq!(spec.program_path, "echo");
    assert_eq!(
        spec.arguments,
        "hi 1> /tmp/std_out_0.file 2> /tmp/std_err_1.file"
    );
}

#[tokio::test(start_paused = true)]
async fn test_call_order_allocates_before_start_and_deletes_last() {
    let guest = echo_hi();
    run_with(&guest, &shell("echo hi"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        guest.calls(),
        [
            "create_temp_file",
            "create_temp_file",
            "start_program",
            "list_processes",
            "initiate_transfer_from_guest",
            "download",
            "initiate_transfer_from_guest",
            "download",
            "delete_file",
            "delete_file",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_argv_mode_asks_for_family_and_wraps_in_shell() {
    let guest = echo_hi();
    let argv = GuestCommand::Argv(vec!["echo".into(), "two words".into()]);
    run_with(&guest, &argv, PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();
    let state = guest.state();
    assert!(state.calls.contains(&"guest_family".to_string()));
    assert_eq!(state.started[0].program_path, "/bin/sh");
    assert!(state.started[0].arguments.starts_with(r"-c 'echo '\''two words'\'' 1> "));
}

#[tokio::test(start_paused = true)]
async fn test_argv_mode_on_unknown_family_still_cleans_up() {
    let guest = FakeGuest::new(|s| s.family = GuestFamily::Other("solaris".into()));
    let argv = GuestCommand::Argv(vec!["ls".into()]);
    let err = run_with(&guest, &argv, PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::UnsupportedGuest { .. }));
    assert_eq!(guest.state().deleted.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_exit_code_reports_minus_one() {
    let guest = FakeGuest::new(|s| s.script.exit_code = None);
    let out = run_with(&guest, &shell("true"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out.exit_code, -1);
}

// ── Poll timing ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_poll_interval_is_one_second_by_default() {
    let guest = FakeGuest::new(|s| s.script.running_polls = 3);
    let start = tokio::time::Instant::now();
    run_with(&guest, &shell("sleep 3"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();

    let state = guest.state();
    let offsets: Vec<u64> = state
        .polls
        .iter()
        .map(|t| (*t - start).as_secs())
        .collect();
    assert_eq!(offsets, [0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_poll_returns_within_one_interval_of_end_and_not_before() {
    let guest = FakeGuest::new(|s| s.script.running_polls = 5);
    let policy = PollPolicy {
        interval: Duration::from_millis(250),
        deadline: None,
    };
    let start = tokio::time::Instant::now();
    run_with(&guest, &shell("work"), policy, &CancellationToken::new())
        .await
        .unwrap();
    let returned = tokio::time::Instant::now();

    let state = guest.state();
    let finished = state.finished_at.unwrap();
    assert!(returned >= finished, "never returns before the end time");
    assert!(returned - finished <= policy.interval);
    assert_eq!(finished - start, Duration::from_millis(1250));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_times_out_and_terminates_process() {
    let guest = FakeGuest::new(|s| s.script.running_polls = 100);
    let policy = PollPolicy {
        interval: Duration::from_secs(1),
        deadline: Some(Duration::from_millis(2500)),
    };
    let err = run_with(&guest, &shell("sleep 100"), policy, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GuestOpsError::Timeout { pid: 4242, .. }));
    let state = guest.state();
    assert_eq!(state.terminated, [4242]);
    assert_eq!(state.deleted.len(), 2, "temp files removed after timeout");
    assert!(state.polls.len() <= 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_the_wait() {
    let guest = FakeGuest::new(|s| s.script.running_polls = 100);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });

    let err = run_with(&guest, &shell("sleep 100"), PollPolicy::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::Cancelled { pid: 4242 }));
    assert_eq!(guest.state().terminated, [4242]);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_failure_does_not_mask_timeout() {
    let guest = FakeGuest::new(|s| {
        s.script.running_polls = 100;
        s.fail_terminate = true;
    });
    let policy = PollPolicy {
        interval: Duration::from_secs(1),
        deadline: Some(Duration::from_secs(1)),
    };
    let err = run_with(&guest, &shell("sleep 100"), policy, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
}

#[tokio::test(start_paused = true)]
async fn test_vanished_process_is_process_lost() {
    let guest = FakeGuest::new(|s| s.lose_process = true);
    let err = run_with(&guest, &shell("ls"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::ProcessLost { pid: 4242 }));
    assert_eq!(guest.state().deleted.len(), 2);
}

// ── Failures and cleanup ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_first_temp_file_failure_starts_nothing() {
    let guest = FakeGuest::new(|s| s.fail_temp_file_at = Some(0));
    let err = run_with(&guest, &shell("ls"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::GuestFile { .. }));
    assert_eq!(guest.calls(), ["create_temp_file"]);
}

#[tokio::test(start_paused = true)]
async fn test_second_temp_file_failure_removes_the_first() {
    let guest = FakeGuest::new(|s| s.fail_temp_file_at = Some(1));
    let err = run_with(&guest, &shell("ls"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GUEST_FILE");
    let state = guest.state();
    assert_eq!(state.deleted, ["/tmp/std_out_0.file"]);
    assert!(state.started.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_still_deletes_temp_files() {
    let guest = FakeGuest::new(|s| s.fail_start = true);
    let err = run_with(&guest, &shell("/no/such"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::ProcessStart { ref program, .. } if program == "/no/such"));
    assert_eq!(guest.state().deleted.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_output_fetch_failure_aborts_without_partial_result() {
    let guest = FakeGuest::new(|s| {
        s.script.stdout = "partial".into();
        s.transfer_status.insert("/tmp/std_err_1.file".into(), 500);
    });
    let err = run_with(&guest, &shell("ls"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::Transfer { status: Some(500), .. }));
    assert_eq!(guest.state().deleted.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_never_masks_result() {
    let guest = FakeGuest::new(|s| {
        s.script.stdout = "ok\n".into();
        s.fail_delete = true;
    });
    let out = run_with(&guest, &shell("true"), PollPolicy::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(out.stdout, "ok\n");
    let deletes = guest.calls().iter().filter(|c| *c == "delete_file").count();
    assert_eq!(deletes, 2, "second delete attempted after the first failed");
}
