//! Guest file transfer: put and fetch through the two-phase protocol.

#![allow(clippy::unwrap_used)]

use vmtools_cli::application::services::{GuestTarget, transfer};
use vmtools_cli::domain::{GuestFamily, GuestOpsError};

use crate::mocks::{FakeGuest, auth, vm};

macro_rules! target {
    ($session:expr, $vm:expr, $auth:expr) => {
        GuestTarget {
            api: &$session,
            vm: &$vm,
            auth: &$auth,
        }
    };
}

#[tokio::test]
async fn test_put_then_fetch_round_trips_bytes() {
    let guest = FakeGuest::default();
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("payload.bin");
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    std::fs::write(&src, &payload).unwrap();

    let sent = transfer::put_file(target!(session, vm, auth), &guest.transfer(), &src, "/opt/p.bin", true)
        .await
        .unwrap();
    assert_eq!(sent, 4096);

    let dest = dir.path().join("back").join("p.bin");
    let received = transfer::fetch_file(target!(session, vm, auth), &guest.transfer(), "/opt/p.bin", &dest)
        .await
        .unwrap();
    assert_eq!(received, 4096);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[tokio::test]
async fn test_zero_length_file_round_trips() {
    let guest = FakeGuest::default();
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty");
    std::fs::write(&src, b"").unwrap();

    let sent = transfer::put_file(target!(session, vm, auth), &guest.transfer(), &src, "/tmp/empty", true)
        .await
        .unwrap();
    assert_eq!(sent, 0);

    let dest = dir.path().join("empty.out");
    transfer::fetch_file(target!(session, vm, auth), &guest.transfer(), "/tmp/empty", &dest)
        .await
        .unwrap();
    assert!(std::fs::read(&dest).unwrap().is_empty());
}

#[tokio::test]
async fn test_put_missing_source_makes_no_calls() {
    let guest = FakeGuest::default();
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let err = transfer::put_file(
        target!(session, vm, auth),
        &guest.transfer(),
        std::path::Path::new("/nonexistent/file"),
        "/tmp/x",
        true,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, GuestOpsError::FileNotFound { .. }));
    assert_eq!(err.to_string(), "file or module does not exist: /nonexistent/file");
    assert!(guest.calls().is_empty());
}

#[tokio::test]
async fn test_put_unknown_family_fails_before_transfer() {
    let guest = FakeGuest::new(|s| s.family = GuestFamily::Other("darwinGuest".into()));
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a");
    std::fs::write(&src, b"abc").unwrap();

    let err = transfer::put_file(target!(session, vm, auth), &guest.transfer(), &src, "/tmp/a", true)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unrecognized guest family: darwinGuest");
    assert_eq!(guest.calls(), ["guest_family"]);
}

#[tokio::test]
async fn test_put_rejected_upload_is_transfer_error() {
    let guest = FakeGuest::new(|s| {
        s.transfer_status.insert("/root/locked".into(), 403);
    });
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a");
    std::fs::write(&src, b"abc").unwrap();

    let err = transfer::put_file(target!(session, vm, auth), &guest.transfer(), &src, "/root/locked", true)
        .await
        .unwrap_err();
    assert!(matches!(err, GuestOpsError::Transfer { status: Some(403), .. }));
}

#[tokio::test]
async fn test_fetch_missing_guest_file_leaves_no_local_file() {
    let guest = FakeGuest::default();
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("hosts");

    let err = transfer::fetch_file(target!(session, vm, auth), &guest.transfer(), "/etc/missing", &dest)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to transfer '/etc/missing': HTTP 404 Not Found");
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_parent_that_is_a_file_is_io_error() {
    let guest = FakeGuest::new(|s| {
        s.files.insert("/etc/hosts".into(), b"127.0.0.1 localhost\n".to_vec());
    });
    let (session, vm, auth) = (guest.session(), vm(), auth("guestpw"));
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let err = transfer::fetch_file(
        target!(session, vm, auth),
        &guest.transfer(),
        "/etc/hosts",
        &blocker.join("hosts"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, GuestOpsError::Io { .. }));
    assert!(guest.calls().is_empty(), "nothing requested from the guest");
}
