//! End-to-end tests of the `vmtools` binary.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

use crate::fake_vcenter::FakeVcenter;

fn vmtools(home: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vmtools"));
    cmd.env("NO_COLOR", "1")
        .env("HOME", home)
        .env_remove("VMTOOLS_HOSTS")
        .env_remove("VMTOOLS_TARGET")
        .env_remove("VMTOOLS_CONNECTION_PASSWORD")
        .env_remove("VMTOOLS_VM_PASSWORD")
        .env_remove("VMTOOLS_LOG");
    cmd
}

/// `-e key=value` arguments pointing the binary at `vcenter`.
fn extra_vars(vcenter: &FakeVcenter, overrides: &[(&str, &str)]) -> Vec<String> {
    vcenter
        .host_vars(overrides)
        .into_iter()
        .flat_map(|(k, v)| ["-e".to_string(), format!("{k}={v}")])
        .collect()
}

/// assert_cmd blocks, so run it off the runtime that serves the fake.
async fn run_blocking<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap();
}

// --- Help and version ---

#[test]
fn test_cli_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Run commands and move files inside guest VMs"));
}

#[test]
fn test_cli_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("put"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vmtools"));
}

#[test]
fn test_exec_requires_a_command() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path()).arg("exec").assert().code(2);
}

// --- Configuration errors ---

#[test]
fn test_missing_host_vars_is_reported() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path())
        .args(["exec", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required host variable"));
}

#[test]
fn test_json_error_object_on_stdout() {
    let home = tempfile::tempdir().unwrap();
    let output = vmtools(home.path())
        .args(["--json", "check"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let obj: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(obj["error"], true);
    assert_eq!(obj["code"], "CONFIG");
}

#[test]
fn test_malformed_extra_var_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    vmtools(home.path())
        .args(["-e", "no_equals_sign", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

#[test]
fn test_hosts_file_with_several_targets_needs_one_picked() {
    let home = tempfile::tempdir().unwrap();
    let hosts = home.path().join("hosts.yaml");
    std::fs::write(
        &hosts,
        "hosts:\n  web01:\n    vmware_tools_vm_name: web01\n  db01:\n    vmware_tools_vm_name: db01\n",
    )
    .unwrap();
    vmtools(home.path())
        .arg("--hosts")
        .arg(&hosts)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--target"));
}

// --- Against the loopback fake ---

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_prints_remote_stdout() {
    let vcenter = FakeVcenter::start().await;
    let vars = extra_vars(&vcenter, &[]);
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        vmtools(home.path())
            .args(&vars)
            .args(["exec", "echo", "hi"])
            .assert()
            .success()
            .stdout("hi\n");
    })
    .await;
    assert_eq!(vcenter.state().logouts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_exits_with_remote_code() {
    let vcenter = FakeVcenter::start().await;
    let vars = extra_vars(&vcenter, &[]);
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        vmtools(home.path())
            .args(&vars)
            .args(["exec", "cat", "/etc/missing"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No such file or directory"));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_json_reports_guest_and_output() {
    let vcenter = FakeVcenter::start().await;
    let vars = extra_vars(&vcenter, &[]);
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        let output = vmtools(home.path())
            .args(&vars)
            .args(["--json", "exec", "echo", "hi"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let obj: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(obj["guest"]["id"], "vm-42");
        assert_eq!(obj["exit_code"], 0);
        assert_eq!(obj["stdout"], "hi\n");
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_guest_password_json_code() {
    let vcenter = FakeVcenter::start().await;
    let vars = extra_vars(&vcenter, &[("vmware_tools_vm_password", "wrong")]);
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        let output = vmtools(home.path())
            .args(&vars)
            .args(["--json", "check"])
            .output()
            .unwrap();
        assert!(!output.status.success());
        let obj: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(obj["code"], "GUEST_AUTHENTICATION");
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_put_and_fetch_through_the_binary() {
    let vcenter = FakeVcenter::start().await;
    let vars = extra_vars(&vcenter, &[]);
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("motd");
    std::fs::write(&src, "welcome\n").unwrap();
    let dest = dir.path().join("out").join("motd");

    let (put_vars, put_src) = (vars.clone(), src.clone());
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        vmtools(home.path())
            .args(&put_vars)
            .arg("put")
            .arg(&put_src)
            .arg("/etc/motd")
            .assert()
            .success();
    })
    .await;
    assert_eq!(vcenter.state().files["/etc/motd"], b"welcome\n");

    let fetch_dest = dest.clone();
    run_blocking(move || {
        let home = tempfile::tempdir().unwrap();
        vmtools(home.path())
            .args(&vars)
            .arg("fetch")
            .arg("/etc/motd")
            .arg(&fetch_dest)
            .assert()
            .success();
    })
    .await;
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "welcome\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hosts_file_target_selection() {
    let vcenter = FakeVcenter::start().await;
    let home = tempfile::tempdir().unwrap();
    let hosts = home.path().join("hosts.yaml");
    let mut yaml = String::from("hosts:\n  web01:\n");
    for (key, value) in vcenter.host_vars(&[]) {
        yaml.push_str(&format!("    {key}: '{value}'\n"));
    }
    yaml.push_str("  other:\n    vmware_tools_connection_host: elsewhere\n");
    std::fs::write(&hosts, yaml).unwrap();

    let home_path = home.path().to_path_buf();
    run_blocking(move || {
        vmtools(&home_path)
            .arg("--hosts")
            .arg(&hosts)
            .args(["--target", "web01", "check"])
            .assert()
            .success();
    })
    .await;
}
