//! CLI integration tests
//!
//! Runs the `rlogin` and `rsh` binaries with assert_cmd.

use std::net::SocketAddr;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rcmd_core::{Connector, PortRange};
use rcmd_protocol::io::read_string;

fn rlogin() -> Command {
    Command::cargo_bin("rlogin").expect("Failed to locate rlogin binary")
}

fn rsh() -> Command {
    Command::cargo_bin("rsh").expect("Failed to locate rsh binary")
}

/// Point the clients at a private config directory
fn with_config(cmd: &mut Command, dir: &tempfile::TempDir, contents: &str) {
    let config_dir = dir.path().join("rcmd");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("client.toml"), contents).unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path()).env("HOME", dir.path());
}

#[test]
fn test_rlogin_help() {
    rlogin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rlogin [-l user] [-p port] host"));
}

#[test]
fn test_rlogin_version() {
    rlogin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rlogin"));
}

#[test]
fn test_rlogin_missing_host() {
    rlogin()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_rlogin_too_many_arguments() {
    rlogin()
        .args(["host", "extra"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_rlogin_unknown_option() {
    rlogin().args(["-x", "host"]).assert().code(1);
}

#[test]
fn test_rsh_help() {
    rsh()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rsh [-n] [-l user] [-p port] host"));
}

#[test]
fn test_rsh_missing_host() {
    rsh()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_rsh_unknown_service_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = rsh();
    with_config(&mut cmd, &dir, "report_progress = false\n");

    cmd.args(["-n", "-p", "no-such-service-rcmd", "127.0.0.1", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("rsh: "))
        .stderr(predicate::str::contains("Error looking up"));
}

#[test]
fn test_rlogin_unknown_service_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = rlogin();
    with_config(&mut cmd, &dir, "report_progress = false\n");

    cmd.args(["-p", "no-such-service-rcmd", "127.0.0.1"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("rlogin: "));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rsh_runs_command_against_server() {
    let ports = PortRange::new(44999, 44800).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, peer) = listener.accept().await.unwrap();
        assert!(ports.contains(peer.port()), "client used port {}", peer.port());

        let stderr_port: u16 = read_string(&mut stream, "stderr port")
            .await
            .unwrap()
            .parse()
            .unwrap();
        read_string(&mut stream, "client user").await.unwrap();
        assert_eq!(read_string(&mut stream, "server user").await.unwrap(), "bob");
        let command = read_string(&mut stream, "command").await.unwrap();

        let back = SocketAddr::new(peer.ip(), stderr_port);
        let mut errors = Connector::new(ports).connect_back(back).await.unwrap();

        stream.write_all(&[0]).await.unwrap();
        errors.write_all(b"warning\n").await.unwrap();
        stream.write_all(b"ran: ").await.unwrap();
        stream.write_all(command.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
        drop(stream);

        // Hold the error stream until the client goes away
        let mut sink = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(10), errors.read_to_end(&mut sink)).await;
    });

    let dir = tempfile::tempdir().unwrap();
    let assert = tokio::task::spawn_blocking(move || {
        let mut cmd = rsh();
        with_config(
            &mut cmd,
            &dir,
            "report_progress = false\n[ports]\nhigh = 44999\nlow = 44800\n",
        );
        cmd.args(["-n", "-l", "bob", "-p", &port.to_string(), "127.0.0.1", "ls", "-la"])
            .timeout(Duration::from_secs(10))
            .assert()
    })
    .await
    .unwrap();

    assert.success().stdout("ran: ls -la\n");
    server.await.unwrap();
}
