//! Integration tests for the `myhome` CLI binary.
//!
//! These tests cover argument parsing, help output, shell completions and
//! error handling. The few that reach a gateway talk to a small threaded
//! fake bound on localhost.
#![allow(clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const MAC: &str = "00:03:50:1b:1c:7d";
const ACK: &str = "*#*1##";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `myhome` binary with env isolation.
///
/// Clears all `MYHOME_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn myhome_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("myhome");
    cmd.env("HOME", "/tmp/myhome-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/myhome-cli-test-nonexistent")
        .env_remove("MYHOME_PROFILE")
        .env_remove("MYHOME_HOST")
        .env_remove("MYHOME_PORT")
        .env_remove("MYHOME_MAC")
        .env_remove("MYHOME_PASSWORD")
        .env_remove("MYHOME_OUTPUT")
        .env_remove("MYHOME_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Read one `...##` frame; `None` at end of stream.
fn read_frame(stream: &mut TcpStream) -> Option<String> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    while !frame.ends_with(b"##") {
        if stream.read(&mut byte).ok()? == 0 {
            return None;
        }
        frame.push(byte[0]);
    }
    String::from_utf8(frame).ok()
}

/// Gateway that opens every session without a password and acknowledges
/// every command. Returns its port and the command frames it received.
fn fake_gateway() -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&received);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { return };
            let log = Arc::clone(&log);
            thread::spawn(move || {
                stream.write_all(ACK.as_bytes()).unwrap();
                let Some(request) = read_frame(&mut stream) else {
                    return;
                };
                stream.write_all(ACK.as_bytes()).unwrap();
                while let Some(frame) = read_frame(&mut stream) {
                    if request == "*99*9##" {
                        log.lock().unwrap().push(frame);
                        if stream.write_all(ACK.as_bytes()).is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    (port, received)
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = myhome_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("Usage"),
        "Expected 'Usage' in output:\n{text}"
    );
}

#[test]
fn test_help_flag() {
    myhome_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("MyHOME")
            .and(predicate::str::contains("listen"))
            .and(predicate::str::contains("discover"))
            .and(predicate::str::contains("sync-time")),
    );
}

#[test]
fn test_version_flag() {
    myhome_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("myhome"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    myhome_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn test_send_without_gateway_fails() {
    let output = myhome_cmd().args(["send", "*1*1*21##"]).output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("No gateway configured"),
        "Expected config hint in output:\n{text}"
    );
}

#[test]
fn test_unknown_profile_fails() {
    let output = myhome_cmd()
        .args(["--profile", "attic", "info"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("attic"));
}

#[test]
fn test_bad_mac_is_usage_error() {
    let output = myhome_cmd()
        .args(["--host", "127.0.0.1", "--mac", "not-a-mac", "info"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_frame_is_rejected_before_connecting() {
    // Port 9 on localhost is never a gateway; the frame check must fire first.
    let output = myhome_cmd()
        .args(["--host", "127.0.0.1", "--port", "9", "--mac", MAC])
        .args(["send", "*1*1*21"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("frame"));
}

#[test]
fn test_config_path() {
    myhome_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml").and(predicate::str::contains("devices.yaml")));
}

// ── Gateway round trips ─────────────────────────────────────────────

#[test]
fn test_closed_port_is_connection_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let output = myhome_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "--mac", MAC])
        .args(["--timeout", "2", "send", "*1*1*21##"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

#[test]
fn test_send_delivers_frames_in_order() {
    let (port, received) = fake_gateway();
    myhome_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "--mac", MAC])
        .args(["-o", "plain", "send", "*1*1*21##", "*1*0*21##"])
        .assert()
        .success()
        .stdout(predicate::str::contains("*1*1*21##").and(predicate::str::contains("*1*0*21##")));

    assert_eq!(
        *received.lock().unwrap(),
        vec!["*1*1*21##".to_owned(), "*1*0*21##".to_owned()]
    );
}
