use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn data_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}

#[test]
fn record_then_query_round_trips() {
    let dir = data_dir();

    Command::cargo_bin("obscore")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "record", "--session", "s1", "hello there"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded"));

    Command::cargo_bin("obscore")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "inspect", "--session", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("message.created"));
}

#[test]
fn query_unknown_session_is_empty_not_an_error() {
    let dir = data_dir();

    Command::cargo_bin("obscore")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "inspect", "--session", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn replay_empty_session_errors() {
    let dir = data_dir();

    Command::cargo_bin("obscore")
        .unwrap()
        .args(["--data-dir", dir.path().to_str().unwrap(), "replay", "--session", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no events"));
}

#[test]
fn replay_with_skip_timing_delivers_every_event() {
    let dir = data_dir();

    for content in ["one", "two", "three"] {
        Command::cargo_bin("obscore")
            .unwrap()
            .args(["--data-dir", dir.path().to_str().unwrap(), "record", "--session", "s1", content])
            .assert()
            .success();
    }

    Command::cargo_bin("obscore")
        .unwrap()
        .args([
            "--data-dir",
            dir.path().to_str().unwrap(),
            "replay",
            "--session",
            "s1",
            "--skip-timing",
        ])
        .assert()
        .success();
}
