use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("scatter"))
        .stdout(predicate::str::contains("timeline"));
}

#[test]
fn download_help_lists_filters() {
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.args(["download", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--add-domestic"))
        .stdout(predicate::str::contains("--countries"));
}

#[test]
fn unknown_indicator_is_rejected() {
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.args([
        "timeline",
        "--democracy",
        "dem.csv",
        "--indicator",
        "v2x_nonsense",
        "--out",
        "t.svg",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("v2x_nonsense"));
}

#[test]
fn inverted_window_fails_before_any_request() {
    let dir = tempdir().unwrap();
    let dem = dir.path().join("dem.csv");
    fs::write(&dem, "country,year,v2x_polyarchy\nSWE,2000,0.9\n").unwrap();
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.args(["--api-url", "http://127.0.0.1:9", "timeline", "--country", "SWE"])
        .arg("--democracy")
        .arg(&dem)
        .args(["--from", "2010", "--to", "2000", "--out"])
        .arg(dir.path().join("t.svg"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid year window"));
}

#[test]
fn unreachable_api_exits_non_zero() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("counts.csv");
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.args(["--api-url", "http://127.0.0.1:9", "download", "--countries", "SWE", "--out"])
        .arg(&out);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
    assert!(!out.exists());
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn download_online_sweden() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("swe.csv");
    let mut cmd = Command::cargo_bin("biodem").unwrap();
    cmd.args(["download", "all", "--countries", "SWE", "--from", "2000", "--to", "2001", "--out"])
        .arg(&out);
    cmd.assert().success();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("country,year,all"));
    assert!(text.contains("SWE,2000,"));
}
