use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn upsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("upsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_every_subcommand() {
    let home = TempDir::new().expect("home");
    let assert = upsync_cmd(home.path()).arg("--help").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    for sub in ["init", "sync", "status", "clean", "logs"] {
        assert!(stdout.contains(sub), "help should mention `{sub}`:\n{stdout}");
    }
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let url = "https://example.com/upsync/demo.git";

    upsync_cmd(home.path())
        .arg("init")
        .arg(work.path())
        .args(["--remote-url", url, "--branch", "trunk"])
        .assert()
        .success()
        .stdout(contains("upsync.yaml"));

    let written = fs::read_to_string(work.path().join("upsync.yaml")).expect("config written");
    assert!(written.contains(url));
    assert!(written.contains("trunk"));

    upsync_cmd(home.path())
        .arg("init")
        .arg(work.path())
        .args(["--remote-url", "https://example.com/other.git"])
        .assert()
        .failure()
        .stderr(contains("already exists"));

    upsync_cmd(home.path())
        .arg("init")
        .arg(work.path())
        .args(["--remote-url", "https://example.com/other.git", "--force"])
        .assert()
        .success();
    let replaced = fs::read_to_string(work.path().join("upsync.yaml")).expect("config");
    assert!(replaced.contains("https://example.com/other.git"));
}

#[test]
fn sync_without_remote_url_fails_before_touching_the_tree() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    fs::write(work.path().join("a.txt"), "hello\n").expect("seed file");

    upsync_cmd(home.path())
        .arg("sync")
        .arg(work.path())
        .assert()
        .failure()
        .stderr(contains("no remote URL configured"));

    assert!(!work.path().join(".git").exists());
    assert!(!work.path().join(".gitignore").exists());
}

#[test]
fn sync_json_reports_config_error_kind() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");

    let assert = upsync_cmd(home.path())
        .arg("sync")
        .arg(work.path())
        .arg("--json")
        .assert()
        .failure();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON on stdout");
    assert_eq!(json["outcome"], "failed");
    assert_eq!(json["error"]["kind"], "config_error");
}

#[test]
fn status_json_on_plain_directory() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");

    let assert = upsync_cmd(home.path())
        .arg("status")
        .arg(work.path())
        .arg("--json")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON on stdout");
    assert_eq!(json["state"]["is_initialized"], false);
    assert_eq!(json["state"]["current_branch"], "main");
    assert_eq!(json["remote_branches"], serde_json::json!([]));
}

#[test]
fn clean_removes_marker_files_from_metadata() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let refs = work.path().join(".git").join("refs");
    fs::create_dir_all(refs.join("heads")).expect("refs dir");
    fs::write(refs.join("desktop.ini"), "[.ShellClassInfo]\n").expect("marker");
    fs::write(refs.join("heads").join("Thumbs.db"), "x").expect("nested marker");

    upsync_cmd(home.path())
        .arg("clean")
        .arg(work.path())
        .assert()
        .success()
        .stdout(contains("desktop.ini"));

    assert!(!refs.join("desktop.ini").exists());
    assert!(!refs.join("heads").join("Thumbs.db").exists());
    assert!(refs.join("heads").is_dir());
}

#[test]
fn clean_outside_a_repository_is_a_no_op() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");

    upsync_cmd(home.path())
        .arg("clean")
        .arg(work.path())
        .assert()
        .success()
        .stdout(contains("nothing to clean"));
}

#[test]
fn logs_prints_only_the_requested_tail() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    fs::write(
        work.path().join("sync_log.txt"),
        "first\nsecond\nthird\nfourth\n",
    )
    .expect("seed log");

    let assert = upsync_cmd(home.path())
        .arg("logs")
        .arg(work.path())
        .args(["--lines", "2"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    assert!(stdout.contains("third"));
    assert!(stdout.contains("fourth"));
    assert!(!stdout.contains("second"));
}

#[test]
fn logs_without_a_log_file_says_so() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");

    upsync_cmd(home.path())
        .arg("logs")
        .arg(work.path())
        .assert()
        .success()
        .stdout(contains("log file not found"));
}
