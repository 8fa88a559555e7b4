//! End-to-end tests for the streamladder binary, driven through
//! assert_cmd. These cover the offline subcommands only; server
//! behavior is exercised by the HTTP suites.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

#[allow(deprecated)]
fn bin() -> Command {
    Command::cargo_bin("streamladder").unwrap()
}

#[test]
fn no_args_prints_usage_and_fails() {
    bin().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_names_the_binary() {
    let help = bin().arg("--help").assert().success();
    help.stdout(predicate::str::contains("streamladder").and(predicate::str::contains("Usage")));
}

#[test]
fn version_flag_reports_version() {
    let run = bin().arg("--version").assert().success();
    run.stdout(predicate::str::contains("streamladder"));
}

#[test]
fn version_subcommand_matches_flag() {
    let run = bin().arg("version").assert().success();
    run.stdout(predicate::str::contains("streamladder"));
}

#[test]
fn check_tools_reports_both_tools() {
    // Succeeds whether or not ffmpeg is installed; it reports either way.
    let report = predicate::str::contains("ffmpeg")
        .and(predicate::str::contains("ffprobe"))
        .and(predicate::str::contains("tools"));
    bin().arg("check-tools").assert().success().stdout(report);
}

#[test]
fn start_help_documents_bind_options() {
    let help = bin().args(["start", "--help"]).assert().success();
    help.stdout(predicate::str::contains("Host").or(predicate::str::contains("Port")));
}

#[test]
fn probe_help_is_descriptive() {
    let help = bin().args(["probe", "--help"]).assert().success();
    help.stdout(predicate::str::contains("Probe a media file"));
}

#[test]
fn probe_missing_file_fails() {
    let run = bin().args(["probe", "/nonexistent/path/movie.mp4"]).assert().failure();
    run.stderr(predicate::str::contains("not found").or(predicate::str::contains("exist")));
}

#[test]
fn transcode_rejects_malformed_id() {
    let run = bin().args(["transcode", "not-a-uuid"]).assert().failure();
    run.stderr(predicate::str::contains("Invalid video id"));
}

#[test]
fn validate_without_file_uses_defaults() {
    let run = bin().arg("validate").assert().success();
    run.stdout(predicate::str::contains("defaults").and(predicate::str::contains("Ladder")));
}

#[test]
fn validate_accepts_valid_config() {
    let scratch = tempdir().unwrap();
    let config_file = scratch.path().join("config.json");
    let body = r#"
{
    "server": { "host": "127.0.0.1", "port": 9090 },
    "transcode": { "segment_seconds": 4 }
}
"#;
    fs::write(&config_file, body).unwrap();

    let run = bin().args(["validate", config_file.to_str().unwrap()]).assert().success();
    run.stdout(predicate::str::contains("Config file is valid"))
        .stdout(predicate::str::contains("127.0.0.1:9090"))
        .stdout(predicate::str::contains("Segment length: 4s"));
}

#[test]
fn validate_rejects_malformed_config() {
    let scratch = tempdir().unwrap();
    let config_file = scratch.path().join("config.json");
    fs::write(&config_file, "{ not valid json").unwrap();

    bin().args(["validate", config_file.to_str().unwrap()]).assert().failure();
}

#[test]
fn validate_warns_on_zero_encode_timeout() {
    let scratch = tempdir().unwrap();
    let config_file = scratch.path().join("config.json");
    fs::write(&config_file, r#"{ "transcode": { "encode_timeout_secs": 0 } }"#).unwrap();

    let run = bin().args(["validate", config_file.to_str().unwrap()]).assert().success();
    run.stdout(predicate::str::contains("never time out"));
}
