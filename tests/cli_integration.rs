//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing, configuration loading, and
//! the behavior of the `runproc` binary itself.

use std::ffi::OsString;
use std::io::Write;
use std::process::Command as StdCommand;
use std::time::Duration;
use tempfile::NamedTempFile;

use runproc::cli::{parse_args_from, Args, Mode};
use runproc::config::Config;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("runproc")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn runproc_bin() -> StdCommand {
    let mut cmd = StdCommand::new(env!("CARGO_BIN_EXE_runproc"));
    cmd.env_remove("RUST_LOG").env_remove("RUNPROC_LOG_LEVEL");
    cmd
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.command.is_empty());
    assert!(result.timeout.is_none());
    assert!(!result.quiet);
    assert!(!result.ignore_status);
    assert_eq!(result.mode, Mode::Full);
    assert!(result.config.is_none());
    assert!(result.which.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-t",
        "2.5",
        "-q",
        "-i",
        "-m",
        "status",
        "-l",
        "debug",
        "make",
        "-j4",
        "check",
    ]))
    .unwrap();

    assert_eq!(result.timeout, Some(Duration::from_millis(2500)));
    assert!(result.quiet);
    assert!(result.ignore_status);
    assert_eq!(result.mode, Mode::Status);
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.command, vec!["make", "-j4", "check"]);
    assert_eq!(
        shlex::split(&result.command_line().unwrap()).unwrap(),
        result.command
    );
}

#[test]
fn test_cli_invalid_timeout() {
    assert!(parse_args_from(args(&["-t", "forever", "true"])).is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "execution": {
            "grace_window_ms": 500,
            "poll_interval_ms": 20,
            "drain_join_timeout_ms": 2000,
            "read_chunk_size": 8192,
            "verbose": false,
            "default_timeout_secs": 30
        },
        "logging": {
            "level": "warn"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let exec = config.to_executor_config().unwrap();

    assert_eq!(exec.grace_window, Duration::from_millis(500));
    assert_eq!(exec.poll_interval, Duration::from_millis(20));
    assert_eq!(exec.drain_join_timeout, Duration::from_secs(2));
    assert_eq!(exec.chunk_size, 8192);
    assert_eq!(exec.default_timeout, Some(Duration::from_secs(30)));
    assert!(!config.execution.verbose);
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{ "execution": { "verbose": true } }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        quiet: true,
        log_level: Some("error".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert!(!config.execution.verbose);
    assert_eq!(config.logging.level, "error");
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"execution": {"grace_window_ms": 50}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.execution.grace_window_ms, 50);
    assert_eq!(config.execution.poll_interval_ms, 10); // Default
    assert!(config.execution.verbose); // Default
}

// ============================================================================
// Binary Tests
// ============================================================================

#[cfg(unix)]
#[test]
fn test_bin_output_mode() {
    let output = runproc_bin()
        .args(["-q", "-m", "output", "--", "echo", "hi"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"hi\n");
}

#[cfg(unix)]
#[test]
fn test_bin_status_mode_propagates_exit() {
    let output = runproc_bin()
        .args(["-q", "-i", "-m", "status", "sh", "-c", "exit 3"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(output.stdout, b"3\n");
}

#[cfg(unix)]
#[test]
fn test_bin_keeps_argument_with_spaces() {
    let output = runproc_bin()
        .args(["-q", "-m", "output", "printf", "%s|", "a b", "it's"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"a b|it's|");
}

#[cfg(unix)]
#[test]
fn test_bin_failed_command() {
    let output = runproc_bin().args(["-q", "false"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("exit status 1"));
}

#[cfg(unix)]
#[test]
fn test_bin_full_report() {
    let output = runproc_bin().args(["-q", "echo", "report"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Command: echo report"));
    assert!(stdout.contains("Exit status: 0"));
    assert!(stdout.contains("Stdout:\nreport\n"));
}

#[cfg(unix)]
#[test]
fn test_bin_which() {
    let output = runproc_bin().args(["--which", "sh"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).trim_end().ends_with("/sh"));

    let output = runproc_bin()
        .args(["--which", "runproc-definitely-missing-binary"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(127));
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not be found"));
}

#[cfg(unix)]
#[test]
fn test_bin_timeout() {
    let output = runproc_bin()
        .args(["-q", "-i", "-m", "status", "-t", "0.2", "sleep", "10"])
        .output()
        .unwrap();

    // SIGTERM maps to 128 + 15.
    assert_eq!(output.status.code(), Some(143));
    assert_eq!(output.stdout, b"-15\n");
}

#[test]
fn test_bin_no_command_is_usage_error() {
    let output = runproc_bin().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
