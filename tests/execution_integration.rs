//! Execution integration tests.
//!
//! These tests run real processes through the full spawn / wait / escalate /
//! drain protocol.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use runproc::execution::{ExecutorConfig, RecordingSink};
use runproc::search::{find_in, search_paths};
use runproc::{Command, CommandExecutor, IntegrityViolation, RunprocError};
use tempfile::TempDir;

fn quiet(cmd: &str) -> Command {
    Command::new(cmd).verbose(false)
}

fn executor() -> CommandExecutor {
    CommandExecutor::new(
        ExecutorConfig::default()
            .with_grace_window(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(5)),
    )
}

// ============================================================================
// Basic Scenarios
// ============================================================================

#[test]
fn test_echo_hello_no_timeout() {
    let result = runproc::run("echo hello", None, false, false).unwrap();

    assert_eq!(result.exit_status(), 0);
    assert_eq!(result.stdout(), b"hello\n");
    assert_eq!(result.stderr(), b"");
    assert_eq!(result.command(), "echo hello");
}

#[test]
fn test_false_raises_command_failed() {
    let err = runproc::run("false", None, false, false).unwrap_err();

    let result = err.result().expect("CommandFailed carries the result");
    assert_eq!(result.exit_status(), 1);
    assert!(matches!(err, RunprocError::CommandFailed(_)));
}

#[test]
fn test_false_with_ignore_status() {
    let result = runproc::run("false", None, false, true).unwrap();
    assert_eq!(result.exit_status(), 1);
}

#[test]
fn test_failed_command_keeps_output() {
    let err = executor()
        .run(&quiet("sh -c 'echo partial; echo broken >&2; exit 4'"))
        .unwrap_err();

    let result = err.result().unwrap();
    assert_eq!(result.exit_status(), 4);
    assert_eq!(result.stdout(), b"partial\n");
    assert_eq!(result.stderr(), b"broken\n");
}

#[test]
fn test_system_projections() {
    assert_eq!(runproc::system("sh -c 'exit 7'", None, false, true).unwrap(), 7);
    assert_eq!(
        runproc::system_output("printf 'a b'", None, false, false).unwrap(),
        b"a b"
    );
}

#[test]
fn test_quoted_arguments_reach_child() {
    let result = executor()
        .run(&quiet(r#"printf '%s|' "one two" 'three' four\ five"#))
        .unwrap();
    assert_eq!(result.stdout_text(), "one two|three|four five|");
}

// ============================================================================
// Capture Completeness
// ============================================================================

#[test]
fn test_large_output_on_both_streams() {
    // Far beyond a pipe buffer on each stream; a single reader would deadlock.
    let cmd = "sh -c 'head -c 300000 /dev/zero | tr \"\\000\" a; \
               head -c 200000 /dev/zero | tr \"\\000\" b >&2'";
    let result = executor().run(&quiet(cmd)).unwrap();

    assert_eq!(result.stdout().len(), 300_000);
    assert!(result.stdout().iter().all(|&b| b == b'a'));
    assert_eq!(result.stderr().len(), 200_000);
    assert!(result.stderr().iter().all(|&b| b == b'b'));
}

#[test]
fn test_interleaved_streams_are_separated() {
    let cmd = "sh -c 'for i in 1 2 3 4 5; do echo out$i; echo err$i >&2; sleep 0.01; done'";
    let result = executor().run(&quiet(cmd)).unwrap();

    assert_eq!(result.stdout_text(), "out1\nout2\nout3\nout4\nout5\n");
    assert_eq!(result.stderr_text(), "err1\nerr2\nerr3\nerr4\nerr5\n");
}

#[test]
fn test_binary_output_is_preserved() {
    let result = executor().run(&quiet(r"printf '\000\377\001'")).unwrap();
    assert_eq!(result.stdout(), &[0x00u8, 0xff, 0x01]);
}

#[test]
fn test_verbose_echo_per_line() {
    let sink = RecordingSink::new();
    let executor = executor().with_sink(Arc::new(sink.clone()));

    executor
        .run(&Command::new("sh -c 'printf \"a\\nb\\nc\"'"))
        .unwrap();

    assert_eq!(
        sink.messages_at(tracing::Level::DEBUG),
        vec!["[stdout] a", "[stdout] b", "[stdout] c"]
    );
    assert_eq!(sink.messages_at(tracing::Level::INFO).len(), 1);
}

// ============================================================================
// Timeout & Escalation
// ============================================================================

#[test]
fn test_timeout_terminates_long_sleep() {
    let start = Instant::now();
    let result = runproc::run("sleep 10", Some(Duration::from_secs(1)), false, true).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result.exit_status(), -libc::SIGTERM);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
    assert!(result.duration() <= elapsed);
}

#[test]
fn test_timeout_without_ignore_status_fails() {
    let err = executor()
        .run(&quiet("sleep 10").timeout(Duration::from_millis(100)))
        .unwrap_err();
    assert_eq!(err.result().unwrap().exit_status(), -libc::SIGTERM);
}

#[test]
fn test_zero_timeout_terminates_immediately() {
    let start = Instant::now();
    let result = executor()
        .run(&quiet("sleep 10").timeout(Duration::ZERO).ignore_status(true))
        .unwrap();

    assert_eq!(result.exit_status(), -libc::SIGTERM);
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_fast_command_within_timeout() {
    let result = executor()
        .run(&quiet("echo quick").timeout(Duration::from_secs(5)))
        .unwrap();

    assert_eq!(result.exit_status(), 0);
    assert!(result.duration() < Duration::from_secs(5));
}

#[test]
fn test_sigterm_ignored_escalates_to_sigkill() {
    let cmd = "sh -c 'trap \"\" TERM; echo ready; while :; do sleep 0.05; done'";
    let start = Instant::now();
    let result = executor()
        .run(&quiet(cmd).timeout(Duration::from_millis(300)).ignore_status(true))
        .unwrap();

    assert_eq!(result.exit_status(), -libc::SIGKILL);
    assert_eq!(result.stdout(), b"ready\n");
    assert!(start.elapsed() < Duration::from_secs(4));
}

// ============================================================================
// Integrity
// ============================================================================

#[test]
fn test_orphaned_pipe_holder_is_integrity_violation() {
    let executor = CommandExecutor::new(
        ExecutorConfig::default().with_drain_join_timeout(Duration::from_millis(200)),
    );

    // The background sleep inherits stdout and keeps it open after sh exits.
    let err = executor
        .run(&quiet("sh -c 'sleep 3 & echo started'"))
        .unwrap_err();

    assert!(matches!(
        err,
        RunprocError::Integrity(IntegrityViolation::DrainerStuck { .. })
    ));
}

// ============================================================================
// Partial Output
// ============================================================================

#[test]
fn test_partial_output_before_exit() {
    let executor = executor();
    let mut handle = executor
        .spawn(&quiet("sh -c 'echo first; sleep 0.5; echo second'"))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.stdout().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.stdout(), b"first\n");
    assert_eq!(handle.poll().unwrap(), None);

    let status = executor.wait(&mut handle, None).unwrap();
    assert_eq!(status, 0);

    let duration = handle.elapsed();
    let result = handle.into_result(duration).unwrap();
    assert_eq!(result.stdout(), b"first\nsecond\n");
}

// ============================================================================
// Spawn Errors & Search
// ============================================================================

#[test]
fn test_missing_program_is_spawn_error() {
    let err = executor()
        .run(&quiet("runproc-definitely-missing-binary"))
        .unwrap_err();

    match err {
        RunprocError::Spawn { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unbalanced_quotes_rejected() {
    let err = executor().run(&quiet("echo 'open")).unwrap_err();
    assert!(matches!(err, RunprocError::InvalidCommand(_)));
}

#[test]
fn test_command_not_found_lists_search_paths() {
    let err = runproc::find_command("runproc-definitely-missing-binary").unwrap_err();

    match err {
        RunprocError::CommandNotFound { command, paths } => {
            assert_eq!(command, "runproc-definitely-missing-binary");
            assert!(paths.contains(&std::path::PathBuf::from("/usr/bin")));
            assert!(paths.contains(&std::path::PathBuf::from("/bin")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_found_script_runs() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("greet");
    fs::write(&script, "#!/bin/sh\necho \"hi $1\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let paths = search_paths(Some(dir.path().as_os_str()));
    let path = find_in("greet", &paths).unwrap();
    assert_eq!(path, script);

    // Run through sh so a concurrent fork holding the write fd can't cause ETXTBSY.
    let cmd = format!("sh {} there", path.display());
    let result = executor().run(&quiet(&cmd)).unwrap();
    assert_eq!(result.stdout(), b"hi there\n");
}

// ============================================================================
// Async Facade
// ============================================================================

#[tokio::test]
async fn test_run_async() {
    let result = runproc::run_async(quiet("echo from-async")).await.unwrap();
    assert_eq!(result.stdout(), b"from-async\n");
}

#[test]
fn test_run_async_block_on() {
    let err = tokio_test::block_on(executor().run_async(quiet("false"))).unwrap_err();
    assert!(matches!(err, RunprocError::CommandFailed(_)));
}
