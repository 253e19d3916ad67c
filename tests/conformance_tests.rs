//! End-to-end tests against a real subprocess
//!
//! `sh` stands in for the interpreter: each test file is a shell script whose
//! `#` comments carry the expectation annotations, so the same file both
//! produces output and states what that output should be.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use wrenconform::cli::test_interfaces::DefaultTestExecutor;
use wrenconform::{Discrepancy, SessionConfig, SessionTotals, TestReporter, TestResult, run_session};

/// Reporter that keeps every file result for inspection
#[derive(Default)]
struct Recorder {
    results: Vec<(String, TestResult)>,
}

impl TestReporter for Recorder {
    fn on_file_complete(&mut self, path: &str, result: &TestResult) {
        self.results.push((path.to_string(), result.clone()));
    }

    fn on_run_complete(&mut self, _totals: &SessionTotals) {}
}

fn write(root: &Path, relative: &str, source: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, source).unwrap();
    path
}

fn run(root: &Path) -> (SessionTotals, Recorder) {
    run_with(SessionConfig::new().with_root(root).with_binary("sh"))
}

fn run_with(config: SessionConfig) -> (SessionTotals, Recorder) {
    let mut recorder = Recorder::default();
    let totals = run_session(&config, &mut DefaultTestExecutor, &mut recorder).expect("session should complete");
    (totals, recorder)
}

fn only_failure(recorder: &Recorder) -> Vec<Discrepancy> {
    let failures: Vec<_> = recorder
        .results
        .iter()
        .filter_map(|(_, r)| match r {
            TestResult::Failed(fails) => Some(fails.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1, "expected exactly one failing file: {:?}", recorder.results);
    failures.into_iter().next().unwrap()
}

#[test]
fn test_matching_output_passes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "print.wren", "echo 3\n# // expect: 3\n");

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1);
    assert_eq!(totals.failed, 0);
    assert_eq!(totals.expectations, 1);
}

#[test]
fn test_silent_file_without_annotations_passes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "silent.wren", "true\n");

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1);
}

#[test]
fn test_unannotated_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "chatty.wren", "echo hi\n");

    let (totals, recorder) = run(dir.path());
    assert_eq!(totals.failed, 1);
    assert_eq!(
        only_failure(&recorder),
        vec![Discrepancy::UnexpectedOutput { actual: "hi".into() }]
    );
}

#[test]
fn test_expected_compile_error_line() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "error.wren",
        "echo '[foo line 5] Error: bad thing' >&2\nexit 65\n# // expect error line 5\n",
    );

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1, "compile error on the expected line should pass");
}

#[test]
fn test_compile_error_on_wrong_line() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "error.wren",
        "echo '[foo line 6] Error: bad thing' >&2\nexit 65\n# // expect error line 5\n",
    );

    let (totals, recorder) = run(dir.path());
    assert_eq!(totals.failed, 1);
    assert_eq!(
        only_failure(&recorder),
        vec![Discrepancy::UnexpectedError {
            line: "[foo line 6] Error: bad thing".into()
        }]
    );
}

#[test]
fn test_expected_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "runtime.wren",
        "echo 'index out of bounds' >&2\necho '[main line 1] in (script)' >&2\nexit 70\n\
         # // expect runtime error: index out of bounds\n",
    );

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1);
}

#[test]
fn test_stdin_is_fed_to_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "echo.wren",
        "# // stdin: hello\nread line\necho \"$line\"\n# // expect: hello\n",
    );

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1);
}

#[test]
fn test_exit_code_mismatch_hides_output_diffs() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "precedence.wren",
        "echo 'not what was expected'\necho '[main line 5] Error' >&2\nexit 1\n# // expect: a\n# // expect error\n",
    );

    let (_, recorder) = run(dir.path());
    let fails = only_failure(&recorder);
    assert_eq!(fails.len(), 1);
    assert!(matches!(fails[0], Discrepancy::ExitCode { expected: 65, actual: 1, .. }));
}

#[test]
fn test_skipped_file_is_never_run() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    write(
        dir.path(),
        "skipped.wren",
        &format!("touch '{}'\n# // skip: Not ready.\n", marker.display()),
    );
    write(
        dir.path(),
        "helper.wren",
        &format!("touch '{}'\n# // nontest\n", marker.display()),
    );

    let (totals, recorder) = run(dir.path());
    assert!(!marker.exists(), "skipped and nontest files must not be executed");
    assert_eq!(totals.num_skipped, 1);
    assert_eq!(totals.skipped.get("Not ready."), Some(&1));
    assert_eq!(recorder.results.len(), 1);
}

#[test]
fn test_invalid_utf8_output_is_a_discrepancy() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bytes.wren", "printf 'ok\\377\\n'\n# // expect: ok\n");

    let (totals, recorder) = run(dir.path());
    assert_eq!(totals.failed, 1);
    assert_eq!(only_failure(&recorder)[0], Discrepancy::Decode);
}

#[test]
fn test_crlf_output_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "crlf.wren", "printf 'a\\r\\nb\\r\\n'\n# // expect: a\n# // expect: b\n");

    let (totals, _) = run(dir.path());
    assert_eq!(totals.passed, 1);
}

#[test]
fn test_timeout_kills_hung_child() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "hang.wren", "exec sleep 30\n");

    let config = SessionConfig::new()
        .with_root(dir.path())
        .with_binary("sh")
        .with_timeout(Some(Duration::from_millis(300)));
    let (totals, recorder) = run_with(config);

    assert_eq!(totals.failed, 1);
    assert_eq!(
        only_failure(&recorder),
        vec![Discrepancy::TimedOut(Duration::from_millis(300))]
    );
}

#[test]
fn test_timeout_not_held_up_by_grandchild() {
    let dir = tempfile::tempdir().unwrap();
    // The shell forks `sleep`, which inherits and keeps the output pipes open.
    write(dir.path(), "forks.wren", "sleep 5\necho done\n");

    let config = SessionConfig::new()
        .with_root(dir.path())
        .with_binary("sh")
        .with_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    let (totals, recorder) = run_with(config);

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(totals.failed, 1);
    assert_eq!(
        only_failure(&recorder),
        vec![Discrepancy::TimedOut(Duration::from_millis(300))]
    );
}

#[test]
fn test_missing_interpreter_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.wren", "");

    let config = SessionConfig::new()
        .with_root(dir.path())
        .with_binary("/nonexistent/wrenconform-interpreter");
    let mut recorder = Recorder::default();
    let err = run_session(&config, &mut DefaultTestExecutor, &mut recorder).unwrap_err();
    assert!(err.is_launch_failure());
}

#[test]
fn test_repeated_sessions_agree() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.wren", "echo 1\necho 2\n# // expect: 1\n# // expect: 3\n");
    write(dir.path(), "b.wren", "echo x\n# // expect: x\n");

    let (first, first_rec) = run(dir.path());
    let (second, second_rec) = run(dir.path());
    assert_eq!(first, second);
    assert_eq!(first_rec.results, second_rec.results);
}

// ============================================================================
// The binary itself
// ============================================================================

fn wrenconform(root: &Path, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_wrenconform"))
        .arg("--root")
        .arg(root)
        .args(["--binary", "sh", "--no-color"])
        .args(extra)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run wrenconform")
}

#[test]
fn test_cli_all_passed_summary() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lang/a.wren", "echo 1\n# // expect: 1\n");
    write(dir.path(), "lang/b.wren", "# // skip: Needs fibers.\n");

    let output = wrenconform(dir.path(), &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("All 1 tests passed (1 expectations)."));
    assert!(stdout.contains("Skipped 1 tests: Needs fibers."));
}

#[test]
fn test_cli_failure_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bad.wren", "echo 2\n# // expect: 1\n");

    let output = wrenconform(dir.path(), &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("FAIL: "));
    assert!(stdout.contains("      Expected output \"1\" on line 2 and got \"2\"."));
    assert!(stdout.contains("0 tests passed. 1 tests failed."));
}

#[test]
fn test_cli_selector_filters_by_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lang/ok.wren", "");
    write(dir.path(), "core/bad.wren", "exit 3\n");

    let output = wrenconform(dir.path(), &["lang"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("All 1 tests passed (0 expectations)."));
}
