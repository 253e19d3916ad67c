//! Test session implementation
//!
//! One session is one sequential pass over a test tree: every file with the
//! test extension is parsed for annotations, run through the interpreter, and
//! compared. Failures are reported as they happen; a summary closes the run.
//!
//! ## TestReporter Trait
//!
//! The session uses a `TestReporter` trait to separate reporting from
//! execution. `ConsoleReporter` draws the live progress line and the summary.
//!
//! ## State
//!
//! All counters live in a `SessionTotals` owned by the session and passed
//! explicitly; nothing is global, so sessions can run side by side in tests.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::time::Instant;

use crate::harness::{Directive, Discrepancy, RunKind, TestError, compare, parse_expectations, walk};

use super::config::SessionConfig;
use super::test_interfaces::{DefaultTestExecutor, TestExecutor};
use super::{CliError, CliResult, ExitCode};

/// Erase the current terminal line and return the cursor to column 0.
const CLEAR_LINE: &str = "\x1b[2K\r";

const GREEN: &str = "\x1b[32m";
const PINK: &str = "\x1b[91m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Indentation of discrepancy lines under a `FAIL:` header.
const FAIL_INDENT: &str = "      ";

// ============================================================================
// Session state
// ============================================================================

/// Running counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub passed: usize,
    pub failed: usize,
    /// Skip counts keyed by reason, iterated alphabetically
    pub skipped: BTreeMap<String, usize>,
    pub num_skipped: usize,
    /// Counted annotations across every file that was run
    pub expectations: usize,
}

impl SessionTotals {
    /// Count one skipped file under `reason`.
    pub fn record_skip(&mut self, reason: &str) {
        self.num_skipped += 1;
        *self.skipped.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// No file failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Result of handling a single test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed(Vec<Discrepancy>),
    Skipped(String),
}

// ============================================================================
// Test Reporter Trait
// ============================================================================

/// Trait for reporting session progress.
pub trait TestReporter {
    /// Called before a selected file is parsed
    fn on_file_start(&mut self, _path: &str, _totals: &SessionTotals) {}

    /// Called right before the interpreter is launched
    fn on_launch(&mut self, _arg: &OsStr) {}

    /// Called when a file has been skipped, passed or failed
    fn on_file_complete(&mut self, path: &str, result: &TestResult);

    /// Called once after the whole tree has been walked
    fn on_run_complete(&mut self, totals: &SessionTotals);
}

/// Default console reporter: a live progress line plus failures and summary.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    verbose: bool,
    color: bool,
    /// Redraw a progress line in place (only makes sense on a terminal)
    live: bool,
}

impl ConsoleReporter {
    /// Reporter on stdout; the progress line is drawn only when stdout is a terminal.
    pub fn new(verbose: bool, color: bool) -> Self {
        let out = io::stdout();
        let live = out.is_terminal();
        Self {
            out,
            verbose,
            color,
            live,
        }
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter on an arbitrary writer, without a live progress line.
    pub fn with_writer(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            live: false,
        }
    }

    /// Redraw the progress line in place regardless of where output goes.
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Start a fresh line, erasing the progress line if one is drawn.
    fn clear(&self) -> &'static str {
        if self.live { CLEAR_LINE } else { "" }
    }

    fn emit(&mut self, text: &str) {
        // Output is best effort; a closed stdout must not abort the session.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_file_start(&mut self, _path: &str, totals: &SessionTotals) {
        if self.live {
            let line = format!("{}{}", CLEAR_LINE, format_progress(totals, self.color));
            self.emit(&line);
        }
    }

    fn on_launch(&mut self, arg: &OsStr) {
        if self.verbose {
            let line = format!("{}{}\n", self.clear(), arg.to_string_lossy());
            self.emit(&line);
        }
    }

    fn on_file_complete(&mut self, path: &str, result: &TestResult) {
        if let TestResult::Failed(fails) = result {
            let block = format!("{}{}\n\n", self.clear(), format_failure(path, fails, self.color));
            self.emit(&block);
        }
    }

    fn on_run_complete(&mut self, totals: &SessionTotals) {
        let summary = format!("{}{}\n", self.clear(), format_summary(totals, self.color));
        self.emit(&summary);
    }
}

fn paint(text: impl Display, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{}{}{}", color, text, RESET)
    } else {
        text.to_string()
    }
}

/// `Passed: P Failed: F Skipped: S`
pub fn format_progress(totals: &SessionTotals, color: bool) -> String {
    format!(
        "Passed: {} Failed: {} Skipped: {}",
        paint(totals.passed, GREEN, color),
        paint(totals.failed, RED, color),
        paint(totals.num_skipped, YELLOW, color)
    )
}

/// The `FAIL:` header followed by every discrepancy line, indented.
pub fn format_failure(path: &str, fails: &[Discrepancy], color: bool) -> String {
    let mut lines = vec![format!("{}: {}", paint("FAIL", RED, color), path)];
    for fail in fails {
        for line in fail.lines() {
            lines.push(format!("{}{}", FAIL_INDENT, paint(line, PINK, color)));
        }
    }
    lines.join("\n")
}

/// Final tally plus one line per skip reason.
pub fn format_summary(totals: &SessionTotals, color: bool) -> String {
    let mut lines = Vec::new();
    if totals.failed == 0 {
        lines.push(format!(
            "All {} tests passed ({} expectations).",
            paint(totals.passed, GREEN, color),
            totals.expectations
        ));
    } else {
        lines.push(format!(
            "{} tests passed. {} tests failed.",
            paint(totals.passed, GREEN, color),
            paint(totals.failed, RED, color)
        ));
    }

    for (reason, count) in &totals.skipped {
        lines.push(format!("Skipped {} tests: {}", paint(count, YELLOW, color), reason));
    }

    lines.join("\n")
}

// ============================================================================
// Session
// ============================================================================

/// Run every selected test under `config.root`.
///
/// Per-file problems are recorded in the returned totals; only a failure to
/// walk the tree or to launch the interpreter ends the session early.
pub fn run_session(
    config: &SessionConfig,
    executor: &mut dyn TestExecutor,
    reporter: &mut dyn TestReporter,
) -> Result<SessionTotals, TestError> {
    let mut totals = SessionTotals::default();

    walk(&config.root, &config.ignored, &mut |path: &Path| {
        run_file(config, path, executor, reporter, &mut totals)
    })?;

    reporter.on_run_complete(&totals);
    Ok(totals)
}

fn run_file(
    config: &SessionConfig,
    path: &Path,
    executor: &mut dyn TestExecutor,
    reporter: &mut dyn TestReporter,
    totals: &mut SessionTotals,
) -> Result<(), TestError> {
    if !config.is_test_file(path) {
        return Ok(());
    }

    if let Some(selector) = &config.selector {
        if !relative_path(path, &config.root).starts_with(selector.as_str()) {
            return Ok(());
        }
    }

    let shown = normalize(path);
    reporter.on_file_start(&shown, totals);

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            totals.failed += 1;
            let result = TestResult::Failed(vec![Discrepancy::Unreadable(e.to_string())]);
            reporter.on_file_complete(&shown, &result);
            return Ok(());
        }
    };

    let expectations = match parse_expectations(&source) {
        Directive::NonTest => {
            tracing::debug!(path = %shown, "not a test");
            return Ok(());
        }
        Directive::Skip(reason) => {
            tracing::debug!(path = %shown, %reason, "skipped");
            totals.record_skip(&reason);
            reporter.on_file_complete(&shown, &TestResult::Skipped(reason));
            return Ok(());
        }
        Directive::Run(expectations) => expectations,
    };

    totals.expectations += expectations.count;

    let arg = test_arg(config.kind, path);
    reporter.on_launch(&arg);

    let started = Instant::now();
    let stdin = expectations.stdin_payload();
    let outcome = executor.execute(&config.binary, &arg, stdin.as_deref(), config.timeout)?;
    let fails = compare(&expectations, &outcome, config.kind);
    tracing::debug!(path = %shown, elapsed = ?started.elapsed(), fails = fails.len(), "ran");

    let result = if fails.is_empty() {
        totals.passed += 1;
        TestResult::Passed
    } else {
        totals.failed += 1;
        TestResult::Failed(fails)
    };
    reporter.on_file_complete(&shown, &result);

    Ok(())
}

/// The argument handed to the interpreter for `path`.
fn test_arg(kind: RunKind, path: &Path) -> OsString {
    match kind {
        // API tests are registered by suite name inside the test host.
        RunKind::Api => path.file_stem().unwrap_or(path.as_os_str()).to_os_string(),
        RunKind::Test | RunKind::Example => path.as_os_str().to_os_string(),
    }
}

/// Path relative to the test root, with `/` separators.
fn relative_path(path: &Path, root: &Path) -> String {
    normalize(path.strip_prefix(root).unwrap_or(path))
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// CLI entry
// ============================================================================

/// Run a session on the console and turn its totals into an exit code.
pub fn run_tests(config: &SessionConfig) -> CliResult<ExitCode> {
    let start_time = Instant::now();
    let mut executor = DefaultTestExecutor;
    let mut reporter = ConsoleReporter::new(config.verbose, config.color);

    let totals = run_session(config, &mut executor, &mut reporter).map_err(fatal)?;

    tracing::info!(
        passed = totals.passed,
        failed = totals.failed,
        skipped = totals.num_skipped,
        "session finished in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    if totals.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// Render a session-ending error with its diagnostic code and help.
fn fatal(err: TestError) -> CliError {
    let code = if err.is_launch_failure() {
        ExitCode::LAUNCH_FAILURE
    } else {
        ExitCode::FAILURE
    };
    CliError::new(format!("\n{:?}", miette::Report::new(err)), code)
}

// ============================================================================
// Tests
// ============================================================================
