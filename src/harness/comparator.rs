//! Comparing a run against its expectations
//!
//! The checks run in a fixed order: decode problems, stderr against the
//! expected errors, the exit code, and finally stdout line by line. A
//! mismatched exit code suppresses the stdout comparison, since output from a
//! run that failed differently than expected is noise.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::{RunKind, pattern};
use super::executor::RunOutcome;
use super::expectations::ExpectationSet;

/// `[<module> line <N>] Error...` as printed by the interpreter for compile errors.
static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\[.* line (\d+)\] Error"));

/// One way in which a run failed to meet its expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// Captured output was not valid UTF-8
    Decode,
    /// The child was killed after running past the timeout
    TimedOut(Duration),
    /// The test file itself could not be read
    Unreadable(String),
    RuntimeErrorMismatch { expected: String, actual: String },
    UnexpectedError { line: String },
    UnexpectedStderr { line: String },
    MissingError { line: usize },
    MissingRuntimeError { message: String },
    ExitCode { expected: i32, actual: i32, stderr: String },
    UnexpectedOutput { actual: String },
    OutputMismatch { expected: String, line: usize, actual: String },
    MissingOutput { expected: String, line: usize },
}

impl Discrepancy {
    /// Display lines for this discrepancy, in the order they are reported.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Discrepancy::Decode => vec!["Error decoding output.".to_string()],
            Discrepancy::TimedOut(limit) => {
                vec![format!("Timed out after {:.1}s and was killed.", limit.as_secs_f64())]
            }
            Discrepancy::Unreadable(reason) => vec![format!("Could not read test file: {}", reason)],
            Discrepancy::RuntimeErrorMismatch { expected, actual } => vec![
                format!("Expected runtime error \"{}\" and got:", expected),
                actual.clone(),
            ],
            Discrepancy::UnexpectedError { line } => vec!["Unexpected error:".to_string(), line.clone()],
            Discrepancy::UnexpectedStderr { line } => {
                vec!["Unexpected output on stderr:".to_string(), line.clone()]
            }
            Discrepancy::MissingError { line } => {
                vec![format!("Expected error on line {} and got none.", line)]
            }
            Discrepancy::MissingRuntimeError { message } => {
                vec![format!("Expected runtime error \"{}\" and got none.", message)]
            }
            Discrepancy::ExitCode {
                expected,
                actual,
                stderr,
            } => {
                let mut lines = vec![format!(
                    "Expected return code {} and got {}. Stderr:",
                    expected, actual
                )];
                lines.extend(stderr.split('\n').map(str::to_string));
                lines
            }
            Discrepancy::UnexpectedOutput { actual } => {
                vec![format!("Got output \"{}\" when none was expected.", actual)]
            }
            Discrepancy::OutputMismatch { expected, line, actual } => vec![format!(
                "Expected output \"{}\" on line {} and got \"{}\".",
                expected, line, actual
            )],
            Discrepancy::MissingOutput { expected, line } => {
                vec![format!("Missing expected output \"{}\" on line {}.", expected, line)]
            }
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Compare a captured run against the file's expectations.
///
/// An empty result means the test passed.
#[tracing::instrument(skip_all, fields(exit_code = outcome.exit_code, expected_exit = expected.exit_code))]
pub fn compare(expected: &ExpectationSet, outcome: &RunOutcome, kind: RunKind) -> Vec<Discrepancy> {
    let mut fails = Vec::new();

    if outcome.decode_failed {
        fails.push(Discrepancy::Decode);
    }

    if let Some(limit) = outcome.timed_out {
        fails.push(Discrepancy::TimedOut(limit));
        return fails;
    }

    check_errors(expected, outcome, &mut fails);

    if outcome.exit_code != expected.exit_code {
        fails.push(Discrepancy::ExitCode {
            expected: expected.exit_code,
            actual: outcome.exit_code,
            stderr: outcome.stderr.clone(),
        });
    } else {
        check_output(expected, &outcome.stdout, kind, &mut fails);
    }

    fails
}

fn check_errors(expected: &ExpectationSet, outcome: &RunOutcome, fails: &mut Vec<Discrepancy>) {
    if expected.exit_code != 0 && !outcome.stderr.is_empty() {
        if let Some(runtime) = &expected.runtime_error {
            let first = outcome.stderr.split('\n').next().unwrap_or_default();
            if first != runtime.message {
                fails.push(Discrepancy::RuntimeErrorMismatch {
                    expected: runtime.message.clone(),
                    actual: first.to_string(),
                });
            }
            return;
        }

        for line in outcome.stderr.split('\n') {
            match ERROR_LINE.captures(line) {
                Some(caps) => {
                    let reported = caps[1].parse::<usize>().ok();
                    if !reported.is_some_and(|n| expected.error_lines.contains(&n)) {
                        fails.push(Discrepancy::UnexpectedError { line: line.to_string() });
                    }
                }
                None if !line.is_empty() => {
                    fails.push(Discrepancy::UnexpectedStderr { line: line.to_string() });
                }
                None => {}
            }
        }
    } else {
        for line in &expected.error_lines {
            fails.push(Discrepancy::MissingError { line: *line });
        }
        if let Some(runtime) = &expected.runtime_error {
            fails.push(Discrepancy::MissingRuntimeError {
                message: runtime.message.clone(),
            });
        }
    }
}

fn check_output(expected: &ExpectationSet, stdout: &str, kind: RunKind, fails: &mut Vec<Discrepancy>) {
    let mut out_lines: Vec<&str> = stdout.split('\n').collect();
    if out_lines.last() == Some(&"") {
        out_lines.pop();
    }

    // Examples only have their output length checked against the expectations.
    let compared = if kind == RunKind::Example { &[][..] } else { &out_lines[..] };

    for (index, line) in compared.iter().enumerate() {
        match expected.output.get(index) {
            None => fails.push(Discrepancy::UnexpectedOutput {
                actual: line.to_string(),
            }),
            Some(want) if want.text != *line => fails.push(Discrepancy::OutputMismatch {
                expected: want.text.clone(),
                line: want.line,
                actual: line.to_string(),
            }),
            Some(_) => {}
        }
    }

    for missing in expected.output.iter().skip(out_lines.len()) {
        fails.push(Discrepancy::MissingOutput {
            expected: missing.text.clone(),
            line: missing.line,
        });
    }
}
