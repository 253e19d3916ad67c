//! Expectation annotations embedded in test source files
//!
//! A test file states what running it should produce through line comments:
//!
//! ```text
//! // expect: <text>                 one line of stdout, in order
//! // expect error                   compile error reported on this line
//! // expect error line <N>          compile error reported on line N
//! // expect runtime error: <msg>    first stderr line, exit code 70
//! // stdin: <text>                  one line fed to the interpreter
//! // skip: <reason>                 do not run, count as skipped
//! // nontest                        not a test at all
//! ```
//!
//! Markers are searched anywhere in a line, and every pattern is checked
//! against every line. `skip` and `nontest` end parsing immediately and
//! discard whatever was collected before them.

use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;

use super::pattern;

/// Exit code the interpreter uses when compilation fails.
pub const EXIT_COMPILE_ERROR: i32 = 65;
/// Exit code the interpreter uses when a runtime error aborts the script.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

static EXPECT: LazyLock<Regex> = LazyLock::new(|| pattern(r"// expect: (.*)"));
static EXPECT_ERROR: LazyLock<Regex> = LazyLock::new(|| pattern(r"// expect error"));
static EXPECT_ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| pattern(r"// expect error line (\d+)"));
static EXPECT_RUNTIME_ERROR: LazyLock<Regex> = LazyLock::new(|| pattern(r"// expect runtime error: (.+)"));
static STDIN: LazyLock<Regex> = LazyLock::new(|| pattern(r"// stdin: (.*)"));
static SKIP: LazyLock<Regex> = LazyLock::new(|| pattern(r"// skip: (.*)"));
static NONTEST: LazyLock<Regex> = LazyLock::new(|| pattern(r"// nontest"));

/// One expected line of stdout and where it was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedOutput {
    pub text: String,
    /// 1-based line of the annotation in the test file
    pub line: usize,
}

/// The runtime error a test expects on the first line of stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedRuntimeError {
    pub message: String,
    pub line: usize,
}

/// Everything a single run of a test file must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpectationSet {
    pub output: Vec<ExpectedOutput>,
    /// Lines expecting a compile error, in annotation order (repeats kept)
    pub error_lines: Vec<usize>,
    pub exit_code: i32,
    /// Last `expect runtime error:` in the file wins
    pub runtime_error: Option<ExpectedRuntimeError>,
    /// Input lines, each already terminated by `\n`
    pub stdin_lines: Vec<String>,
    /// Number of counted annotations (output, error and runtime error)
    pub count: usize,
}

impl ExpectationSet {
    /// Bytes to feed the interpreter on stdin, if the file asked for any.
    pub fn stdin_payload(&self) -> Option<Vec<u8>> {
        if self.stdin_lines.is_empty() {
            None
        } else {
            Some(self.stdin_lines.concat().into_bytes())
        }
    }

    /// Apply every marker found on `line`; a skip or nontest marker ends the scan.
    fn scan_line(&mut self, line: &str, line_num: usize) -> Option<Directive> {
        if let Some(caps) = EXPECT.captures(line) {
            self.output.push(ExpectedOutput {
                text: caps[1].to_string(),
                line: line_num,
            });
            self.count += 1;
        }

        if EXPECT_ERROR.is_match(line) {
            self.error_lines.push(line_num);
            self.exit_code = EXIT_COMPILE_ERROR;
            self.count += 1;
        }

        if let Some(caps) = EXPECT_ERROR_LINE.captures(line) {
            match caps[1].parse::<usize>() {
                Ok(target) => self.error_lines.push(target),
                Err(e) => tracing::warn!(line = line_num, "ignoring error line number {}: {}", &caps[1], e),
            }
            self.exit_code = EXIT_COMPILE_ERROR;
            self.count += 1;
        }

        if let Some(caps) = EXPECT_RUNTIME_ERROR.captures(line) {
            self.runtime_error = Some(ExpectedRuntimeError {
                message: caps[1].to_string(),
                line: line_num,
            });
            self.exit_code = EXIT_RUNTIME_ERROR;
            self.count += 1;
        }

        if let Some(caps) = STDIN.captures(line) {
            self.stdin_lines.push(format!("{}\n", &caps[1]));
        }

        if let Some(caps) = SKIP.captures(line) {
            return Some(Directive::Skip(caps[1].to_string()));
        }

        if NONTEST.is_match(line) {
            return Some(Directive::NonTest);
        }

        None
    }
}

/// What the session should do with a test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Run the interpreter and check these expectations
    Run(ExpectationSet),
    /// Count the file as skipped under this reason
    Skip(String),
    /// Not a test; leave it alone entirely
    NonTest,
}

/// Parse the annotations in a test file's source text.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn parse_expectations(source: &str) -> Directive {
    let scanned = source
        .lines()
        .enumerate()
        .try_fold(ExpectationSet::default(), |mut set, (idx, line)| {
            match set.scan_line(line, idx + 1) {
                Some(terminal) => ControlFlow::Break(terminal),
                None => ControlFlow::Continue(set),
            }
        });

    match scanned {
        ControlFlow::Continue(set) => Directive::Run(set),
        ControlFlow::Break(terminal) => terminal,
    }
}
