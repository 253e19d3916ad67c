//! CLI module for the conformance runner
//!
//! ```text
//! wrenconform [OPTIONS] [SELECTOR]
//! ```
//!
//! With no selector every test under the root is run; with one, only files
//! whose root-relative path starts with it.
//!
//! ## Modules
//!
//! - `config` - Session configuration and interpreter lookup
//! - `test_interfaces` - The executor boundary
//! - `test_runner` - The session loop and console reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod test_interfaces;
pub mod test_runner;

use std::env;
use std::fmt;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use crate::harness::RunKind;
use crate::version::WRENCONFORM_VERSION;

use config::SessionConfig;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// At least one test failed, or the tree could not be walked
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The interpreter under test could not be launched
    pub const LAUNCH_FAILURE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run a language test corpus against an interpreter
#[derive(Parser, Debug)]
#[command(name = "wrenconform")]
#[command(version = WRENCONFORM_VERSION)]
#[command(about = "Run a language test corpus against an interpreter", long_about = None)]
pub struct Cli {
    /// Only run tests whose path (relative to the test root) starts with this
    #[arg(value_name = "SELECTOR")]
    pub selector: Option<String>,

    /// Root directory of the test corpus
    #[arg(long, value_name = "DIR", default_value = "test")]
    pub root: PathBuf,

    /// Interpreter under test (default: $WRENCONFORM_BIN, then bin/wren)
    #[arg(long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Extension of test source files
    #[arg(long = "ext", value_name = "EXT", default_value = "wren")]
    pub extension: String,

    /// Additional file or directory names to leave out (benchmark is always ignored)
    #[arg(long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,

    /// How files are passed to the interpreter and judged
    #[arg(long, value_enum, default_value_t = RunKind::Test)]
    pub kind: RunKind,

    /// Kill a test that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print each interpreter argument before running it
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Build the session configuration, resolving defaults from the environment.
    pub fn session_config(&self) -> SessionConfig {
        let color = !self.no_color && env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();

        SessionConfig::new()
            .with_root(&self.root)
            .with_binary(config::find_binary(self.binary.clone()))
            .with_extension(&self.extension)
            .with_ignored(self.ignore.iter().cloned())
            .with_kind(self.kind)
            .with_selector(self.selector.clone())
            .with_timeout(self.timeout.map(Duration::from_secs))
            .with_verbose(self.verbose)
            .with_color(color)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the parsed command line and return the exit code.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.session_config();

    if !config.root.is_dir() {
        return Err(CliError::failure(format!(
            "Test root '{}' is not a directory",
            config.root.display()
        )));
    }

    tracing::debug!(?config, "starting session");
    test_runner::run_tests(&config)
}

// ============================================================================
// Tests
// ============================================================================
