//! Conformance harness core
//!
//! ## Modules
//!
//! - `expectations` - Annotation parsing (`// expect: ...` and friends)
//! - `executor` - Running the binary under test and capturing its output
//! - `comparator` - Diffing a run against its expectations
//! - `walker` - Recursive test file discovery
//! - `error` - Fatal harness errors
//!
//! Nothing in here prints; reporting lives with the session in `cli`.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]

pub mod comparator;
pub mod error;
pub mod executor;
pub mod expectations;
pub mod walker;

use regex::Regex;

pub use comparator::{Discrepancy, compare};
pub use error::TestError;
pub use executor::{RunOutcome, run_process};
pub use expectations::{Directive, ExpectationSet, parse_expectations};
pub use walker::walk;

/// How a test file is handed to the interpreter and how its output is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunKind {
    /// Pass the file path; compare stdout line by line
    #[default]
    Test,
    /// Pass the file path; only check that enough output lines appear
    Example,
    /// Pass the bare suite name (file stem) to an embedding test host
    Api,
}

/// Compile one of the harness's fixed patterns.
#[allow(clippy::expect_used)]
pub(crate) fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("INVARIANT: harness pattern is a valid regex")
}
