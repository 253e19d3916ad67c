#![forbid(unsafe_code)]
//! wrenconform: a conformance test runner for a language implementation
//!
//! Test files carry their own expectations as comments (`// expect: 3`,
//! `// expect runtime error: ...`). The runner walks a test tree, runs the
//! interpreter under test on each file, and reports every way the actual
//! stdout, stderr and exit code differ from what the file asked for.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a harness bug (logic error), use `.expect("INVARIANT: reason")` with a
//!   clear explanation.

pub mod cli;
pub mod harness;
pub mod version;

pub use cli::config::SessionConfig;
pub use cli::test_runner::{SessionTotals, TestReporter, TestResult, run_session};
pub use harness::{Directive, Discrepancy, ExpectationSet, RunKind, RunOutcome, compare, parse_expectations};
