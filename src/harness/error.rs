//! Harness-level errors
//!
//! These are the faults that stop a session outright: the interpreter cannot be
//! launched, or the test tree cannot be listed. Everything that goes wrong
//! *inside* a single test file is a [`Discrepancy`](super::Discrepancy) instead.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that occur while driving the binary under test
#[derive(Debug, Error, Diagnostic)]
pub enum TestError {
    #[error("failed to launch `{}`: {source}", binary.display())]
    #[diagnostic(
        code(wrenconform::spawn),
        help("pass --binary or set WRENCONFORM_BIN to the interpreter under test")
    )]
    Spawn { binary: PathBuf, source: io::Error },

    #[error("failed to list `{}`: {source}", path.display())]
    #[diagnostic(code(wrenconform::walk))]
    Walk { path: PathBuf, source: io::Error },

    #[error("lost output of `{}`: {source}", binary.display())]
    #[diagnostic(code(wrenconform::capture))]
    Capture { binary: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    #[diagnostic(code(wrenconform::io))]
    Io(#[from] io::Error),
}

impl TestError {
    /// Whether the failure happened before the interpreter could start at all.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, TestError::Spawn { .. })
    }
}
