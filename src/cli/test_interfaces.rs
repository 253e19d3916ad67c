//! Test runner I/O boundary interfaces
//!
//! Launching the interpreter is the only side effect a session has besides
//! reading files and printing. It sits behind the `TestExecutor` trait so the
//! session logic can be exercised without a real interpreter (and so a future
//! executor can, say, run inside a sandbox) without touching the runner.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use crate::harness::{RunOutcome, TestError, run_process};

// ============================================================================
// Test Executor Interface
// ============================================================================

/// Run the binary under test against one file and capture the result.
pub trait TestExecutor {
    /// Run `binary arg` with optional stdin bytes.
    ///
    /// Errors from here are fatal to the session; anything the interpreter
    /// itself gets wrong belongs in the returned [`RunOutcome`].
    fn execute(
        &mut self,
        binary: &Path,
        arg: &OsStr,
        stdin: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<RunOutcome, TestError>;
}

// ============================================================================
// Default Implementation
// ============================================================================

/// Subprocess execution with full output capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTestExecutor;

impl TestExecutor for DefaultTestExecutor {
    fn execute(
        &mut self,
        binary: &Path,
        arg: &OsStr,
        stdin: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<RunOutcome, TestError> {
        run_process(binary, arg, stdin, timeout)
    }
}
