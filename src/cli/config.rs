//! Session configuration
//!
//! Defaults match the layout of an interpreter checkout: tests under `test/`,
//! the built interpreter at `bin/wren`, benchmarks excluded.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::harness::RunKind;

/// Environment variable naming the interpreter when `--binary` is not given.
pub const BINARY_ENV: &str = "WRENCONFORM_BIN";

/// Directory name that is never walked.
pub const ALWAYS_IGNORED: &str = "benchmark";

/// Everything a test session needs to know before it starts
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root of the test tree; selectors are relative to it
    pub root: PathBuf,
    /// Interpreter under test
    pub binary: PathBuf,
    /// Source extension (without the dot) that marks a test file
    pub extension: String,
    /// File and directory names pruned from the walk
    pub ignored: Vec<String>,
    /// How files are passed to the interpreter and judged
    pub kind: RunKind,
    /// Only run files whose root-relative path starts with this
    pub selector: Option<String>,
    /// Kill a test that has not exited after this long
    pub timeout: Option<Duration>,
    /// Echo each interpreter argument before running it
    pub verbose: bool,
    /// Emit ANSI colors in the report
    pub color: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("test"),
            binary: PathBuf::from("bin").join("wren"),
            extension: "wren".to_string(),
            ignored: vec![ALWAYS_IGNORED.to_string()],
            kind: RunKind::Test,
            selector: None,
            timeout: None,
            verbose: false,
            color: false,
        }
    }
}

impl SessionConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the test root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the interpreter under test
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the test file extension; a leading dot is tolerated
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Ignore additional names on top of the always-ignored ones
    pub fn with_ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.ignored.contains(&name) {
                self.ignored.push(name);
            }
        }
        self
    }

    /// Set the run kind
    pub fn with_kind(mut self, kind: RunKind) -> Self {
        self.kind = kind;
        self
    }

    /// Restrict the run to paths starting with `selector`
    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    /// Bound how long each test may run
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Echo interpreter arguments
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enable or disable colored output
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Whether `path` has the configured test extension
    pub fn is_test_file(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
    }
}

/// Locate the interpreter under test.
///
/// Lookup order: the explicit `--binary` value, then `WRENCONFORM_BIN`, then
/// `bin/wren` relative to the working directory.
pub fn find_binary(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    if let Ok(from_env) = env::var(BINARY_ENV) {
        if !from_env.is_empty() {
            return PathBuf::from(from_env);
        }
    }

    SessionConfig::default().binary
}
