//! Running the binary under test
//!
//! The interpreter is a black box: it gets one argument, optional bytes on
//! stdin, and we keep whatever it writes plus its exit status. By default the
//! wait is unbounded; a timeout can be supplied, after which the child is killed.

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::error::TestError;

/// How often a bounded wait checks whether the child has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long the output pipes of a killed child may stay open before their
/// readers are abandoned. Anything the child spawned can hold them open.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Exit code recorded when the child was terminated by a signal.
pub const NO_EXIT_CODE: i32 = -1;

/// Captured result of one interpreter run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Either stream was not valid UTF-8 (text above is decoded lossily)
    pub decode_failed: bool,
    /// Set to the limit when the child had to be killed
    pub timed_out: Option<Duration>,
}

impl RunOutcome {
    /// Build an outcome from raw captured bytes, decoding them as text.
    pub fn from_bytes(stdout: &[u8], stderr: &[u8], exit_code: i32) -> Self {
        let (stdout, out_ok) = decode(stdout);
        let (stderr, err_ok) = decode(stderr);
        Self {
            stdout,
            stderr,
            exit_code,
            decode_failed: !(out_ok && err_ok),
            timed_out: None,
        }
    }
}

/// Decode captured bytes as UTF-8 with `\r\n` normalized to `\n`.
///
/// Returns the text and whether decoding was clean.
pub fn decode(bytes: &[u8]) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.replace("\r\n", "\n"), true),
        Err(_) => (String::from_utf8_lossy(bytes).replace("\r\n", "\n"), false),
    }
}

/// Run `binary arg`, feed it `stdin`, and capture everything it produces.
///
/// ## Errors
///
/// - [`TestError::Spawn`] if the binary cannot be launched
/// - [`TestError::Capture`] if its output streams cannot be drained
/// - [`TestError::Io`] if waiting on the child fails
#[tracing::instrument(skip_all, fields(binary = %binary.display(), arg = ?arg))]
pub fn run_process(
    binary: &Path,
    arg: &OsStr,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Result<RunOutcome, TestError> {
    let mut child = Command::new(binary)
        .arg(arg)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TestError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

    // Feed stdin from its own thread so a child that writes before it reads
    // cannot deadlock against us. Dropping the pipe closes it.
    let input = stdin.map(<[u8]>::to_vec).unwrap_or_default();
    let stdin_pipe = child.stdin.take();
    let writer = thread::spawn(move || {
        if let Some(mut pipe) = stdin_pipe {
            if let Err(e) = pipe.write_all(&input) {
                // The child is allowed to exit without reading its input.
                tracing::debug!("stdin closed early: {}", e);
            }
        }
    });

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let waited = wait_for_exit(&mut child, timeout);
    let (status, timed_out) = reap_on_error(&mut child, waited)?;

    let (stdout, stderr) = if timed_out.is_some() {
        // The writer and readers may be blocked on pipes a grandchild still holds.
        let deadline = Instant::now() + DRAIN_GRACE;
        (drain_until(stdout_reader, deadline), drain_until(stderr_reader, deadline))
    } else {
        let _ = writer.join();
        (collect(stdout_reader, binary)?, collect(stderr_reader, binary)?)
    };

    let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
    tracing::debug!(exit_code, stdout_len = stdout.len(), stderr_len = stderr.len(), "child exited");

    let mut outcome = RunOutcome::from_bytes(&stdout, &stderr, exit_code);
    outcome.timed_out = timed_out;
    Ok(outcome)
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>, binary: &Path) -> Result<Vec<u8>, TestError> {
    let captured = reader
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))
        .and_then(|res| res);
    captured.map_err(|source| TestError::Capture {
        binary: binary.to_path_buf(),
        source,
    })
}

/// Pass `result` through, killing and reaping `child` first if it is an error.
fn reap_on_error<T>(child: &mut Child, result: Result<T, TestError>) -> Result<T, TestError> {
    if result.is_err() {
        let _ = child.kill();
        let _ = child.wait();
    }
    result
}

/// Take a reader's output if it finishes by `deadline`, else leave it detached.
fn drain_until(reader: JoinHandle<io::Result<Vec<u8>>>, deadline: Instant) -> Vec<u8> {
    while !reader.is_finished() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }
    if !reader.is_finished() {
        tracing::debug!("output pipe still open after kill, abandoning reader");
        return Vec::new();
    }
    reader.join().ok().and_then(Result::ok).unwrap_or_default()
}

/// Wait for the child, killing it once `timeout` elapses.
fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> Result<(ExitStatus, Option<Duration>), TestError> {
    let Some(limit) = timeout else {
        return Ok((child.wait()?, None));
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, None));
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "no exit after {:?}, killing", limit);
            // The child may have exited between the poll and the kill.
            let _ = child.kill();
            return Ok((child.wait()?, Some(limit)));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
