//! Child process execution for subprocess-backed collaborators.
//!
//! Each collaborator call is one process: a JSON request on stdin, a JSON
//! response on stdout. Calls are blocking and must run on a blocking thread.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub timed_out: bool,
}

/// Run `argv` with `stdin` piped in, bounded by `timeout`.
///
/// stdout/stderr are drained on reader threads so a chatty child cannot block on
/// a full pipe. Bytes beyond `output_limit_bytes` are counted and discarded.
#[instrument(skip_all, fields(program = argv.first().map(String::as_str), timeout_secs = timeout.as_secs()))]
pub fn run_command(
    argv: &[String],
    stdin: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("collaborator command is empty"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn collaborator {program}"))?;

    {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        // A child that exits without reading its request closes the pipe early.
        match child_stdin.write_all(stdin) {
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("collaborator closed stdin before reading the request");
            }
            other => other.context("write stdin")?,
        }
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for collaborator")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "collaborator timed out, killing");
            timed_out = true;
            child.kill().context("kill collaborator")?;
            child.wait().context("wait collaborator after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, _) = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, stdout_truncated, "collaborator finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        timed_out,
    })
}

/// Send `request` as JSON and parse the JSON response.
pub fn call_json<Req: Serialize, Resp: DeserializeOwned>(
    argv: &[String],
    request: &Req,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<Resp> {
    let payload = serde_json::to_vec(request).context("serialize collaborator request")?;
    let output = run_command(argv, &payload, timeout, output_limit_bytes)?;
    if output.timed_out {
        bail!("collaborator timed out after {timeout:?}");
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "collaborator exited with status {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }
    if output.stdout_truncated > 0 {
        bail!(
            "collaborator response exceeded {output_limit_bytes} bytes ({} dropped)",
            output.stdout_truncated
        );
    }
    serde_json::from_slice(&output.stdout).context("parse collaborator response")
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        let keep = n.min(remaining);
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn call_json_round_trips_through_cat() {
        let response: Value = call_json(
            &["cat".to_string()],
            &json!({"query": "notion database"}),
            Duration::from_secs(5),
            1024,
        )
        .expect("call");
        assert_eq!(response["query"], "notion database");
    }

    #[test]
    fn nonzero_exit_is_an_error_with_stderr() {
        let err = call_json::<_, Value>(
            &sh("echo boom >&2; exit 3"),
            &json!({}),
            Duration::from_secs(5),
            1024,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Some(3)"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[test]
    fn slow_command_is_killed() {
        let output = run_command(&sh("sleep 5"), b"", Duration::from_millis(100), 1024)
            .expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn output_beyond_limit_is_counted() {
        let output = run_command(&sh("printf 0123456789"), b"", Duration::from_secs(5), 4)
            .expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = run_command(&[], b"", Duration::from_secs(1), 10).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
