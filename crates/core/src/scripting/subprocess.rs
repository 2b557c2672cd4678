//! Child process plumbing for script runs.
//!
//! [`run_command`] takes a prepared [`Command`], wires its pipes, applies the
//! environment from [`ScriptInput`] and waits for it under the input timeout.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::executor::{ScriptError, ScriptInput, ScriptOutput};

/// Per-stream capture cap. Bytes past this are dropped.
const STREAM_CAP: u64 = 10 * 1024 * 1024;

/// Run `cmd` to completion and collect what it printed.
///
/// Stdin is closed. A run that outlives `input.timeout` is killed and
/// reported as [`ScriptError::Timeout`].
pub async fn run_command(
    cmd: &mut Command,
    input: ScriptInput,
) -> Result<ScriptOutput, ScriptError> {
    cmd.envs(input.env_vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(cwd) = input.working_directory.as_deref() {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ScriptError::from_spawn(&program, e))?;

    let out_pipe = child.stdout.take();
    let err_pipe = child.stderr.take();

    // Pipes are drained alongside `wait` so a chatty child never blocks on a
    // full pipe buffer.
    let finished = tokio::time::timeout(input.timeout, async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), drain(out_pipe), drain(err_pipe));
        status.map(|status| (status, stdout, stderr))
    })
    .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    // On timeout `child` drops here and is killed.
    let (status, stdout, stderr) = finished
        .map_err(|_| ScriptError::Timeout { elapsed_ms })?
        .map_err(ScriptError::Io)?;

    Ok(ScriptOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms: elapsed_ms,
    })
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut captured = Vec::new();
    if let Some(pipe) = pipe {
        let _ = pipe.take(STREAM_CAP).read_to_end(&mut captured).await;
    }
    captured
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
