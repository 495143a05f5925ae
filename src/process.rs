use crate::error::{FleetError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Run an external command in `cwd` and return its captured stdout, trimmed.
///
/// Fails with `FleetError::ExternalCommand` on spawn failure, non-zero exit,
/// or when `timeout` elapses before the child exits. stdin is closed so no
/// child can block waiting for input.
pub fn run(program: &str, args: &[&str], cwd: &Path, timeout: Option<Duration>) -> Result<String> {
    let cmd_display = command_line(program, args);
    debug!("running `{cmd_display}` in {}", cwd.display());

    let mut cmd = build_command(program, args);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = match timeout {
        Some(limit) => wait_with_timeout(cmd, limit, &cmd_display)?,
        None => cmd.output().map_err(|e| FleetError::ExternalCommand {
            command: cmd_display.clone(),
            code: None,
            stderr: e.to_string(),
        })?,
    };

    if !output.status.success() {
        return Err(FleetError::ExternalCommand {
            command: cmd_display,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git subcommand inside `<workdir>/<repo>`.
pub fn run_git(
    workdir: &Path,
    repo: &str,
    args: &[&str],
    timeout: Option<Duration>,
) -> Result<String> {
    run("git", args, &workdir.join(repo), timeout)
}

/// Identifier of the empty tree, used as the diff base for whole-repo totals.
pub fn empty_tree_id(workdir: &Path, repo: &str, timeout: Option<Duration>) -> Result<String> {
    run_git(workdir, repo, &["mktree"], timeout)
}

// Children run at lowered scheduling priority where the platform has a
// notion of it.
#[cfg(unix)]
fn build_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new("nice");
    cmd.arg("-n").arg("20").arg(program).args(args);
    cmd
}

#[cfg(not(unix))]
fn build_command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}

fn wait_with_timeout(
    mut cmd: Command,
    limit: Duration,
    cmd_display: &str,
) -> Result<std::process::Output> {
    let mut child = cmd.spawn().map_err(|e| FleetError::ExternalCommand {
        command: cmd_display.to_string(),
        code: None,
        stderr: e.to_string(),
    })?;

    // Drain the pipes off-thread so a chatty child cannot deadlock on a
    // full pipe buffer while we poll its exit status.
    let stdout = child.stdout.take().map(read_to_end_thread);
    let stderr = child.stderr.take().map(read_to_end_thread);

    let started = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = stdout.map(join_reader).unwrap_or_default();
                let stderr = stderr.map(join_reader).unwrap_or_default();
                return Ok(std::process::Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            None if started.elapsed() >= limit => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FleetError::ExternalCommand {
                    command: cmd_display.to_string(),
                    code: None,
                    stderr: format!("timed out after {}s", limit.as_secs()),
                });
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }
}

fn read_to_end_thread<R: std::io::Read + Send + 'static>(
    mut reader: R,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::Read::read_to_end(&mut reader, &mut buf);
        buf
    })
}

fn join_reader(handle: std::thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
