// Local process execution for privileged chat commands.
//
// - Executable resolved through PATH to an absolute path (which)
// - stdout and stderr share one pipe, so output keeps emission order
// - Hard wall-clock deadline; on expiry the whole process group is killed
// - kill_on_drop + group guard so a cancelled invocation leaves nothing behind

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_core::config::DEFAULT_EXEC_TIMEOUT_SECS;
use relay_core::{ProcessOutput, ProcessRunner, RunError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;

pub struct LocalProcessRunner {
    deadline: Duration,
}

impl Default for LocalProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS))
    }
}

impl LocalProcessRunner {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Resolve `action` through the search path and make it absolute.
pub fn resolve_executable(action: &str) -> Result<PathBuf, RunError> {
    let not_found = || RunError::ExecutableNotFound {
        action: action.to_string(),
    };

    let found = which::which(action).map_err(|_| not_found())?;
    if found.is_absolute() {
        return Ok(found);
    }
    let cwd = env::current_dir().map_err(|_| not_found())?;
    Ok(cwd.join(found))
}

/// Kills the child's process group when dropped unless disarmed.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_group(pid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, "process group already gone: {}", err);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

type OutputReader = Box<dyn AsyncRead + Unpin + Send>;

/// One pipe behind both stdout and stderr, so chunks arrive in the order the
/// process wrote them.
#[cfg(unix)]
fn output_pipe() -> io::Result<(OutputReader, Stdio, Stdio)> {
    use std::os::fd::{FromRawFd, OwnedFd};
    use tokio::net::unix::pipe::Receiver;

    let (read_fd, write_fd) = nix::unistd::pipe()?;
    // SAFETY: both descriptors were just created and nothing else owns them.
    let (read_end, write_end) =
        unsafe { (OwnedFd::from_raw_fd(read_fd), OwnedFd::from_raw_fd(write_fd)) };

    // Clones are close-on-exec; the originals close when this returns.
    let reader = Receiver::from_owned_fd(read_end.try_clone()?)?;
    let stdout = Stdio::from(write_end.try_clone()?);
    let stderr = Stdio::from(write_end.try_clone()?);
    Ok((Box::new(reader), stdout, stderr))
}

/// Append one read result to `output`. Returns whether the stream is still open.
fn absorb(read: io::Result<usize>, chunk: &[u8], output: &mut Vec<u8>) -> bool {
    match read {
        Ok(0) => false,
        Ok(n) => {
            output.extend_from_slice(&chunk[..n]);
            true
        }
        Err(err) => {
            warn!(target: "relay_tools", "output read failed, treating as closed: {}", err);
            false
        }
    }
}

#[cfg(unix)]
fn spawn(path: &Path, args: &[String]) -> Result<(Child, OutputReader), RunError> {
    let spawn_error = |source| RunError::Spawn {
        path: path.to_path_buf(),
        source,
    };

    let (reader, stdout, stderr) = output_pipe().map_err(spawn_error)?;
    let mut command = Command::new(path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .process_group(0);

    // `command` holds the parent's write ends; dropping it lets EOF arrive.
    let child = command.spawn().map_err(spawn_error)?;
    Ok((child, reader))
}

// Only stdout is captured off unix.
#[cfg(not(unix))]
fn spawn(path: &Path, args: &[String]) -> Result<(Child, OutputReader), RunError> {
    let spawn_error = |source| RunError::Spawn {
        path: path.to_path_buf(),
        source,
    };

    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_error)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error(io::Error::new(io::ErrorKind::Other, "stdout not captured")))?;
    Ok((child, Box::new(stdout)))
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, action: &str, args: &[String]) -> Result<ProcessOutput, RunError> {
        let path = match resolve_executable(action) {
            Ok(path) => path,
            Err(err) => {
                warn!(target: "relay_tools", %action, "executable not found");
                return Err(err);
            }
        };

        let start = Instant::now();
        let (mut child, mut reader) = spawn(&path, args)?;
        let mut guard = GroupGuard { pid: child.id() };

        let mut chunk = [0u8; READ_CHUNK];
        let mut output = Vec::new();
        let mut open = true;

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                _ = &mut deadline => {
                    drop(guard);
                    if let Err(err) = child.start_kill() {
                        debug!("child already exited: {}", err);
                    }
                    info!(
                        target: "relay_tools",
                        "process timed out | binary={} deadline_ms={} output_len={}",
                        path.display(),
                        self.deadline.as_millis(),
                        output.len()
                    );
                    return Err(RunError::Timeout {
                        deadline: self.deadline,
                        output,
                    });
                }
                read = reader.read(&mut chunk), if open => {
                    open = absorb(read, &chunk, &mut output);
                }
                status = child.wait(), if !open => {
                    break status.map_err(|source| RunError::Spawn {
                        path: path.clone(),
                        source,
                    })?;
                }
            }
        };
        guard.disarm();

        let duration = start.elapsed();
        let exit_code = status.code();
        info!(
            target: "relay_tools",
            "process completed | binary={} exit_code={:?} duration_ms={} output_len={}",
            path.display(),
            exit_code,
            duration.as_millis(),
            output.len()
        );

        Ok(ProcessOutput {
            output,
            exit_code,
            duration,
        })
    }
}
