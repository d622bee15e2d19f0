//! Building and spawning the summarizer child process.

use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::SummarizerConfig;
use crate::error::RelayError;

/// A freshly spawned summarizer with its output pipes split off.
pub struct SpawnedChild {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Builds one summarizer invocation per request.
#[derive(Debug, Clone)]
pub struct SummarizerCommand {
    config: SummarizerConfig,
}

impl SummarizerCommand {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn program(&self) -> &str {
        &self.config.program
    }

    /// The command that would run for `url`: fixed args first, the URL last.
    pub fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(url)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group, so browsers and other helpers the summarizer
        // starts can be killed along with it.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    pub fn spawn(&self, url: &str) -> Result<SpawnedChild, RelayError> {
        let mut child = self.command(url).spawn().map_err(|source| RelayError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or(RelayError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(RelayError::MissingPipe("stderr"))?;

        Ok(SpawnedChild {
            child,
            stdout,
            stderr,
        })
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
pub fn kill_process_group(pid: u32) -> nix::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    killpg(Pid::from_raw(pgid), Signal::SIGKILL)
}
