//! Bounded execution of external optimizer binaries.
//!
//! Every invocation ends in a [`CommandOutcome`]; spawn errors, non-zero
//! exits and timeouts are values, not errors. A child that outlives its
//! timeout is killed before [`BoundedCommand::run`] returns.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit code 0; carries whatever the tool wrote to stdout.
    Success { stdout: Vec<u8> },
    /// The tool ran but exited non-zero (`None` when killed by a signal).
    Failed { code: Option<i32> },
    TimedOut,
    /// The tool could not be started at all.
    SpawnFailed(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BoundedCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
}

impl BoundedCommand {
    pub fn new(program: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            stdin: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes piped to the child's stdin; stdin is closed otherwise.
    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// Runs the command to completion or until the timeout expires.
    ///
    /// Drives the child on a private current-thread runtime, so this must not
    /// be called from within an async context.
    pub fn run(self) -> CommandOutcome {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => return CommandOutcome::SpawnFailed(e.to_string()),
        };

        let program = self.program.clone();
        let timeout = self.timeout;
        let outcome = runtime.block_on(async move {
            match tokio::time::timeout(timeout, self.execute()).await {
                Ok(outcome) => outcome,
                Err(_) => CommandOutcome::TimedOut,
            }
        });

        debug!("{:?} finished: {:?}", program, outcome_label(&outcome));
        outcome
    }

    async fn execute(self) -> CommandOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return CommandOutcome::SpawnFailed(e.to_string()),
        };

        let pipe = child.stdin.take();
        let input = self.stdin;
        let feed = async move {
            if let (Some(mut pipe), Some(bytes)) = (pipe, input) {
                pipe.write_all(&bytes).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        // stdin and stdout are drained together so a large payload cannot
        // deadlock on a full pipe
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = match output {
            Ok(output) => output,
            Err(e) => return CommandOutcome::SpawnFailed(e.to_string()),
        };

        if let Err(e) = fed {
            debug!("Writing stdin to {:?} failed: {}", self.program, e);
            return CommandOutcome::Failed {
                code: output.status.code(),
            };
        }

        if output.status.success() {
            CommandOutcome::Success {
                stdout: output.stdout,
            }
        } else {
            CommandOutcome::Failed {
                code: output.status.code(),
            }
        }
    }
}

fn outcome_label(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Success { stdout } => format!("success ({} bytes on stdout)", stdout.len()),
        CommandOutcome::Failed { code } => format!("exit code {:?}", code),
        CommandOutcome::TimedOut => "timed out".to_string(),
        CommandOutcome::SpawnFailed(e) => format!("spawn failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_spawn_failure() {
        let outcome =
            BoundedCommand::new("/nonexistent/img-yasuo-tool", Duration::from_secs(1)).run();
        assert!(matches!(outcome, CommandOutcome::SpawnFailed(_)));
        assert!(!outcome.is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_success_captures_stdout() {
        let outcome = BoundedCommand::new("echo", Duration::from_secs(5))
            .arg("hello")
            .run();
        assert_eq!(
            outcome,
            CommandOutcome::Success {
                stdout: b"hello\n".to_vec()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_is_piped_through() {
        let outcome = BoundedCommand::new("cat", Duration::from_secs(5))
            .stdin(b"jpeg bytes".to_vec())
            .run();
        assert_eq!(
            outcome,
            CommandOutcome::Success {
                stdout: b"jpeg bytes".to_vec()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failure() {
        let outcome = BoundedCommand::new("false", Duration::from_secs(5)).run();
        assert!(matches!(outcome, CommandOutcome::Failed { code: Some(1) }));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_is_reported() {
        let outcome = BoundedCommand::new("sleep", Duration::from_millis(200))
            .arg("5")
            .run();
        assert_eq!(outcome, CommandOutcome::TimedOut);
    }
}
