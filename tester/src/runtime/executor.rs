//! Real cluster command execution
//!
//! Spawns the configured CLI, feeds optional stdin, and collects exit code,
//! stdout and stderr under a hard timeout. A timed-out child is killed.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use shared::{ExecutionResult, KeyValuePair};

use crate::error::{TesterError, TesterResult};
use crate::traits::CommandExecutor;

/// Default bound for a single cluster command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully formed command: program, arguments and optional stdin payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Run `script` through `sh -c`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// True when the arguments contain `needle` as a contiguous run
    pub fn has_args(&self, needle: &[&str]) -> bool {
        needle.is_empty()
            || self
                .args
                .windows(needle.len())
                .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
    }

    pub(crate) fn to_command(&self, envs: &[KeyValuePair]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for pair in envs {
            cmd.env(&pair.key, &pair.value);
        }
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
                write!(f, " '{}'", arg.replace('\'', "'\\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Per-invocation execution options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub timeout: Duration,
    pub fail_on_non_zero: bool,
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Return non-zero exits as data instead of an error
    pub fn allow_non_zero(mut self) -> Self {
        self.fail_on_non_zero = false;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            fail_on_non_zero: true,
        }
    }
}

/// Real executor backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct RealCommandExecutor {
    /// Credentials and feature flags read once at startup
    envs: Vec<KeyValuePair>,
}

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure environment passed to every command (fluent API)
    pub fn with_envs(mut self, envs: Vec<KeyValuePair>) -> Self {
        self.envs = envs;
        self
    }
}

#[async_trait]
impl CommandExecutor for RealCommandExecutor {
    async fn run(&self, command: &CommandLine, options: RunOptions) -> TesterResult<ExecutionResult> {
        let rendered = command.to_string();
        tracing::debug!("⚙️ Executing: {}", rendered);

        let mut cmd = command.to_command(&self.envs);
        cmd.stdin(if command.stdin().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| TesterError::SpawnFailed {
            command: rendered.clone(),
            source,
        })?;

        // Feed stdin from a separate task so a chatty child can't deadlock us
        if let (Some(input), Some(mut pipe)) = (command.stdin(), child.stdin.take()) {
            let input = input.to_owned();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!("stdin write ended early: {}", e);
                }
            });
        }

        // On timeout the output future is dropped together with the child,
        // and kill_on_drop terminates the process.
        let output = match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!("⏰ Command timed out after {:?}: {}", options.timeout, rendered);
                return Err(TesterError::ExecutionTimeout {
                    command: rendered,
                    timeout: options.timeout,
                });
            }
        };

        let result = ExecutionResult {
            command: rendered,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            if options.fail_on_non_zero {
                tracing::warn!(
                    "❌ Command failed with code {}: {}\nstderr: {}",
                    result.exit_code,
                    result.command,
                    result.stderr.trim()
                );
                return Err(TesterError::ExecutionError {
                    command: result.command,
                    exit_code: result.exit_code,
                    stderr: result.stderr,
                });
            }
            tracing::debug!("Command exited with code {} (tolerated): {}", result.exit_code, result.command);
        }

        Ok(result)
    }
}
