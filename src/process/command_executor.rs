//! CommandExecutor: whitelisted execution of the external tools a release drives
//!
//! - Only `git`, `npm` and `npx` can be spawned
//! - Arguments are passed as a vector, never through a shell
//! - The working directory is validated up front
//! - An optional timeout kills hanging processes
//!
//! ```rust,no_run
//! use cheminfo_tools::process::CommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), cheminfo_tools::process::CommandError> {
//! let executor = CommandExecutor::new(".")?.with_timeout(Duration::from_secs(30));
//! let branch = executor
//!     .run_checked("git", &["rev-parse", "--abbrev-ref", "HEAD"])
//!     .await?;
//! println!("{}", branch);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Commands a release is allowed to spawn
pub const ALLOWED_COMMANDS: &[&str] = &["git", "npm", "npx"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Binary not found, permission denied, ...
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command timeout after {0:?}")]
    Timeout(Duration),

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "a signal".to_string(),
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs whitelisted commands inside a project directory
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    /// Create an executor bound to `working_dir`, which must exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run a command and capture its output. A non-zero exit is not an error
    /// here; see [`CommandExecutor::run_checked`].
    pub async fn run(&self, command: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        log::debug!("$ {}", display_command(command, args));

        let mut child = Command::new(program_name(command));
        child
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.output())
                .await
                .map_err(|_| CommandError::Timeout(timeout))?,
            None => child.output().await,
        }
        .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a command and return its trimmed stdout, failing on a non-zero exit.
    pub async fn run_checked(&self, command: &str, args: &[&str]) -> Result<String, CommandError> {
        let output = self.run(command, args).await?;

        if !output.success() {
            let stderr = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(CommandError::NonZeroExit {
                command: display_command(command, args),
                code: output.code,
                stderr,
            });
        }

        Ok(output.stdout.trim().to_string())
    }
}

/// Command line for logs and errors, with one-time passwords masked
pub fn display_command(command: &str, args: &[&str]) -> String {
    let mut parts = vec![command.to_string()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push("***".to_string());
            mask_next = false;
        } else if *arg == "--otp" {
            parts.push(arg.to_string());
            mask_next = true;
        } else if arg.starts_with("--otp=") {
            parts.push("--otp=***".to_string());
        } else {
            parts.push(arg.to_string());
        }
    }
    parts.join(" ")
}

/// npm and npx are `.cmd` shims on Windows
fn program_name(command: &str) -> String {
    if cfg!(target_os = "windows") && matches!(command, "npm" | "npx") {
        format!("{}.cmd", command)
    } else {
        command.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_command_masks_otp() {
        assert_eq!(
            display_command("npm", &["publish", "--otp=123456"]),
            "npm publish --otp=***"
        );
        assert_eq!(
            display_command("npm", &["publish", "--otp", "123456", "--access", "public"]),
            "npm publish --otp *** --access public"
        );
        assert_eq!(
            display_command("git", &["tag", "-a", "v1.0.0"]),
            "git tag -a v1.0.0"
        );
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let temp_dir = TempDir::new().unwrap();
        let executor = CommandExecutor::new(temp_dir.path()).unwrap();

        let result = executor.run("rm", &["-rf", "/"]).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(_))));

        let result = executor.run_checked("sh", &["-c", "echo hi"]).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(_))));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = CommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(matches!(
            result,
            Err(CommandError::InvalidWorkingDirectory(_))
        ));
    }

    #[test]
    fn test_working_directory_must_be_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("package.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(CommandExecutor::new(&file).is_err());
    }

    #[test]
    fn test_program_name() {
        if cfg!(target_os = "windows") {
            assert_eq!(program_name("npm"), "npm.cmd");
        } else {
            assert_eq!(program_name("npm"), "npm");
        }
        assert_eq!(program_name("git"), "git");
    }

    #[test]
    fn test_non_zero_exit_message() {
        let err = CommandError::NonZeroExit {
            command: "npm publish".to_string(),
            code: Some(1),
            stderr: "E403".to_string(),
        };
        assert_eq!(err.to_string(), "`npm publish` exited with 1: E403");

        let err = CommandError::NonZeroExit {
            command: "git push".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }

    #[test]
    fn test_output_success() {
        let output = CommandOutput {
            code: Some(0),
            stdout: "ok".to_string(),
            stderr: String::new(),
        };
        assert!(output.success());
        assert!(!CommandOutput { code: None, ..output }.success());
    }
}
