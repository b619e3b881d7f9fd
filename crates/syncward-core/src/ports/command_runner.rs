//! Command runner port (driven/secondary port)
//!
//! The transfer itself is performed by an external tool run as a subprocess.
//! The core builds a [`CommandSpec`] and hands it to an [`ICommandRunner`];
//! tests inject fake runners so command construction and result handling
//! can be exercised without spawning processes.
//!
//! ## Design Notes
//!
//! - `env` carries variables for that single invocation only (the rsync
//!   password lives here and nowhere else).
//! - [`CommandSpec::display_line`] renders a shell-quoted command line for
//!   logs. It never includes `env`.

use std::fmt;

/// A fully specified external command invocation
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for this invocation
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Returns true if any argument equals `arg`
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Renders the command the way it would be typed in a POSIX shell
    ///
    /// `--flag=value` arguments quote only the value, e.g. `--exclude='*.tmp'`.
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(shell_quote(&self.program));
        for arg in &self.args {
            match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") && is_plain(flag) => {
                    parts.push(format!("{}={}", flag, shell_quote(value)));
                }
                _ => parts.push(shell_quote(arg)),
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env_keys", &env_keys)
            .finish()
    }
}

fn is_plain(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | ','))
}

fn shell_quote(s: &str) -> String {
    if is_plain(s) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Port trait for running external commands
#[async_trait::async_trait]
pub trait ICommandRunner: Send + Sync {
    /// Runs `command` to completion and captures its output
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`], not
    /// as an error. Errors mean the process could not be run at all.
    async fn run(&self, command: &CommandSpec) -> anyhow::Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line_quotes_flag_values() {
        let cmd = CommandSpec::new("rsync")
            .arg("--archive")
            .arg("--exclude=*.tmp")
            .arg("/tmp/my src/")
            .arg("rsync://u@h:873/m/p");
        assert_eq!(
            cmd.display_line(),
            "rsync --archive --exclude='*.tmp' '/tmp/my src/' rsync://u@h:873/m/p"
        );
    }

    #[test]
    fn test_display_line_escapes_single_quotes() {
        let cmd = CommandSpec::new("rsync").arg("it's");
        assert_eq!(cmd.display_line(), r"rsync 'it'\''s'");
    }

    #[test]
    fn test_display_and_debug_hide_env_values() {
        let cmd = CommandSpec::new("rsync").env("RSYNC_PASSWORD", "s3cret");
        assert!(!cmd.display_line().contains("s3cret"));
        let debug = format!("{cmd:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("RSYNC_PASSWORD"));
    }

    #[test]
    fn test_output_success() {
        assert!(CommandOutput::success("ok").is_success());
        assert!(!CommandOutput::failure(10, "refused").is_success());
        let killed = CommandOutput {
            exit_code: None,
            ..Default::default()
        };
        assert!(!killed.is_success());
    }
}
