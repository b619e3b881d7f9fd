//! CLI subcommands
//!
//! Every command works directly on the session file: it builds a
//! [`SyncController`] in-process, operates on it and exits. A running
//! daemon notices the edited file and re-arms its triggers.

pub mod config;
pub mod logs;
pub mod pause;
pub mod remote;
pub mod sessions;
pub mod sync;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use syncward_audit::FileLogSink;
use syncward_core::{
    config::Config,
    domain::Session,
    ports::{ILogSink, SystemClock},
};
use syncward_store::JsonSessionStore;
use syncward_sync::{
    control::{ControllerPorts, SyncController},
    network::SystemNetworkIdentity,
    runner::ProcessRunner,
};
use tracing::{debug, warn};

use crate::output::OutputFormat;

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
}

impl CliContext {
    /// Loads the configuration, falling back to defaults if it is missing
    pub fn config(&self) -> Config {
        let config = Config::load_or_default(&self.config_path);
        debug!(config_path = %self.config_path.display(), "Loaded configuration");
        config
    }

    /// Builds a controller over the configured session file
    ///
    /// The controller is not started, so no triggers are armed; manual syncs
    /// are written to the sync log.
    pub async fn controller(&self) -> SyncController {
        let config = self.config();
        let runner = Arc::new(ProcessRunner::new());

        let max_bytes = config.logging.max_size_mb.saturating_mul(1024 * 1024);
        let log_sink: Option<Arc<dyn ILogSink>> =
            match FileLogSink::open(&config.logging.audit_dir, max_bytes, config.logging.max_files) {
                Ok(sink) => Some(Arc::new(sink)),
                Err(e) => {
                    warn!(error = %e, "Sync log unavailable");
                    None
                }
            };

        let controller = SyncController::new(
            ControllerPorts {
                store: Arc::new(JsonSessionStore::new(&config.sessions.file)),
                runner: runner.clone(),
                network: Arc::new(SystemNetworkIdentity::new(runner)),
                clock: Arc::new(SystemClock),
                notifier: None,
                log_sink,
            },
            &config,
        );
        controller.load_sessions().await;
        controller
    }
}

/// Resolves a session by id or name
pub fn find_session(controller: &SyncController, id_or_name: &str) -> Result<Session> {
    controller
        .find_session(id_or_name)
        .with_context(|| format!("No session with id or name '{id_or_name}'"))
}

/// Environment variable holding the rsync daemon password
pub const PASSWORD_ENV: &str = "SYNCWARD_PASSWORD";

/// Reads the rsync daemon password without taking it from the command line
///
/// With `from_stdin` the first line of `input` is the password; otherwise
/// [`PASSWORD_ENV`] is used when set and not empty.
pub fn read_password(from_stdin: bool, mut input: impl BufRead) -> Result<Option<String>> {
    if !from_stdin {
        return Ok(std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()));
    }
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read the password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("--password-stdin was given but stdin held no password");
    }
    Ok(Some(password.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_password_is_first_stdin_line() {
        let password = read_password(true, Cursor::new("pa ss\r\nnext\n")).unwrap();
        assert_eq!(password.as_deref(), Some("pa ss"));
    }

    #[test]
    fn test_empty_stdin_password_is_rejected() {
        let err = read_password(true, Cursor::new("")).unwrap_err();
        assert!(err.to_string().contains("--password-stdin"));
    }

    #[tokio::test]
    async fn test_controller_reads_configured_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.sessions.file = dir.path().join("sessions.json");
        config.logging.audit_dir = dir.path().join("logs");
        let config_path = dir.path().join("config.yaml");
        config.save(&config_path).unwrap();

        let ctx = CliContext {
            format: OutputFormat::Json,
            config_path,
        };
        let controller = ctx.controller().await;
        let saved = controller
            .save_session(Session::new("docs", dir.path()))
            .await
            .unwrap();
        controller.pause_all().await.unwrap();

        let reopened = ctx.controller().await;
        assert_eq!(find_session(&reopened, "docs").unwrap().id, saved.id);
        assert!(reopened.is_globally_paused());
        assert!(find_session(&reopened, "missing").is_err());
    }
}
