//! Remote directory listing and module discovery
//!
//! Both operations shell out to rsync in listing mode. Anonymous access is
//! tried first; if that fails for any reason other than a refused
//! connection and the connection carries credentials, the request is
//! repeated with the username in the URL and the password in the
//! environment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use syncward_core::{
    config::ExecutorConfig,
    domain::RemoteConnection,
    ports::{CommandOutput, CommandSpec, ICommandRunner},
};
use tracing::debug;

use crate::{
    classify::{failure_message, FailureKind},
    SyncError,
};

/// One entry of a remote directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    /// Path relative to the module root
    pub path: String,
}

/// A module exported by an rsync daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModule {
    pub name: String,
    pub comment: String,
}

/// Browses rsync daemons
pub struct RemoteBrowser {
    runner: Arc<dyn ICommandRunner>,
    config: ExecutorConfig,
}

impl RemoteBrowser {
    pub fn new(runner: Arc<dyn ICommandRunner>, config: ExecutorConfig) -> Self {
        Self { runner, config }
    }

    /// Lists `path` (relative to the module) on the remote host
    pub async fn list_directory(
        &self,
        connection: &RemoteConnection,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        let path = path.trim_matches('/');
        let stdout = self
            .run_with_fallback(connection, |with_user| {
                let mut url = connection.url_for(path, with_user);
                if !url.ends_with('/') {
                    url.push('/');
                }
                CommandSpec::new(&self.config.rsync_binary)
                    .arg("--list-only")
                    .arg(url)
            })
            .await?;
        Ok(parse_listing(&stdout, path))
    }

    /// Lists the modules exported by the remote daemon
    pub async fn list_modules(
        &self,
        connection: &RemoteConnection,
    ) -> Result<Vec<RemoteModule>, SyncError> {
        let stdout = self
            .run_with_fallback(connection, |with_user| {
                CommandSpec::new(&self.config.rsync_binary).arg(connection.base_url(with_user))
            })
            .await?;
        Ok(parse_modules(&stdout))
    }

    async fn run_with_fallback<F>(
        &self,
        connection: &RemoteConnection,
        build: F,
    ) -> Result<String, SyncError>
    where
        F: Fn(bool) -> CommandSpec,
    {
        let anonymous = self.run(&build(false)).await?;
        if anonymous.is_success() {
            return Ok(anonymous.stdout);
        }

        let kind = FailureKind::classify(&anonymous.stderr);
        let has_credentials = !connection.username.is_empty() || connection.secret().is_some();
        if kind == FailureKind::ConnectionRefused || !has_credentials {
            return Err(listing_error(&anonymous));
        }

        debug!(host = %connection.host, kind = %kind, "Anonymous listing failed, retrying with credentials");
        let mut command = build(true);
        if let Some(password) = connection.secret() {
            command = command.env(&self.config.password_env, password);
        }
        let authenticated = self.run(&command).await?;
        if authenticated.is_success() {
            Ok(authenticated.stdout)
        } else {
            Err(listing_error(&authenticated))
        }
    }

    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, SyncError> {
        debug!(command = %command.display_line(), "Running rsync listing");
        self.runner
            .run(command)
            .await
            .map_err(|e| SyncError::Process {
                kind: FailureKind::Generic,
                message: format!("Failed to run rsync: {e:#}"),
                exit_code: None,
            })
    }
}

fn listing_error(output: &CommandOutput) -> SyncError {
    let kind = FailureKind::classify(&output.stderr);
    SyncError::Process {
        kind,
        message: failure_message(kind, output.exit_code, &output.stderr),
        exit_code: output.exit_code,
    }
}

/// Parses `rsync --list-only` output
///
/// Lines look like `drwxr-xr-x  4,096 2024/01/01 12:00:00 name`; the name
/// is everything after the time column and may contain spaces.
fn parse_listing(stdout: &str, parent: &str) -> Vec<RemoteEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut rest = line.trim_start();
            let mut fields = [""; 4];
            for field in fields.iter_mut() {
                let end = rest.find(char::is_whitespace)?;
                *field = &rest[..end];
                rest = rest[end..].trim_start();
            }
            let name = rest.trim_end();
            if name.is_empty() || name == "." {
                return None;
            }
            let path = if parent.is_empty() {
                name.to_string()
            } else {
                format!("{parent}/{name}")
            };
            Some(RemoteEntry {
                name: name.to_string(),
                is_directory: fields[0].starts_with('d'),
                path,
            })
        })
        .collect()
}

/// Parses the module list printed by `rsync rsync://host:port/`
///
/// Each line is a module name padded with spaces, a tab and the comment.
fn parse_modules(stdout: &str) -> Vec<RemoteModule> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('@'))
        .filter_map(|line| {
            let (name, comment) = line.split_once('\t').unwrap_or((line, ""));
            let name = name.trim();
            (!name.is_empty()).then(|| RemoteModule {
                name: name.to_string(),
                comment: comment.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const LISTING: &str = "\
drwxr-xr-x          4,096 2024/01/01 12:00:00 .
drwxr-xr-x          4,096 2024/01/01 12:00:00 photos
-rw-r--r--         12,345 2024/01/02 08:30:00 notes 2024.txt
";

    #[test]
    fn test_parse_listing() {
        let entries = parse_listing(LISTING, "backups");
        assert_eq!(
            entries,
            vec![
                RemoteEntry {
                    name: "photos".into(),
                    is_directory: true,
                    path: "backups/photos".into(),
                },
                RemoteEntry {
                    name: "notes 2024.txt".into(),
                    is_directory: false,
                    path: "backups/notes 2024.txt".into(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_modules() {
        let out = "backup         \tNightly backups\nmedia          \t\n@RSYNCD: EXIT\n\n";
        assert_eq!(
            parse_modules(out),
            vec![
                RemoteModule {
                    name: "backup".into(),
                    comment: "Nightly backups".into(),
                },
                RemoteModule {
                    name: "media".into(),
                    comment: String::new(),
                },
            ]
        );
    }

    /// Replies in order and records every command
    struct ScriptedRunner {
        replies: Mutex<Vec<CommandOutput>>,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        fn new(mut replies: Vec<CommandOutput>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<CommandSpec> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ICommandRunner for ScriptedRunner {
        async fn run(&self, command: &CommandSpec) -> anyhow::Result<CommandOutput> {
            self.seen.lock().unwrap().push(command.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply"))
        }
    }

    fn connection() -> RemoteConnection {
        RemoteConnection {
            host: "nas".into(),
            username: "u".into(),
            password: Some("pw".into()),
            port: None,
            module_name: "backup".into(),
            remote_path: String::new(),
        }
    }

    #[tokio::test]
    async fn test_anonymous_success_needs_one_call() {
        let runner = ScriptedRunner::new(vec![CommandOutput::success(LISTING)]);
        let browser = RemoteBrowser::new(runner.clone(), ExecutorConfig::default());

        let entries = browser.list_directory(&connection(), "/").await.unwrap();

        assert_eq!(entries.len(), 2);
        let seen = runner.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].args, vec!["--list-only", "rsync://nas:873/backup/"]);
        assert!(seen[0].env.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_authenticated_listing() {
        let runner = ScriptedRunner::new(vec![
            CommandOutput::failure(5, "@ERROR: auth failed on module backup"),
            CommandOutput::success(LISTING),
        ]);
        let browser = RemoteBrowser::new(runner.clone(), ExecutorConfig::default());

        browser.list_directory(&connection(), "photos").await.unwrap();

        let seen = runner.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].args[1], "rsync://u@nas:873/backup/photos/");
        assert_eq!(seen[1].env, vec![("RSYNC_PASSWORD".to_string(), "pw".to_string())]);
    }

    #[tokio::test]
    async fn test_connection_refused_does_not_retry() {
        let runner = ScriptedRunner::new(vec![CommandOutput::failure(
            10,
            "rsync: failed to connect to nas: Connection refused (111)",
        )]);
        let browser = RemoteBrowser::new(runner.clone(), ExecutorConfig::default());

        let err = browser.list_modules(&connection()).await.unwrap_err();

        assert_eq!(err.failure_kind(), Some(FailureKind::ConnectionRefused));
        assert_eq!(runner.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_authenticated_failure_reports_specific_message() {
        let runner = ScriptedRunner::new(vec![
            CommandOutput::failure(5, "@ERROR: auth failed on module backup"),
            CommandOutput::failure(5, "@ERROR: Unknown module 'backup'"),
        ]);
        let browser = RemoteBrowser::new(runner.clone(), ExecutorConfig::default());

        let err = browser.list_modules(&connection()).await.unwrap_err();

        assert_eq!(err.failure_kind(), Some(FailureKind::UnknownModule));
        assert!(err.to_string().starts_with("Unknown module"));
        assert_eq!(runner.seen()[1].args, vec!["rsync://u@nas:873/"]);
    }
}
