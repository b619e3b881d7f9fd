//! rsync command construction
//!
//! The command line is a pure function of the session and the executor
//! settings, so it can be asserted on without spawning anything.
//!
//! Argument order:
//!
//! ```text
//! rsync <base flags> --exclude=<p>... [--ignore-times] [--delete] [--compress]
//!       [--perms] <extra args> <source>/ <destination>
//! ```

use syncward_core::{config::ExecutorConfig, domain::Session, ports::CommandSpec};

use crate::SyncError;

/// Flags passed to every sync invocation
pub const BASE_FLAGS: [&str; 5] = [
    "--archive",
    "--verbose",
    "--progress",
    "--stats",
    "--human-readable",
];

/// Builds the rsync invocation for `session`
///
/// # Errors
/// Returns [`SyncError::Config`] if the session has no remote connection.
pub fn build_sync_command(
    session: &Session,
    executor: &ExecutorConfig,
) -> Result<CommandSpec, SyncError> {
    let remote = session.remote_connection.as_ref().ok_or_else(|| {
        SyncError::Config(format!("Session '{}' has no remote connection", session.name))
    })?;

    let mut cmd = CommandSpec::new(&executor.rsync_binary);
    for flag in BASE_FLAGS {
        cmd = cmd.arg(flag);
    }

    for pattern in session
        .exclude_patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
    {
        cmd = cmd.arg(format!("--exclude={pattern}"));
    }

    let options = &session.sync_options;
    if !options.update_only {
        cmd = cmd.arg("--ignore-times");
    }
    if options.delete_on_destination {
        cmd = cmd.arg("--delete");
    }
    if options.compress {
        cmd = cmd.arg("--compress");
    }
    if options.preserve_permissions {
        cmd = cmd.arg("--perms");
    }

    for extra in &executor.extra_args {
        cmd = cmd.arg(extra);
    }

    cmd = cmd.arg(source_arg(session)).arg(remote.destination());

    if let Some(password) = remote.secret() {
        cmd = cmd.env(&executor.password_env, password);
    }

    Ok(cmd)
}

/// Source directory with exactly one trailing slash, so rsync copies its contents
fn source_arg(session: &Session) -> String {
    let source = session.source_path.to_string_lossy();
    format!("{}/", source.trim_end_matches('/'))
}
