//! rsync failure classification
//!
//! rsync reports most failures as free text on stderr. The patterns below
//! pick out the cases a user can act on and turn them into messages that
//! say what to check; everything else falls back to the raw output.

use serde::Serialize;

/// Exit code rsync uses when source files vanished during the transfer
pub const RSYNC_EXIT_VANISHED: i32 = 24;

/// Classified cause of a failed rsync invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionDenied,
    PathNotFound,
    ConnectionRefused,
    HostVerificationFailed,
    AuthenticationFailed,
    UnknownModule,
    Generic,
}

/// Patterns in match order; the first hit wins
const PATTERNS: &[(&str, FailureKind)] = &[
    ("connection refused", FailureKind::ConnectionRefused),
    ("host key verification failed", FailureKind::HostVerificationFailed),
    ("auth failed", FailureKind::AuthenticationFailed),
    ("unknown module", FailureKind::UnknownModule),
    ("permission denied", FailureKind::PermissionDenied),
    ("no such file or directory", FailureKind::PathNotFound),
];

impl FailureKind {
    /// Classifies rsync's stderr (case-insensitive)
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        PATTERNS
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(FailureKind::Generic)
    }

    /// Message shown to the user, `None` for [`FailureKind::Generic`]
    pub fn user_message(&self) -> Option<&'static str> {
        let msg = match self {
            FailureKind::PermissionDenied => {
                "Permission denied: check access rights on the source and the remote module"
            }
            FailureKind::PathNotFound => {
                "Path not found: the source or the remote path does not exist"
            }
            FailureKind::ConnectionRefused => {
                "Connection refused: the rsync daemon is not reachable on the remote host"
            }
            FailureKind::HostVerificationFailed => {
                "Host key verification failed: the remote host could not be verified"
            }
            FailureKind::AuthenticationFailed => {
                "Authentication failed: check the username and password for the module"
            }
            FailureKind::UnknownModule => {
                "Unknown module: the module does not exist on the remote host"
            }
            FailureKind::Generic => return None,
        };
        Some(msg)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::PathNotFound => "path_not_found",
            FailureKind::ConnectionRefused => "connection_refused",
            FailureKind::HostVerificationFailed => "host_verification_failed",
            FailureKind::AuthenticationFailed => "authentication_failed",
            FailureKind::UnknownModule => "unknown_module",
            FailureKind::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Builds the user-facing message for a failed invocation
pub fn failure_message(kind: FailureKind, exit_code: Option<i32>, stderr: &str) -> String {
    if let Some(msg) = kind.user_message() {
        return msg.to_string();
    }

    let detail = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last();

    match (exit_code, detail) {
        (Some(code), Some(detail)) => format!("rsync failed with exit code {code}: {detail}"),
        (Some(code), None) => format!("rsync failed with exit code {code}"),
        (None, Some(detail)) => format!("rsync was terminated: {detail}"),
        (None, None) => "rsync was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_patterns() {
        let cases = [
            ("rsync: failed to connect to h (10.0.0.2): Connection refused (111)", FailureKind::ConnectionRefused),
            ("Host key verification failed.", FailureKind::HostVerificationFailed),
            ("@ERROR: auth failed on module backup", FailureKind::AuthenticationFailed),
            ("@ERROR: Unknown module 'bakup'", FailureKind::UnknownModule),
            ("rsync: opendir \"/src/x\" failed: Permission denied (13)", FailureKind::PermissionDenied),
            ("rsync: change_dir \"/nope\" failed: No such file or directory (2)", FailureKind::PathNotFound),
            ("rsync error: some other problem (code 12)", FailureKind::Generic),
        ];
        for (stderr, expected) in cases {
            assert_eq!(FailureKind::classify(stderr), expected, "stderr: {stderr}");
        }
    }

    #[test]
    fn test_auth_failure_wins_over_later_patterns() {
        let stderr = "@ERROR: auth failed on module m\nrsync: Permission denied";
        assert_eq!(FailureKind::classify(stderr), FailureKind::AuthenticationFailed);
    }

    #[test]
    fn test_classified_message() {
        let msg = failure_message(FailureKind::ConnectionRefused, Some(10), "whatever");
        assert!(msg.starts_with("Connection refused"));
    }

    #[test]
    fn test_generic_message_uses_last_stderr_line() {
        let msg = failure_message(
            FailureKind::Generic,
            Some(12),
            "rsync: write failed\nrsync error: error in rsync protocol data stream (code 12)\n\n",
        );
        assert_eq!(
            msg,
            "rsync failed with exit code 12: rsync error: error in rsync protocol data stream (code 12)"
        );
        assert_eq!(
            failure_message(FailureKind::Generic, None, ""),
            "rsync was terminated by a signal"
        );
    }
}
