//! Logs command - View the sync log
//!
//! Provides the `syncward logs` CLI command which:
//! 1. Reads entries from the sync log directory, oldest file first
//! 2. Filters them by session, minimum level, time and invocation
//! 3. Shows the most recent entries up to a limit

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, ValueEnum};
use syncward_audit::read_entries;
use syncward_core::ports::{LogEntry, LogLevel};
use tracing::info;
use uuid::Uuid;

use super::{find_session, CliContext};
use crate::output::get_formatter;

/// Minimum level shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for LogLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
        }
    }
}

/// Log command with filter arguments
#[derive(Debug, Args)]
pub struct LogsCommand {
    /// Only entries of this session (id or name)
    #[arg(long)]
    pub session: Option<String>,

    /// Minimum level to show
    #[arg(long, value_enum, default_value = "info")]
    pub level: LevelArg,

    /// Show entries since this time (e.g., "1h", "2d", "2024-01-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Only entries of one sync invocation
    #[arg(long)]
    pub invocation: Option<Uuid>,

    /// Maximum number of entries to show
    #[arg(long, default_value = "50")]
    pub limit: usize,
}

impl LogsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.config();

        let session_id = match &self.session {
            Some(id_or_name) => {
                let controller = ctx.controller().await;
                Some(find_session(&controller, id_or_name)?.id)
            }
            None => None,
        };
        let since = self
            .since
            .as_deref()
            .map(|s| {
                parse_since(s).with_context(|| {
                    format!("Invalid --since value: '{s}'. Expected formats: '1h', '30m', '2d', '1w', '2024-01-01'")
                })
            })
            .transpose()?;
        let min_level = LogLevel::from(self.level);

        let entries = read_entries(&config.logging.audit_dir);
        info!(count = entries.len(), dir = %config.logging.audit_dir.display(), "Read sync log");

        let filtered: Vec<LogEntry> = entries
            .into_iter()
            .filter(|e| e.level >= min_level)
            .filter(|e| session_id.is_none() || e.session_id == session_id)
            .filter(|e| self.invocation.is_none() || e.invocation_id == self.invocation)
            .filter(|e| since.map_or(true, |since| e.timestamp >= since))
            .collect();
        let skip = filtered.len().saturating_sub(self.limit);
        let shown = &filtered[skip..];

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "count": shown.len(),
                "total": filtered.len(),
                "entries": shown,
            }));
            return Ok(());
        }

        if shown.is_empty() {
            formatter.info("No log entries found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!("Sync log ({} entries)", shown.len()));
        formatter.info("");
        for entry in shown {
            formatter.info(&format_entry(entry));
        }

        if skip > 0 {
            formatter.info("");
            formatter.info(&format!(
                "Showing the last {} of {} entries. Use --limit to show more.",
                shown.len(),
                filtered.len()
            ));
        }
        Ok(())
    }
}

fn format_entry(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let name = entry.session_name.as_deref().unwrap_or("-");
    let mut line = format!(
        "{} {:<5} {:<16} {}",
        timestamp,
        entry.level.to_string(),
        truncate_string(name, 16),
        entry.message
    );
    if let Some(detail) = entry.details.get("stderr").and_then(|v| v.as_str()) {
        let detail = detail.trim();
        if !detail.is_empty() {
            line.push_str(&format!(" ({})", truncate_string(detail, 60)));
        }
    }
    line
}

/// Parse the --since argument into a DateTime<Utc>
///
/// Supports:
/// - Relative: "1h" (1 hour ago), "30m" (30 minutes), "2d" (2 days), "1w" (1 week)
/// - Absolute date: "2024-01-01"
/// - Absolute datetime: "2024-01-01T12:00:00"
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!("Could not parse '{}' as a time", input)
}

/// Parse relative duration strings like "1h", "30m", "2d", "1w"
fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

fn truncate_string(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_relative_duration() {
        assert_eq!(parse_relative_duration("30m"), Some(chrono::Duration::minutes(30)));
        assert_eq!(parse_relative_duration("2d"), Some(chrono::Duration::days(2)));
        assert_eq!(parse_relative_duration("h"), None);
        assert_eq!(parse_relative_duration("5y"), None);
    }

    #[test]
    fn test_parse_since_absolute_date() {
        let parsed = parse_since("2024-03-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a-rather-long-name", 8), "a-rat...");
    }

    #[test]
    fn test_format_entry_appends_stderr() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Error,
            session_id: None,
            session_name: Some("documents".into()),
            invocation_id: None,
            message: "Sync failed".into(),
            details: json!({ "stderr": "auth failed on module backup\n" }),
        };

        let line = format_entry(&entry);

        assert!(line.contains("error"));
        assert!(line.contains("documents"));
        assert!(line.ends_with("Sync failed (auth failed on module backup)"));
    }
}
