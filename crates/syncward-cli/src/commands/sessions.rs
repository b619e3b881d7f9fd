//! Sessions command - Manage sync sessions
//!
//! Provides the `syncward sessions` CLI command which:
//! 1. Lists and shows sessions with their triggers and last outcome
//! 2. Adds sessions built from command-line flags
//! 3. Removes, enables and disables existing sessions

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use syncward_core::domain::{
    ClockTime, FileChangeTrigger, IntervalTrigger, RemoteConnection, ScheduleDay,
    ScheduleTrigger, Session, StartupTrigger, Trigger, WifiTrigger,
};
use tracing::info;

use super::{find_session, read_password, CliContext};
use crate::output::get_formatter;

/// Session management subcommands
#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// List all sessions
    List,
    /// Show one session in detail
    Show {
        /// Session id or name
        session: String,
    },
    /// Add a new session
    Add(AddSessionArgs),
    /// Remove a session
    Remove {
        /// Session id or name
        session: String,
    },
    /// Enable a session's triggers
    Enable {
        /// Session id or name
        session: String,
    },
    /// Disable a session's triggers (manual syncs still work)
    Disable {
        /// Session id or name
        session: String,
    },
}

/// Flags describing a new session
#[derive(Debug, Args)]
pub struct AddSessionArgs {
    /// Display name of the session
    pub name: String,

    /// Local directory to synchronize
    #[arg(long)]
    pub source: PathBuf,

    /// rsync daemon host
    #[arg(long)]
    pub host: String,

    /// rsync module on the host
    #[arg(long)]
    pub module: String,

    /// Username for the rsync daemon
    #[arg(long, default_value = "")]
    pub user: String,

    /// Read the rsync daemon password from the first line of stdin
    ///
    /// Without this flag the password comes from SYNCWARD_PASSWORD, if set.
    #[arg(long)]
    pub password_stdin: bool,

    /// rsync daemon port (default 873)
    #[arg(long)]
    pub port: Option<u16>,

    /// Path inside the module
    #[arg(long, default_value = "")]
    pub remote_path: String,

    /// Exclude pattern (repeatable)
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,

    /// Delete files on the destination that are gone from the source
    #[arg(long)]
    pub delete: bool,

    /// Compress data during transfer
    #[arg(long)]
    pub compress: bool,

    /// Preserve permissions
    #[arg(long)]
    pub perms: bool,

    /// Transfer every file instead of only missing or newer ones
    #[arg(long)]
    pub ignore_times: bool,

    /// Sync every N minutes
    #[arg(long, value_name = "MINUTES")]
    pub every: Option<u32>,

    /// Active window for --every, e.g. 09:00-17:00
    #[arg(long, value_name = "START-END", requires = "every")]
    pub window: Option<String>,

    /// Sync at a fixed time of day, e.g. 14:30
    #[arg(long, value_name = "HH:MM")]
    pub at: Option<ClockTime>,

    /// Days for --at, comma separated (default: daily)
    #[arg(long, value_delimiter = ',', requires = "at")]
    pub days: Vec<ScheduleDay>,

    /// Sync when files under the source change
    #[arg(long)]
    pub watch: bool,

    /// Quiet period for --watch in milliseconds
    #[arg(long, default_value = "2000", requires = "watch")]
    pub debounce_ms: u64,

    /// Sync when joining this WiFi network
    #[arg(long, value_name = "SSID")]
    pub on_wifi: Option<String>,

    /// Sync when leaving this WiFi network
    #[arg(long, value_name = "SSID")]
    pub off_wifi: Option<String>,

    /// Sync once when the scheduler starts, after this delay in milliseconds
    #[arg(long, value_name = "DELAY_MS")]
    pub on_startup: Option<u64>,
}

impl AddSessionArgs {
    /// Builds the session described by the flags
    fn to_session(&self, password: Option<String>) -> Result<Session> {
        let source = if self.source.is_absolute() {
            self.source.clone()
        } else {
            std::env::current_dir()
                .context("Failed to resolve the current directory")?
                .join(&self.source)
        };

        let mut session = Session::new(self.name.trim(), source.clone()).with_remote(RemoteConnection {
            host: self.host.clone(),
            username: self.user.clone(),
            password,
            port: self.port,
            module_name: self.module.clone(),
            remote_path: self.remote_path.clone(),
        });
        session.exclude_patterns = self.excludes.clone();
        session.sync_options.update_only = !self.ignore_times;
        session.sync_options.delete_on_destination = self.delete;
        session.sync_options.compress = self.compress;
        session.sync_options.preserve_permissions = self.perms;

        if let Some(minutes) = self.every {
            let window = self.window.as_deref().map(parse_window).transpose()?;
            session.triggers.push(Trigger::Interval(IntervalTrigger {
                interval_minutes: minutes,
                start_time: window.map(|(start, _)| start),
                end_time: window.map(|(_, end)| end),
            }));
        }
        if let Some(time) = self.at {
            let days = if self.days.is_empty() {
                vec![ScheduleDay::Daily]
            } else {
                self.days.clone()
            };
            session
                .triggers
                .push(Trigger::Schedule(ScheduleTrigger { time, days }));
        }
        if self.watch {
            session.triggers.push(Trigger::FileChange(FileChangeTrigger {
                watch_paths: vec![source],
                recursive: true,
                debounce_ms: self.debounce_ms,
                ignore_patterns: self.excludes.clone(),
            }));
        }
        if let Some(ssid) = &self.on_wifi {
            session.triggers.push(Trigger::Wifi(WifiTrigger {
                ssid: ssid.clone(),
                on_connect: true,
            }));
        }
        if let Some(ssid) = &self.off_wifi {
            session.triggers.push(Trigger::Wifi(WifiTrigger {
                ssid: ssid.clone(),
                on_connect: false,
            }));
        }
        if let Some(delay_ms) = self.on_startup {
            session
                .triggers
                .push(Trigger::Startup(StartupTrigger { delay_ms }));
        }

        Ok(session)
    }
}

/// Parses `HH:MM-HH:MM`
fn parse_window(value: &str) -> Result<(ClockTime, ClockTime)> {
    let Some((start, end)) = value.split_once('-') else {
        bail!("Expected a window like 09:00-17:00, got '{value}'");
    };
    let start: ClockTime = start.trim().parse().context("Invalid window start")?;
    let end: ClockTime = end.trim().parse().context("Invalid window end")?;
    Ok((start, end))
}

/// One-line description of a trigger
fn describe_trigger(trigger: &Trigger) -> String {
    match trigger {
        Trigger::Schedule(t) => {
            let days: Vec<String> = t.days.iter().map(ToString::to_string).collect();
            format!("at {} on {}", t.time, days.join(", "))
        }
        Trigger::Interval(t) => match t.active_window() {
            Some((start, end)) => {
                format!("every {} min between {} and {}", t.interval_minutes, start, end)
            }
            None => format!("every {} min", t.interval_minutes),
        },
        Trigger::FileChange(t) => {
            let paths: Vec<String> = t.watch_paths.iter().map(|p| p.display().to_string()).collect();
            format!("on changes in {} ({} ms debounce)", paths.join(", "), t.debounce_ms)
        }
        Trigger::Wifi(t) if t.on_connect => format!("on joining WiFi '{}'", t.ssid),
        Trigger::Wifi(t) => format!("on leaving WiFi '{}'", t.ssid),
        Trigger::Startup(t) if t.delay_ms == 0 => "at startup".to_string(),
        Trigger::Startup(t) => format!("at startup after {} ms", t.delay_ms),
    }
}

fn state_label(session: &Session) -> &'static str {
    match (session.enabled, session.paused) {
        (false, _) => "disabled",
        (true, true) => "paused",
        (true, false) => "active",
    }
}

impl SessionsCommand {
    /// Execute the sessions command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            SessionsCommand::List => self.execute_list(ctx).await,
            SessionsCommand::Show { session } => self.execute_show(ctx, session).await,
            SessionsCommand::Add(args) => self.execute_add(ctx, args).await,
            SessionsCommand::Remove { session } => self.execute_remove(ctx, session).await,
            SessionsCommand::Enable { session } => self.execute_set_enabled(ctx, session, true).await,
            SessionsCommand::Disable { session } => {
                self.execute_set_enabled(ctx, session, false).await
            }
        }
    }

    async fn execute_list(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let sessions = ctx.controller().await.sessions();

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&sessions)?);
            return Ok(());
        }

        if sessions.is_empty() {
            formatter.info("No sessions configured. Add one with 'syncward sessions add'.");
            return Ok(());
        }

        formatter.success(&format!("{} session(s)", sessions.len()));
        for session in &sessions {
            formatter.info("");
            formatter.info(&format!("{} [{}]", session.name, state_label(session)));
            formatter.info(&format!("  id:          {}", session.id));
            formatter.info(&format!("  source:      {}", session.source_path.display()));
            formatter.info(&format!("  destination: {}", session.destination_path));
            formatter.info(&format!("  last sync:   {}", last_sync_line(session)));
        }
        Ok(())
    }

    async fn execute_show(&self, ctx: &CliContext, id_or_name: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;
        let session = find_session(&controller, id_or_name)?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&session)?);
            return Ok(());
        }

        formatter.success(&format!("{} [{}]", session.name, state_label(&session)));
        formatter.info(&format!("Id:          {}", session.id));
        formatter.info(&format!("Source:      {}", session.source_path.display()));
        formatter.info(&format!("Destination: {}", session.destination_path));
        formatter.info(&format!("Last sync:   {}", last_sync_line(&session)));

        let options = &session.sync_options;
        formatter.info(&format!(
            "Options:     update-only={} delete={} compress={} perms={}",
            options.update_only,
            options.delete_on_destination,
            options.compress,
            options.preserve_permissions
        ));
        if !session.exclude_patterns.is_empty() {
            formatter.info(&format!("Excludes:    {}", session.exclude_patterns.join(", ")));
        }

        formatter.info("");
        if session.triggers.is_empty() {
            formatter.info("No triggers (manual sync only)");
        } else {
            formatter.info("Triggers:");
            for trigger in &session.triggers {
                formatter.info(&format!("  - {}", describe_trigger(trigger)));
            }
        }
        Ok(())
    }

    async fn execute_add(&self, ctx: &CliContext, args: &AddSessionArgs) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;

        if controller.find_session(args.name.trim()).is_some() {
            bail!("A session named '{}' already exists", args.name.trim());
        }

        let password = read_password(args.password_stdin, std::io::stdin().lock())?;
        let session = controller.save_session(args.to_session(password)?).await?;
        info!(session_id = %session.id, name = %session.name, "Session added");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&session)?);
        } else {
            formatter.success(&format!("Added session '{}'", session.name));
            formatter.info(&format!("Id:          {}", session.id));
            formatter.info(&format!("Destination: {}", session.destination_path));
            if session.triggers.is_empty() {
                formatter.info("No triggers configured; use 'syncward sync' to run it manually");
            }
        }
        Ok(())
    }

    async fn execute_remove(&self, ctx: &CliContext, id_or_name: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;
        let session = find_session(&controller, id_or_name)?;

        let removed = controller.delete_session(&session.id).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "removed": removed.id,
                "name": removed.name,
            }));
        } else {
            formatter.success(&format!("Removed session '{}'", removed.name));
        }
        Ok(())
    }

    async fn execute_set_enabled(&self, ctx: &CliContext, id_or_name: &str, enabled: bool) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;
        let mut session = find_session(&controller, id_or_name)?;

        session.enabled = enabled;
        let session = controller.save_session(session).await?;
        let verb = if enabled { "Enabled" } else { "Disabled" };

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "session": session.id,
                "enabled": session.enabled,
            }));
        } else {
            formatter.success(&format!("{verb} session '{}'", session.name));
        }
        Ok(())
    }
}

fn last_sync_line(session: &Session) -> String {
    match (&session.last_sync, &session.last_sync_error) {
        (None, _) => "never".to_string(),
        (Some(at), None) => format!("{} ({})", at.format("%Y-%m-%d %H:%M:%S UTC"), session.last_sync_status),
        (Some(at), Some(err)) => format!(
            "{} ({}: {})",
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            session.last_sync_status,
            err
        ),
    }
}
