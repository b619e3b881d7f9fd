//! Pause and resume commands
//!
//! Pausing one session sets its persisted flag. `--all` sets the global
//! pause flag, which is stored next to the session file and leaves every
//! per-session flag untouched. A running daemon picks up either change when
//! it reloads.

use anyhow::Result;
use clap::Args;

use super::{find_session, CliContext};
use crate::output::get_formatter;

/// Which sessions a pause or resume applies to
#[derive(Debug, Args)]
pub struct PauseTarget {
    /// Session id or name
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub session: Option<String>,

    /// Use the global pause flag, leaving per-session flags alone
    #[arg(long)]
    pub all: bool,
}

/// Arguments for `syncward pause`
#[derive(Debug, Args)]
pub struct PauseCommand {
    #[command(flatten)]
    pub target: PauseTarget,
}

/// Arguments for `syncward resume`
#[derive(Debug, Args)]
pub struct ResumeCommand {
    #[command(flatten)]
    pub target: PauseTarget,
}

impl PauseCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        set_paused(ctx, &self.target, true).await
    }
}

impl ResumeCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        set_paused(ctx, &self.target, false).await
    }
}

async fn set_paused(ctx: &CliContext, target: &PauseTarget, paused: bool) -> Result<()> {
    let formatter = get_formatter(ctx.format);
    let controller = ctx.controller().await;
    let verb = if paused { "Paused" } else { "Resumed" };

    let Some(id_or_name) = target.session.as_deref().filter(|_| !target.all) else {
        let changed = controller.is_globally_paused() != paused;
        if paused {
            controller.pause_all().await?;
        } else {
            controller.resume_all().await?;
        }

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "scope": "global",
                "paused": paused,
                "changed": changed,
            }));
        } else if changed {
            formatter.success(&format!("{verb} all sessions"));
        } else {
            let state = if paused { "paused" } else { "running" };
            formatter.info(&format!("Nothing to do; already {state}"));
        }
        return Ok(());
    };

    let session = find_session(&controller, id_or_name)?;
    let changed = session.paused != paused;
    if changed {
        if paused {
            controller.pause_session(&session.id).await?;
        } else {
            controller.resume_session(&session.id).await?;
        }
    }

    if ctx.format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "scope": "session",
            "session": session.name,
            "paused": paused,
            "changed": changed,
        }));
        return Ok(());
    }

    if changed {
        formatter.success(&format!("{verb} '{}'", session.name));
    } else {
        let state = if paused { "paused" } else { "running" };
        formatter.info(&format!("Nothing to do; '{}' is already {state}", session.name));
    }
    if !paused && controller.is_globally_paused() {
        formatter.warn("All sessions are still paused; run 'syncward resume --all'");
    }
    Ok(())
}
