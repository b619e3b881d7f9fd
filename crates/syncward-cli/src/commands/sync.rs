//! Sync command - Run a session immediately
//!
//! Manual syncs bypass pause flags and the enabled switch. A sync of the same
//! session already in progress is waited for first.

use anyhow::Result;
use clap::Args;
use syncward_core::domain::SyncStatus;

use super::{find_session, CliContext};
use crate::output::get_formatter;

/// Arguments for `syncward sync`
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Session id or name
    pub session: String,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;
        let session = find_session(&controller, &self.session)?;

        if !ctx.format.is_json() {
            formatter.info(&format!(
                "Syncing '{}' to {}...",
                session.name, session.destination_path
            ));
        }

        let outcome = controller.sync_now(&session.id).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&outcome)?);
            return Ok(());
        }

        match (outcome.status, &outcome.warning) {
            (SyncStatus::Warning, Some(warning)) => formatter.warn(warning),
            _ => formatter.success(&format!("Synced '{}'", session.name)),
        }
        if let Some(files) = outcome.stats.files_transferred {
            formatter.info(&format!("Files transferred: {files}"));
        }
        if let Some(total) = &outcome.stats.total_transferred {
            formatter.info(&format!("Transferred size:  {total}"));
        }
        formatter.info(&format!("Invocation:        {}", outcome.invocation_id));
        Ok(())
    }
}
