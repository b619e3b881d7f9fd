//! Remote command - Browse rsync daemons
//!
//! Lists the modules a daemon exports and the contents of directories inside
//! a module. The connection comes from an existing session or from flags.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use syncward_core::domain::RemoteConnection;
use syncward_sync::control::SyncController;

use super::{find_session, read_password, CliContext};
use crate::output::get_formatter;

/// Remote browsing subcommands
#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    /// List a directory inside the module
    Ls {
        /// Path relative to the module root
        #[arg(default_value = "")]
        path: String,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// List the modules exported by the host
    Modules {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

/// Where to connect
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Reuse the connection of this session (id or name)
    #[arg(long, conflicts_with = "host")]
    pub session: Option<String>,

    /// rsync daemon host
    #[arg(long)]
    pub host: Option<String>,

    /// Module to browse
    #[arg(long, default_value = "")]
    pub module: String,

    /// Username for the rsync daemon
    #[arg(long, default_value = "")]
    pub user: String,

    /// Read the rsync daemon password from the first line of stdin
    ///
    /// Without this flag the password comes from SYNCWARD_PASSWORD, if set.
    #[arg(long, requires = "host")]
    pub password_stdin: bool,

    /// rsync daemon port (default 873)
    #[arg(long)]
    pub port: Option<u16>,
}

impl ConnectionArgs {
    fn resolve(&self, controller: &SyncController, needs_module: bool) -> Result<RemoteConnection> {
        let connection = match (&self.session, &self.host) {
            (Some(id_or_name), _) => {
                let session = find_session(controller, id_or_name)?;
                match session.remote_connection {
                    Some(connection) => connection,
                    None => bail!("Session '{}' has no remote connection", session.name),
                }
            }
            (None, Some(host)) => RemoteConnection {
                host: host.clone(),
                username: self.user.clone(),
                password: read_password(self.password_stdin, std::io::stdin().lock())?,
                port: self.port,
                module_name: self.module.clone(),
                remote_path: String::new(),
            },
            (None, None) => bail!("Pass --session or --host"),
        };

        if needs_module && connection.module_name.trim().is_empty() {
            bail!("A module is required; list them with 'syncward remote modules'");
        }
        Ok(connection)
    }
}

impl RemoteCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let controller = ctx.controller().await;

        match self {
            RemoteCommand::Ls { path, connection } => {
                let connection = connection.resolve(&controller, true)?;
                let entries = controller.list_remote_directory(&connection, path).await?;

                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&entries)?);
                    return Ok(());
                }
                if entries.is_empty() {
                    formatter.info("(empty)");
                }
                for entry in &entries {
                    let marker = if entry.is_directory { "/" } else { "" };
                    formatter.info(&format!("{}{}", entry.name, marker));
                }
            }
            RemoteCommand::Modules { connection } => {
                let connection = connection.resolve(&controller, false)?;
                let modules = controller.list_available_modules(&connection).await?;

                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::to_value(&modules)?);
                    return Ok(());
                }
                if modules.is_empty() {
                    formatter.info(&format!("{} exports no modules", connection.host));
                }
                for module in &modules {
                    if module.comment.is_empty() {
                        formatter.info(&module.name);
                    } else {
                        formatter.info(&format!("{:<20} {}", module.name, module.comment));
                    }
                }
            }
        }
        Ok(())
    }
}
