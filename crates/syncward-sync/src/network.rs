//! System network identity detection
//!
//! Linux: NetworkManager (`nmcli`) first, then wireless-tools (`iwgetid`).
//! macOS: `networksetup` on the first Wi-Fi interface.
//!
//! The tools are run through the [`ICommandRunner`] port; any failure means
//! "no identity".

use std::sync::Arc;

use syncward_core::ports::{CommandSpec, ICommandRunner, INetworkIdentity};
use tracing::trace;

/// [`INetworkIdentity`] backed by platform tools
pub struct SystemNetworkIdentity {
    runner: Arc<dyn ICommandRunner>,
}

impl SystemNetworkIdentity {
    pub fn new(runner: Arc<dyn ICommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, command: CommandSpec) -> Option<String> {
        match self.runner.run(&command).await {
            Ok(output) if output.is_success() => Some(output.stdout),
            Ok(output) => {
                trace!(program = %command.program, exit_code = ?output.exit_code, "Network lookup failed");
                None
            }
            Err(e) => {
                trace!(program = %command.program, error = %e, "Network lookup unavailable");
                None
            }
        }
    }

    async fn detect_linux(&self) -> Option<String> {
        let nmcli = CommandSpec::new("nmcli")
            .arg("-t")
            .arg("-f")
            .arg("active,ssid")
            .arg("dev")
            .arg("wifi");
        if let Some(ssid) = self.run(nmcli).await.and_then(|out| parse_nmcli(&out)) {
            return Some(ssid);
        }

        let iwgetid = CommandSpec::new("iwgetid").arg("-r");
        self.run(iwgetid).await.and_then(|out| non_empty(out.trim()))
    }

    async fn detect_macos(&self) -> Option<String> {
        let cmd = CommandSpec::new("networksetup")
            .arg("-getairportnetwork")
            .arg("en0");
        self.run(cmd).await.and_then(|out| parse_networksetup(&out))
    }
}

#[async_trait::async_trait]
impl INetworkIdentity for SystemNetworkIdentity {
    async fn current(&self) -> Option<String> {
        if cfg!(target_os = "macos") {
            self.detect_macos().await
        } else {
            self.detect_linux().await
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Parses `nmcli -t -f active,ssid dev wifi`, e.g. `yes:HomeNet`
///
/// nmcli escapes `:` inside the SSID as `\:`.
fn parse_nmcli(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let ssid = line.strip_prefix("yes:")?;
        non_empty(&ssid.replace("\\:", ":"))
    })
}

/// Parses `networksetup -getairportnetwork`, e.g. `Current Wi-Fi Network: HomeNet`
fn parse_networksetup(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, ssid) = line.split_once("Network: ")?;
        non_empty(ssid.trim())
    })
}
