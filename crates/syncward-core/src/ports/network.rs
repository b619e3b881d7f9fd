//! Network identity port (driven/secondary port)
//!
//! Detecting the current wireless network is platform specific (NetworkManager,
//! wireless-tools, macOS `networksetup`). The scheduler only needs to know
//! whether the identity changed, so the mechanism sits behind this trait.

/// Port trait for sampling the current network identity
#[async_trait::async_trait]
pub trait INetworkIdentity: Send + Sync {
    /// Returns the SSID of the currently joined wireless network
    ///
    /// `None` means not connected to a wireless network or that the identity
    /// could not be determined. Implementations must not fail.
    async fn current(&self) -> Option<String>;
}
