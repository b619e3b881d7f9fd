//! Session store port (driven/secondary port)
//!
//! Sessions are persisted as one flat collection. The scheduler keeps a
//! working copy and writes the whole collection back after every mutation
//! it makes (pause flags, last-sync outcome). The global pause flag is
//! stored separately so pausing everything leaves each session's own flag
//! untouched.

use crate::domain::Session;

/// Port trait for loading and saving the session collection
#[async_trait::async_trait]
pub trait ISessionStore: Send + Sync {
    /// Loads every stored session
    ///
    /// Returns an empty collection when nothing is stored yet or when the
    /// stored data cannot be read. Never fails.
    async fn load(&self) -> Vec<Session>;

    /// Replaces the stored collection with `sessions`
    async fn save(&self, sessions: &[Session]) -> anyhow::Result<()>;

    /// Loads the global pause flag; `false` when none is stored or it
    /// cannot be read
    async fn load_paused(&self) -> bool;

    /// Persists the global pause flag next to the collection
    async fn save_paused(&self, paused: bool) -> anyhow::Result<()>;
}
