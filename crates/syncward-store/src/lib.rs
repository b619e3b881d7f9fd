//! Syncward Store - Session persistence
//!
//! Provides:
//! - `JsonSessionStore`: `ISessionStore` adapter persisting the session
//!   collection as a flat JSON array with temp-file-and-rename writes
//! - `MemorySessionStore`: in-process store for tests and dry runs

pub mod json;
pub mod memory;

pub use json::JsonSessionStore;
pub use memory::MemorySessionStore;
