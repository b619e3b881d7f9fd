//! Syncward Audit - Durable sync audit trail
//!
//! Provides:
//! - `FileLogSink`: `ILogSink` adapter writing JSON lines to a size-rotated file
//! - `MemoryLogSink`: collects entries in memory (tests, UI previews)
//! - `read_entries`: reads the trail back, newest last, across rotated files

pub mod file;
pub mod memory;

pub use file::{read_entries, FileLogSink, LogSinkError};
pub use memory::MemoryLogSink;
