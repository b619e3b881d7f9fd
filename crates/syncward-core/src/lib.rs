//! Syncward Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal core shared by every other crate:
//! - **Domain entities** - `Session`, `Trigger`, `RemoteConnection`, `SyncOptions`
//! - **Value types** - `SessionId`, `ClockTime`, `ScheduleDay`
//! - **Port definitions** - Traits for adapters: `ISessionStore`, `ICommandRunner`,
//!   `ILogSink`, `ISyncNotifier`, `INetworkIdentity`, `IClock`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module is pure data and validation. Ports define the trait
//! interfaces that the scheduler depends on and whose implementations live
//! in adapter crates (`syncward-store`, `syncward-audit`) or in the sync crate.

pub mod config;
pub mod domain;
pub mod ports;
