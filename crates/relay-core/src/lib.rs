//! # relay-core
//!
//! Core crate for the market-data relay, providing:
//!
//! - **Outcome** (`outcome`): success/failure wrapper returned by every actor operation
//! - **Errors** (`error`): `DomainError` with stable codes + categories, `RelayError` via thiserror
//! - **Client registry** (`registry`): bookkeeping for backend connection handles
//! - **Activity** (`activity`): operation/error counters and `ActorStatus` snapshots
//! - **Workflow** (`workflow`): plugin → validate → transform executor shared by all actors
//! - **Actor traits** (`actor`): lifecycle + reader/writer DSL
//! - **Types** (`types`): canonical market-data values and enums
//! - **Configuration** (`config`): JSON config deserialization
//! - **Logging** (`logging`): tracing-based structured logging

pub mod activity;
pub mod actor;
pub mod config;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod registry;
pub mod types;
pub mod workflow;

// Re-export the everyday names at crate root.
pub use activity::ActorStatus;
pub use actor::{Actor, MarketDataReader, MarketDataWriter};
pub use error::{DomainError, ErrorCategory, RelayError};
pub use outcome::Outcome;
pub use types::*;
