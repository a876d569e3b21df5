//! Common types shared across the UAO coordination crates.
//!
//! This crate holds the fixed-shape records that the coordinator, the tier
//! gateways and the HTTP surface pass between each other: agent handles,
//! priorities, tier names, lifecycle events and the error taxonomy.

pub mod agent;
pub mod error;
pub mod event;
pub mod priority;
pub mod tier;

pub use agent::{Agent, AgentId, AgentStatus};
pub use error::{Result, UaoError};
pub use event::{CoordinationEvent, ReleaseReason};
pub use priority::Priority;
pub use tier::TierId;
