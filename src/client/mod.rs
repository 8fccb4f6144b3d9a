//! External agent runtime client contract
//!
//! The runtime itself (model execution, sandboxing, approvals) lives behind
//! the narrow `AgentClient` interface; this crate never reimplements it.
//! `ClientBuilder` is the factory seam the pool, manager and resumption
//! engine use to construct sessions from a merged `ClientConfig`.

pub mod config;
pub mod event;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use event::{AgentEvent, EventMsg, Submission};
pub use provider::{AgentClient, ClientBuilder, EventStream, SharedClient};
