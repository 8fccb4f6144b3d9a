//! Core types for the session SDK
//!
//! This module provides the fundamental types used throughout the crate:
//! - `SdkError` / `SdkResult` - Error types
//! - `SignalHub` - Typed listener registry for lifecycle signals

pub mod error;
pub mod events;

pub use error::{SdkError, SdkResult, StreamError};
pub use events::{SignalHub, SubscriberId};
