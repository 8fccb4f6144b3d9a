//! Single-consumer async event buffering
//!
//! This module provides `EventQueue`, the bridge between push-style event
//! delivery (a watcher task draining a client) and pull-style consumption
//! (`next()` / `Stream` iteration).

pub mod event_queue;

pub use event_queue::EventQueue;
