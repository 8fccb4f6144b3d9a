//! Bounded session pooling
//!
//! `SessionPool` owns up to `max_size` sessions, handing them out for
//! exclusive use and queueing callers FIFO once the pool is saturated.

pub mod session_pool;

pub use session_pool::{PoolStats, SessionPool};
