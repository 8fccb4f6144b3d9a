//! SDK error types

use thiserror::Error;

use crate::resumption::ValidationFinding;

/// Errors that can occur in the session SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// Manager is shutting down and refuses new work
    #[error("Conversation manager is shutting down")]
    ManagerShuttingDown,

    /// Conversation not found
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Conversation limit reached
    #[error("Maximum conversations exceeded: {current} of {limit}")]
    MaxConversationsExceeded {
        /// Configured limit
        limit: usize,
        /// Count at the time of the call
        current: usize,
    },

    /// Unexpected failure from the client builder or a client call
    #[error("Conversation manager error: {message}")]
    Manager {
        /// What the manager was doing when the failure occurred
        message: String,
        /// The underlying failure, when one exists
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rollout validation failed before any session was created
    #[error("Rollout validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationFinding>),

    /// A single event failed to replay
    #[error("Replay failed at event {event_index:?}: {message}")]
    Replay {
        /// Human-readable failure description
        message: String,
        /// Stable failure code
        code: String,
        /// Index of the offending event in the rollout, when known
        event_index: Option<usize>,
        /// Whether replay can continue past this failure
        recoverable: bool,
    },

    /// Replay exceeded its time budget
    #[error("Resumption timed out after {timeout_ms}ms ({events_completed} events replayed)")]
    ResumptionTimeout {
        /// The configured budget
        timeout_ms: u64,
        /// Events fully replayed before the deadline
        events_completed: usize,
    },

    /// A resumption is already in flight on this engine
    #[error("A resumption is already in progress")]
    ResumptionInProgress,

    /// Pool is closed or closing
    #[error("Session pool is closed")]
    PoolClosed,

    /// Failure reported by the external agent runtime
    #[error("Client error: {0}")]
    Client(String),

    /// Persisted rollout could not be parsed
    #[error("Rollout parse error{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    RolloutParse {
        /// What was wrong with the input
        message: String,
        /// 1-based line number for JSONL input
        line: Option<usize>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SdkError {
    /// Create a client error from a message
    pub fn client(msg: impl Into<String>) -> Self {
        SdkError::Client(msg.into())
    }

    /// Create a manager error without an underlying cause
    pub fn manager(msg: impl Into<String>) -> Self {
        SdkError::Manager {
            message: msg.into(),
            source: None,
        }
    }

    /// Wrap an underlying failure in a manager error
    pub fn manager_with(msg: impl Into<String>, source: SdkError) -> Self {
        SdkError::Manager {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a rollout parse error
    pub fn rollout_parse(msg: impl Into<String>, line: Option<usize>) -> Self {
        SdkError::RolloutParse {
            message: msg.into(),
            line,
        }
    }
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

/// Terminal failure of an event stream
///
/// `EventQueue` hands the terminal error back to every subsequent `next()`
/// call, so the type must be cheap to clone; the original client error is
/// flattened to its message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Event stream failed: {0}")]
pub struct StreamError(pub String);

impl StreamError {
    /// Capture any error as a stream failure
    pub fn from_error<E: std::fmt::Display>(err: &E) -> Self {
        StreamError(err.to_string())
    }
}
