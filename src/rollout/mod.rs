//! Persisted rollout format
//!
//! A rollout is the ordered event log of one conversation plus its session
//! metadata, written by a recorder and consumed by the resumption engine.
//! On disk it is either JSONL (first line `{"session": ...}`, one event
//! entry per subsequent line) or a single JSON document
//! `{"session": ..., "events": [...]}`.

pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::client::AgentEvent;

/// Metadata describing the recorded session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMeta {
    /// Recorded session ID
    #[serde(default)]
    pub id: String,

    /// When the session started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Working directory the session ran in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Tool that produced the recording
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originator: Option<String>,

    /// Version of that tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_version: Option<String>,

    /// Base instructions the session ran with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl SessionMeta {
    /// Create metadata with just an ID
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            cwd: None,
            originator: None,
            cli_version: None,
            instructions: None,
        }
    }
}

/// One recorded event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RolloutEventEntry {
    /// When the event was recorded; absence is a validation error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// The recorded event envelope
    pub payload: AgentEvent,

    /// Recorder-defined annotations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl RolloutEventEntry {
    /// Create an entry recorded now
    pub fn new(payload: AgentEvent) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            payload,
            metadata: None,
        }
    }

    /// Event type tag of the recorded event
    pub fn kind(&self) -> &str {
        self.payload.kind()
    }
}

/// A complete persisted rollout
///
/// Immutable once parsed; the resumption engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RolloutData {
    /// Session metadata; absence is a validation error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionMeta>,

    /// The ordered event log
    #[serde(default)]
    pub events: Vec<RolloutEventEntry>,
}

impl RolloutData {
    /// Create a rollout from parts
    pub fn new(session: SessionMeta, events: Vec<RolloutEventEntry>) -> Self {
        Self {
            session: Some(session),
            events,
        }
    }

    /// Number of recorded events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Whether any recorded event has the given type tag
    pub fn has_event_kind(&self, kind: &str) -> bool {
        self.events.iter().any(|e| e.kind() == kind)
    }
}
