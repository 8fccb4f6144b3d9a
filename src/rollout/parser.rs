//! Rollout parsing
//!
//! Accepts the two on-disk shapes (JSONL and single JSON document) and
//! rejects anything else: empty input, a JSONL first line without a
//! `session` key, any line that is not valid JSON, and any event entry
//! missing `id` or `msg.type`.

use std::path::Path;

use serde_json::Value;

use crate::core::{SdkError, SdkResult};

use super::{RolloutData, RolloutEventEntry, SessionMeta};

impl RolloutData {
    /// Parse a rollout from its serialized form
    pub fn from_str(input: &str) -> SdkResult<Self> {
        if input.trim().is_empty() {
            return Err(SdkError::rollout_parse("empty rollout", None));
        }

        // A single JSON document covers both the {session, events} form and
        // a one-line JSONL file (header only, no events).
        if let Ok(value) = serde_json::from_str::<Value>(input) {
            return Self::from_document(value);
        }

        Self::from_jsonl(input)
    }

    /// Read and parse a rollout file
    pub fn from_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Serialize back to the JSONL shape the recorder writes
    pub fn to_jsonl(&self) -> SdkResult<String> {
        let mut lines = Vec::with_capacity(self.events.len() + 1);
        lines.push(serde_json::to_string(&serde_json::json!({
            "session": self.session
        }))?);
        for event in &self.events {
            lines.push(serde_json::to_string(event)?);
        }
        Ok(lines.join("\n"))
    }

    fn from_document(value: Value) -> SdkResult<Self> {
        let Value::Object(map) = &value else {
            return Err(SdkError::rollout_parse(
                "rollout must be a JSON object or JSONL lines",
                None,
            ));
        };
        if !map.contains_key("session") {
            return Err(SdkError::rollout_parse("missing session key", Some(1)));
        }

        serde_json::from_value(value)
            .map_err(|err| SdkError::rollout_parse(err.to_string(), None))
    }

    fn from_jsonl(input: &str) -> SdkResult<Self> {
        let mut session: Option<SessionMeta> = None;
        let mut events = Vec::new();
        let mut saw_header = false;

        for (idx, line) in input.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line)
                .map_err(|err| SdkError::rollout_parse(err.to_string(), Some(line_no)))?;

            if !saw_header {
                let Some(session_value) = value.get("session") else {
                    return Err(SdkError::rollout_parse(
                        "first line missing session key",
                        Some(line_no),
                    ));
                };
                session = Some(
                    serde_json::from_value(session_value.clone())
                        .map_err(|err| SdkError::rollout_parse(err.to_string(), Some(line_no)))?,
                );
                saw_header = true;
                continue;
            }

            let entry: RolloutEventEntry = serde_json::from_value(value)
                .map_err(|err| SdkError::rollout_parse(err.to_string(), Some(line_no)))?;
            events.push(entry);
        }

        if !saw_header {
            return Err(SdkError::rollout_parse("empty rollout", None));
        }

        Ok(RolloutData { session, events })
    }
}
