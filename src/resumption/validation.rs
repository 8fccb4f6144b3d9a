//! Rollout validation
//!
//! Validation runs before any session is created: a rollout that fails
//! with error-severity findings never touches the runtime. Warnings are
//! reported but do not block resumption.

use serde::{Deserialize, Serialize};

use crate::rollout::RolloutData;

/// Fixed per-event replay estimate; the original recording's wall-clock
/// gaps are deliberately ignored.
pub(crate) const REPLAY_TIME_PER_EVENT_MS: u64 = 50;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks resumption
    Error,
    /// Reported, does not block
    Warning,
}

/// One finding produced by a validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Stable finding code (e.g. "MISSING_SESSION_ID")
    pub code: String,

    /// Human-readable description
    pub message: String,

    /// Whether the finding blocks resumption
    pub severity: Severity,

    /// Index of the offending event, when the finding is event-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_index: Option<usize>,
}

impl ValidationFinding {
    /// Create an error-severity finding
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: Severity::Error,
            event_index: None,
        }
    }

    /// Create a warning-severity finding
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: Severity::Warning,
            event_index: None,
        }
    }

    /// Attach the offending event index
    pub fn with_event_index(mut self, index: usize) -> Self {
        self.event_index = Some(index);
        self
    }
}

impl std::fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.event_index {
            Some(index) => write!(f, "[{}] {} (event {})", self.code, self.message, index),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Outcome of validating one rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when no error-severity findings exist
    pub is_valid: bool,

    /// Error-severity findings
    pub errors: Vec<ValidationFinding>,

    /// Warning-severity findings
    pub warnings: Vec<ValidationFinding>,

    /// Number of events in the rollout
    pub event_count: usize,

    /// Recorded session ID, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Rough replay budget estimate derived from the event count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_replay_time_ms: Option<u64>,
}

/// Caller-supplied validation rule
///
/// A rule inspects the rollout and returns findings. A rule that fails
/// outright is caught and downgraded to a `VALIDATION_RULE_ERROR` warning
/// rather than aborting validation.
pub type ValidationRule = Box<dyn Fn(&RolloutData) -> anyhow::Result<Vec<ValidationFinding>> + Send + Sync>;

/// Run the built-in rules, then the custom rules, over a rollout
pub fn validate_rollout(data: &RolloutData, custom_rules: &[ValidationRule]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match &data.session {
        None => errors.push(ValidationFinding::error(
            "MISSING_SESSION",
            "rollout has no session metadata",
        )),
        Some(meta) if meta.id.is_empty() => errors.push(ValidationFinding::error(
            "MISSING_SESSION_ID",
            "session metadata has no id",
        )),
        Some(_) => {}
    }

    // The event log is typed and ordered by construction, so the
    // ordered-sequence rule (INVALID_EVENTS) cannot fire on parsed data;
    // the per-event checks below cover what remains.
    for (index, event) in data.events.iter().enumerate() {
        if event.timestamp.is_none() {
            errors.push(
                ValidationFinding::error(
                    "MISSING_EVENT_TIMESTAMP",
                    format!("event {index} has no timestamp"),
                )
                .with_event_index(index),
            );
        }
    }

    if !data.has_event_kind("session_created") {
        warnings.push(ValidationFinding::warning(
            "MISSING_SESSION_CREATED",
            "rollout has no session_created event",
        ));
    }

    for rule in custom_rules {
        match rule(data) {
            Ok(findings) => {
                for finding in findings {
                    match finding.severity {
                        Severity::Error => errors.push(finding),
                        Severity::Warning => warnings.push(finding),
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "custom validation rule failed");
                warnings.push(ValidationFinding::warning(
                    "VALIDATION_RULE_ERROR",
                    format!("validation rule failed: {err}"),
                ));
            }
        }
    }

    let session_id = data
        .session
        .as_ref()
        .map(|s| s.id.clone())
        .filter(|id| !id.is_empty());

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        event_count: data.events.len(),
        session_id,
        estimated_replay_time_ms: Some(data.events.len() as u64 * REPLAY_TIME_PER_EVENT_MS),
    }
}
