//! Rollout resumption
//!
//! Validates a persisted rollout and replays it into a freshly created
//! session under a timeout and a side-effect-safety policy.

pub mod engine;
pub mod validation;

pub use engine::{
    EventFilter, EventReplayFailed, EventReplayed, ReplayFailure, ReplayHandler, ResumeOptions,
    ResumptionEngine, ResumptionResult, ResumptionSignals, ResumptionState, ResumptionStatus,
    SIDE_EFFECT_EVENT_KINDS,
};
pub use validation::{
    validate_rollout, Severity, ValidationFinding, ValidationResult, ValidationRule,
};
