//! ResumptionEngine - replays a validated rollout into a fresh session
//!
//! State machine: validating -> replaying -> {completed | failed}. One
//! resumption may be in flight per engine instance; `current_state()`
//! exposes a defensive copy of the live state and `None` when idle.
//!
//! The replay timeout races the whole loop, not each event: the loop
//! future is dropped at its next suspension point once the budget is
//! exceeded, so a single slow handler can overrun the budget before the
//! timeout is observed. Callers needing hard per-event deadlines must
//! bound handler latency themselves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::client::{ClientBuilder, ClientConfig, SharedClient};
use crate::core::{SdkError, SdkResult, SignalHub};
use crate::rollout::{RolloutData, RolloutEventEntry};

use super::validation::{validate_rollout, ValidationResult, ValidationRule};

/// Event types whose replay would re-trigger an external action
///
/// Skipped by default during replay: approvals, file writes, patch
/// application, shell/exec commands, git operations, network access and
/// MCP tool calls.
pub const SIDE_EFFECT_EVENT_KINDS: &[&str] = &[
    "approval_request",
    "exec_approval_request",
    "apply_patch_approval_request",
    "file_write",
    "file_change",
    "patch_apply_begin",
    "patch_apply_end",
    "exec_command_begin",
    "exec_command_end",
    "shell_command",
    "git_operation",
    "network_request",
    "web_search_begin",
    "mcp_tool_call_begin",
    "mcp_tool_call_end",
];

fn is_side_effect(kind: &str) -> bool {
    SIDE_EFFECT_EVENT_KINDS.contains(&kind)
}

/// Phase of an in-flight resumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumptionStatus {
    /// Running validation rules
    Validating,
    /// Replaying events into the new session
    Replaying,
    /// Finished successfully
    Completed,
    /// Aborted by validation, timeout or a fatal replay error
    Failed,
}

/// One recorded per-event replay failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFailure {
    /// What went wrong
    pub message: String,

    /// Stable failure code
    pub code: String,

    /// Index of the offending event
    pub event_index: Option<usize>,

    /// Whether replay can continue past this failure
    pub recoverable: bool,
}

/// Live progress of one `resume_conversation` call
#[derive(Debug, Clone)]
pub struct ResumptionState {
    /// The conversation being reconstructed; the recorded session ID until
    /// the new session assigns its own
    pub conversation_id: String,

    /// Index of the event currently being processed
    pub current_event_index: usize,

    /// Total events in the rollout
    pub total_events: usize,

    /// When the resumption started
    pub started_at: DateTime<Utc>,

    /// Last time the replay loop made progress
    pub last_activity: DateTime<Utc>,

    /// Current phase
    pub status: ResumptionStatus,

    /// Per-event failures collected so far
    pub errors: Vec<ReplayFailure>,
}

/// Outcome of a completed resumption
#[derive(Debug, Clone)]
pub struct ResumptionResult {
    /// ID assigned by the new session
    pub conversation_id: String,

    /// Events actually replayed
    pub events_replayed: usize,

    /// Total events in the rollout
    pub total_events: usize,

    /// When the resumption finished
    pub resumed_at: DateTime<Utc>,

    /// Validation outcome, absent when validation was disabled
    pub validation_result: Option<ValidationResult>,

    /// Events excluded by the side-effect policy or the caller's filter
    pub skipped_events: usize,

    /// Per-event failures tolerated under `continue_on_error`
    pub errors: Vec<ReplayFailure>,
}

/// Caller-supplied event exclusion; return false to skip the event
pub type EventFilter = Box<dyn Fn(&RolloutEventEntry, usize) -> bool + Send + Sync>;

/// Async per-event-type replay handler
pub type ReplayHandler = Box<
    dyn Fn(SharedClient, RolloutEventEntry, usize) -> BoxFuture<'static, SdkResult<()>>
        + Send
        + Sync,
>;

/// Options for one `resume_conversation` call
pub struct ResumeOptions {
    /// Run validation rules before creating any session (default true)
    pub validate_data: bool,

    /// Skip events in the side-effect type set (default true)
    pub skip_side_effects: bool,

    /// Collect per-event failures instead of aborting (default true)
    pub continue_on_error: bool,

    /// Budget for the whole replay loop (default 30s)
    pub timeout: Duration,

    /// Additional caller-supplied event exclusion
    pub event_filter: Option<EventFilter>,
}

impl ResumeOptions {
    /// Disable pre-flight validation
    pub fn without_validation(mut self) -> Self {
        self.validate_data = false;
        self
    }

    /// Replay side-effect events instead of skipping them
    pub fn with_side_effects(mut self) -> Self {
        self.skip_side_effects = false;
        self
    }

    /// Abort on the first per-event failure
    pub fn abort_on_error(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    /// Set the replay time budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a caller-supplied event filter
    pub fn with_event_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RolloutEventEntry, usize) -> bool + Send + Sync + 'static,
    {
        self.event_filter = Some(Box::new(filter));
        self
    }
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            validate_data: true,
            skip_side_effects: true,
            continue_on_error: true,
            timeout: Duration::from_secs(30),
            event_filter: None,
        }
    }
}

impl std::fmt::Debug for ResumeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeOptions")
            .field("validate_data", &self.validate_data)
            .field("skip_side_effects", &self.skip_side_effects)
            .field("continue_on_error", &self.continue_on_error)
            .field("timeout", &self.timeout)
            .field("event_filter", &self.event_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Signal payload for a successfully replayed event
#[derive(Debug, Clone)]
pub struct EventReplayed {
    /// The replayed event
    pub event: RolloutEventEntry,
    /// Its index in the rollout
    pub index: usize,
    /// Total events in the rollout
    pub total_events: usize,
}

/// Signal payload for a failed event replay
#[derive(Debug, Clone)]
pub struct EventReplayFailed {
    /// The offending event
    pub event: RolloutEventEntry,
    /// Its index in the rollout
    pub index: usize,
    /// The recorded failure
    pub error: ReplayFailure,
}

/// Observability signals emitted during resumption
///
/// Per-event signals fire synchronously relative to each event's replay
/// outcome, preserving log order.
#[derive(Debug, Default)]
pub struct ResumptionSignals {
    /// Fired once with the final result of a successful resumption
    pub completed: SignalHub<ResumptionResult>,
    /// Fired after each successfully replayed event
    pub event_replayed: SignalHub<EventReplayed>,
    /// Fired after each failed event replay
    pub event_replay_failed: SignalHub<EventReplayFailed>,
}

#[derive(Default)]
struct ReplayCounters {
    replayed: AtomicUsize,
    skipped: AtomicUsize,
}

/// Replays persisted rollouts into fresh runtime sessions
pub struct ResumptionEngine {
    builder: Arc<dyn ClientBuilder>,
    state: Mutex<Option<ResumptionState>>,
    custom_rules: Vec<ValidationRule>,
    handlers: HashMap<String, ReplayHandler>,
    signals: ResumptionSignals,
}

impl ResumptionEngine {
    /// Create an engine that builds sessions through `builder`
    pub fn new(builder: Arc<dyn ClientBuilder>) -> Self {
        Self {
            builder,
            state: Mutex::new(None),
            custom_rules: Vec::new(),
            handlers: HashMap::new(),
            signals: ResumptionSignals::default(),
        }
    }

    /// Add a custom validation rule
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&RolloutData) -> anyhow::Result<Vec<super::ValidationFinding>> + Send + Sync + 'static,
    {
        self.custom_rules.push(Box::new(rule));
        self
    }

    /// Install a replay handler for one event type
    ///
    /// Event types without a handler replay as no-ops (informational
    /// events need no action against the new session).
    pub fn with_handler<F>(mut self, kind: impl Into<String>, handler: F) -> Self
    where
        F: Fn(SharedClient, RolloutEventEntry, usize) -> BoxFuture<'static, SdkResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
        self
    }

    /// The engine's observability signals
    pub fn signals(&self) -> &ResumptionSignals {
        &self.signals
    }

    /// Defensive copy of the live state, or `None` when idle
    pub fn current_state(&self) -> Option<ResumptionState> {
        self.state.lock().unwrap().clone()
    }

    /// Validate `rollout` and replay it into a newly created session
    ///
    /// On success the replayed session is closed best-effort: it served as
    /// a validation vehicle and nothing else holds its handle. On timeout
    /// or a fatal replay error the partially-replayed session is left open
    /// for the caller to deal with.
    pub async fn resume_conversation(
        &self,
        rollout: &RolloutData,
        config: &ClientConfig,
        options: ResumeOptions,
    ) -> SdkResult<ResumptionResult> {
        self.begin(rollout)?;
        let outcome = self.run(rollout, config, options).await;

        let mut state = self.state.lock().unwrap();
        if let Some(state) = state.as_mut() {
            state.status = match outcome {
                Ok(_) => ResumptionStatus::Completed,
                Err(_) => ResumptionStatus::Failed,
            };
        }
        *state = None;

        outcome
    }

    fn begin(&self, rollout: &RolloutData) -> SdkResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.is_some() {
            return Err(SdkError::ResumptionInProgress);
        }
        let now = Utc::now();
        *state = Some(ResumptionState {
            conversation_id: rollout
                .session
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            current_event_index: 0,
            total_events: rollout.events.len(),
            started_at: now,
            last_activity: now,
            status: ResumptionStatus::Validating,
            errors: Vec::new(),
        });
        Ok(())
    }

    fn update_state(&self, f: impl FnOnce(&mut ResumptionState)) {
        if let Some(state) = self.state.lock().unwrap().as_mut() {
            f(state);
        }
    }

    async fn run(
        &self,
        rollout: &RolloutData,
        config: &ClientConfig,
        options: ResumeOptions,
    ) -> SdkResult<ResumptionResult> {
        let validation_result = if options.validate_data {
            let result = validate_rollout(rollout, &self.custom_rules);
            if !result.is_valid {
                tracing::warn!(
                    errors = result.errors.len(),
                    "rollout failed validation; no session created"
                );
                return Err(SdkError::Validation(result.errors));
            }
            Some(result)
        } else {
            None
        };

        let client = self.builder.build(config).await?;
        client.connect().await?;
        let conversation_id = client.create_conversation().await?;
        tracing::debug!(conversation_id = %conversation_id, "replay session created");

        self.update_state(|state| {
            state.conversation_id = conversation_id.clone();
            state.status = ResumptionStatus::Replaying;
        });

        let counters = Arc::new(ReplayCounters::default());
        let total_events = rollout.events.len();

        let replay = self.replay_events(&client, rollout, &options, &counters);
        match tokio::time::timeout(options.timeout, replay).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => {
                let events_completed = counters.replayed.load(Ordering::SeqCst);
                tracing::warn!(
                    events_completed,
                    total_events,
                    "replay timed out; partially-replayed session left open"
                );
                return Err(SdkError::ResumptionTimeout {
                    timeout_ms: options.timeout.as_millis() as u64,
                    events_completed,
                });
            }
        }

        let errors = self
            .state
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.errors.clone())
            .unwrap_or_default();

        let result = ResumptionResult {
            conversation_id,
            events_replayed: counters.replayed.load(Ordering::SeqCst),
            total_events,
            resumed_at: Utc::now(),
            validation_result,
            skipped_events: counters.skipped.load(Ordering::SeqCst),
            errors,
        };

        // The replay session was a validation vehicle; nothing else holds
        // its handle, so tear it down rather than leak it.
        if let Err(error) = client.close().await {
            tracing::warn!(%error, "failed to close replay session");
        }

        tracing::info!(
            conversation_id = %result.conversation_id,
            events_replayed = result.events_replayed,
            skipped_events = result.skipped_events,
            "resumption completed"
        );
        self.signals.completed.emit(&result);
        Ok(result)
    }

    async fn replay_events(
        &self,
        client: &SharedClient,
        rollout: &RolloutData,
        options: &ResumeOptions,
        counters: &ReplayCounters,
    ) -> SdkResult<()> {
        let total_events = rollout.events.len();

        for (index, event) in rollout.events.iter().enumerate() {
            self.update_state(|state| {
                state.current_event_index = index;
                state.last_activity = Utc::now();
            });

            if let Some(filter) = &options.event_filter {
                if !filter(event, index) {
                    counters.skipped.fetch_add(1, Ordering::SeqCst);
                    tracing::trace!(index, kind = event.kind(), "event excluded by filter");
                    continue;
                }
            }

            if options.skip_side_effects && is_side_effect(event.kind()) {
                counters.skipped.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(index, kind = event.kind(), "side-effect event skipped");
                continue;
            }

            match self.replay_one(client, event, index).await {
                Ok(()) => {
                    counters.replayed.fetch_add(1, Ordering::SeqCst);
                    self.signals.event_replayed.emit(&EventReplayed {
                        event: event.clone(),
                        index,
                        total_events,
                    });
                }
                Err(error) => {
                    let failure = ReplayFailure {
                        message: error.to_string(),
                        code: "EVENT_REPLAY_FAILED".to_string(),
                        event_index: Some(index),
                        recoverable: true,
                    };
                    self.signals.event_replay_failed.emit(&EventReplayFailed {
                        event: event.clone(),
                        index,
                        error: failure.clone(),
                    });

                    if options.continue_on_error {
                        tracing::warn!(index, error = %failure.message, "event replay failed; continuing");
                        self.update_state(|state| state.errors.push(failure));
                        continue;
                    }
                    return Err(SdkError::Replay {
                        message: failure.message,
                        code: failure.code,
                        event_index: failure.event_index,
                        recoverable: failure.recoverable,
                    });
                }
            }
        }
        Ok(())
    }

    async fn replay_one(
        &self,
        client: &SharedClient,
        event: &RolloutEventEntry,
        index: usize,
    ) -> SdkResult<()> {
        match self.handlers.get(event.kind()) {
            Some(handler) => handler(client.clone(), event.clone(), index).await,
            // Informational event types need no action against the new session
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ResumptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumptionEngine")
            .field("handlers", &self.handlers.len())
            .field("custom_rules", &self.custom_rules.len())
            .field("in_flight", &self.state.lock().unwrap().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::MockBuilder;
    use crate::client::AgentEvent;
    use crate::rollout::SessionMeta;

    fn rollout(kinds: &[&str]) -> RolloutData {
        RolloutData::new(
            SessionMeta::new("s1"),
            kinds
                .iter()
                .map(|k| RolloutEventEntry::new(AgentEvent::new("", *k)))
                .collect(),
        )
    }

    fn basic_rollout() -> RolloutData {
        rollout(&["session_created", "turn_started", "turn_completed"])
    }

    #[tokio::test]
    async fn test_resume_replays_all_events() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder.clone());

        let result = engine
            .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 3);
        assert_eq!(result.total_events, 3);
        assert_eq!(result.skipped_events, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.conversation_id, "conv-1");
        assert!(result.validation_result.as_ref().unwrap().is_valid);

        // The replay session was connected, used and torn down
        let client = builder.client(0);
        assert_eq!(client.connect_count(), 1);
        assert!(client.is_closed());

        // The engine is idle again
        assert!(engine.current_state().is_none());
    }

    #[tokio::test]
    async fn test_side_effect_events_skipped_by_default() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder);

        let data = rollout(&["session_created", "turn_started", "turn_completed", "file_write"]);
        let result = engine
            .resume_conversation(&data, &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 3);
        assert_eq!(result.skipped_events, 1);
    }

    #[tokio::test]
    async fn test_side_effects_replayed_when_opted_in() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder);

        let data = rollout(&["session_created", "file_write"]);
        let result = engine
            .resume_conversation(
                &data,
                &ClientConfig::new(),
                ResumeOptions::default().with_side_effects(),
            )
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 2);
        assert_eq!(result.skipped_events, 0);
    }

    #[tokio::test]
    async fn test_event_filter_excludes_before_side_effect_check() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder);

        let result = engine
            .resume_conversation(
                &basic_rollout(),
                &ClientConfig::new(),
                ResumeOptions::default().with_event_filter(|event, _| event.kind() != "turn_started"),
            )
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 2);
        assert_eq!(result.skipped_events, 1);
    }

    #[tokio::test]
    async fn test_validation_failure_creates_no_session() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder.clone());

        let data = RolloutData {
            session: None,
            events: Vec::new(),
        };
        let err = engine
            .resume_conversation(&data, &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap_err();

        match err {
            SdkError::Validation(findings) => {
                assert_eq!(findings[0].code, "MISSING_SESSION");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(builder.build_count(), 0);
        assert!(engine.current_state().is_none());
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder);

        let data = RolloutData {
            session: None,
            events: Vec::new(),
        };
        let result = engine
            .resume_conversation(
                &data,
                &ClientConfig::new(),
                ResumeOptions::default().without_validation(),
            )
            .await
            .unwrap();

        assert!(result.validation_result.is_none());
    }

    #[tokio::test]
    async fn test_handler_failures_collected_under_continue_on_error() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder).with_handler(
            "turn_started",
            |_client, _event, _index| {
                Box::pin(async { Err(SdkError::client("handler refused")) })
            },
        );

        let result = engine
            .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "EVENT_REPLAY_FAILED");
        assert_eq!(result.errors[0].event_index, Some(1));
        assert!(result.errors[0].recoverable);
    }

    #[tokio::test]
    async fn test_handler_failure_aborts_without_continue_on_error() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder).with_handler(
            "turn_started",
            |_client, _event, _index| {
                Box::pin(async { Err(SdkError::client("handler refused")) })
            },
        );

        let err = engine
            .resume_conversation(
                &basic_rollout(),
                &ClientConfig::new(),
                ResumeOptions::default().abort_on_error(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Replay { event_index: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_timeout_aborts_replay() {
        let builder = Arc::new(MockBuilder::new());
        let mut engine = ResumptionEngine::new(builder);
        for kind in ["session_created", "turn_started", "turn_completed"] {
            engine = engine.with_handler(kind, |_client, _event, _index| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                })
            });
        }

        let err = engine
            .resume_conversation(
                &basic_rollout(),
                &ClientConfig::new(),
                ResumeOptions::default().with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        match err {
            SdkError::ResumptionTimeout {
                timeout_ms,
                events_completed,
            } => {
                assert_eq!(timeout_ms, 100);
                assert!(events_completed < 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.current_state().is_none());
    }

    #[tokio::test]
    async fn test_engine_is_not_reentrant() {
        let builder = Arc::new(MockBuilder::new());
        let engine = Arc::new(ResumptionEngine::new(builder).with_handler(
            "session_created",
            |_client, _event, _index| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                })
            },
        ));

        let engine_clone = engine.clone();
        let first = tokio::spawn(async move {
            engine_clone
                .resume_conversation(
                    &rollout(&["session_created"]),
                    &ClientConfig::new(),
                    ResumeOptions::default(),
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        let err = engine
            .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::ResumptionInProgress));

        first.await.unwrap().unwrap();
        assert!(engine.current_state().is_none());
    }

    #[tokio::test]
    async fn test_state_visible_during_replay() {
        let builder = Arc::new(MockBuilder::new());
        let engine = Arc::new(ResumptionEngine::new(builder).with_handler(
            "turn_started",
            |_client, _event, _index| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                })
            },
        ));

        let engine_clone = engine.clone();
        let task = tokio::spawn(async move {
            engine_clone
                .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = engine.current_state().expect("resumption should be live");
        assert_eq!(state.status, ResumptionStatus::Replaying);
        assert_eq!(state.total_events, 3);
        assert_eq!(state.conversation_id, "conv-1");

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_signals_fire_in_log_order() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder).with_handler(
            "turn_started",
            |_client, _event, _index| {
                Box::pin(async { Err(SdkError::client("handler refused")) })
            },
        );

        let replayed: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let failed: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));

        let replayed_clone = replayed.clone();
        engine.signals().event_replayed.subscribe(move |e: &EventReplayed| {
            replayed_clone.lock().unwrap().push(e.index);
        });
        let failed_clone = failed.clone();
        engine
            .signals()
            .event_replay_failed
            .subscribe(move |e: &EventReplayFailed| {
                failed_clone.lock().unwrap().push(e.index);
            });
        let completed_clone = completed.clone();
        engine.signals().completed.subscribe(move |_: &ResumptionResult| {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });

        engine
            .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap();

        assert_eq!(*replayed.lock().unwrap(), vec![0, 2]);
        assert_eq!(*failed.lock().unwrap(), vec![1]);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_rule_blocks_resumption() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder.clone()).with_rule(|data| {
            if data.events.len() < 10 {
                Ok(vec![super::super::ValidationFinding::error(
                    "TOO_SHORT",
                    "need at least 10 events",
                )])
            } else {
                Ok(Vec::new())
            }
        });

        let err = engine
            .resume_conversation(&basic_rollout(), &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Validation(_)));
        assert_eq!(builder.build_count(), 0);
    }

    #[tokio::test]
    async fn test_replay_handler_can_submit_to_session() {
        let builder = Arc::new(MockBuilder::new());
        let engine = ResumptionEngine::new(builder.clone()).with_handler(
            "user_message",
            |client, event, _index| {
                Box::pin(async move {
                    client
                        .submit(crate::client::Submission::with_data(
                            "user_input",
                            event.payload.msg.data.clone(),
                        ))
                        .await
                })
            },
        );

        let data = rollout(&["session_created", "user_message"]);
        let result = engine
            .resume_conversation(&data, &ClientConfig::new(), ResumeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.events_replayed, 2);
        let submissions = builder.client(0).submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].op, "user_input");
    }
}
