//! ConversationManager - supervises concurrently-open conversations
//!
//! The manager owns every registered `(conversation_id, session)` pair.
//! A watcher task per conversation pumps the session's events into an
//! `EventQueue` (consumable via `conversation_events`) and refreshes the
//! conversation's activity; a single-shot inactivity timer flips idle
//! conversations to inactive without removing them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::client::{AgentEvent, ClientBuilder, ClientConfig, SharedClient};
use crate::core::{SdkError, SdkResult, StreamError};
use crate::queue::EventQueue;
use crate::resumption::{ResumeOptions, ResumptionEngine};
use crate::rollout::RolloutData;

use super::signals::{
    ConversationCreated, ConversationError, ConversationInactive, ConversationRemoved,
    ConversationResumed, ManagerSignals,
};

/// Default inactivity timeout (5 minutes)
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Default conversation limit
pub const DEFAULT_MAX_CONVERSATIONS: usize = 100;

/// Lifecycle metadata for one managed conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationInfo {
    /// Unique ID the conversation is registered under
    pub conversation_id: String,

    /// When the conversation was registered
    pub created_at: DateTime<Utc>,

    /// Last time the conversation saw traffic or explicit access
    pub last_activity: DateTime<Utc>,

    /// False once the inactivity timer has fired without new traffic
    pub is_active: bool,
}

/// Read-only snapshot of the manager's population
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManagerStats {
    /// Registered conversations
    pub total_conversations: usize,

    /// Conversations currently marked active
    pub active_conversations: usize,

    /// Creation time of the longest-lived conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_created_at: Option<DateTime<Utc>>,

    /// Creation time of the newest conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_created_at: Option<DateTime<Utc>>,
}

/// Manager-wide configuration
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Upper bound on concurrently registered conversations
    pub max_conversations: usize,

    /// Quiet period after which a conversation is flagged inactive
    pub inactivity_timeout: Duration,

    /// Base configuration every conversation starts from
    pub default_config: ClientConfig,
}

impl ManagerOptions {
    /// Set the conversation limit
    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max;
        self
    }

    /// Set the inactivity timeout
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set the base configuration
    pub fn with_default_config(mut self, config: ClientConfig) -> Self {
        self.default_config = config;
        self
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            default_config: ClientConfig::default(),
        }
    }
}

/// Options for one `create_conversation` call
#[derive(Debug)]
pub struct CreateConversationOptions {
    /// Register under this ID instead of asking the runtime
    pub conversation_id: Option<String>,

    /// Per-call configuration layered over the manager's default
    pub config: Option<ClientConfig>,

    /// Connect and create the runtime session immediately (default true)
    pub auto_connect: bool,
}

impl CreateConversationOptions {
    /// Options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under a caller-chosen ID
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Layer a per-call configuration over the manager's default
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defer connecting; the session is registered unconnected
    pub fn without_auto_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }
}

impl Default for CreateConversationOptions {
    fn default() -> Self {
        Self {
            conversation_id: None,
            config: None,
            auto_connect: true,
        }
    }
}

struct ConversationEntry {
    info: ConversationInfo,
    client: SharedClient,
    events: Arc<EventQueue<AgentEvent>>,
    timer: Option<JoinHandle<()>>,
    watcher: JoinHandle<()>,
}

struct ManagerInner {
    builder: Arc<dyn ClientBuilder>,
    options: ManagerOptions,
    conversations: Mutex<HashMap<String, ConversationEntry>>,
    shutting_down: AtomicBool,
    signals: ManagerSignals,
}

/// Supervises many concurrently-open conversations
///
/// Cloning is cheap and clones share the same population.
#[derive(Clone)]
pub struct ConversationManager {
    inner: Arc<ManagerInner>,
}

impl ConversationManager {
    /// Create a manager with default options
    pub fn new(builder: Arc<dyn ClientBuilder>) -> Self {
        Self::with_options(builder, ManagerOptions::default())
    }

    /// Create a manager with explicit options
    pub fn with_options(builder: Arc<dyn ClientBuilder>, options: ManagerOptions) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                builder,
                options,
                conversations: Mutex::new(HashMap::new()),
                shutting_down: AtomicBool::new(false),
                signals: ManagerSignals::default(),
            }),
        }
    }

    /// The manager's lifecycle signals
    pub fn signals(&self) -> &ManagerSignals {
        &self.inner.signals
    }

    /// Whether `shutdown` has begun
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Create and register a new conversation
    ///
    /// Builds a session from the merged configuration, optionally connects
    /// it and creates the runtime conversation, de-duplicates the ID
    /// (`-2`, `-3`, ... suffixes) and registers the pair. With
    /// `auto_connect` disabled and no caller-supplied ID, a locally
    /// generated ID is assigned since the runtime cannot be asked.
    pub async fn create_conversation(
        &self,
        options: CreateConversationOptions,
    ) -> SdkResult<String> {
        if self.is_shutting_down() {
            return Err(SdkError::ManagerShuttingDown);
        }
        {
            let convs = self.inner.conversations.lock().await;
            if convs.len() >= self.inner.options.max_conversations {
                return Err(SdkError::MaxConversationsExceeded {
                    limit: self.inner.options.max_conversations,
                    current: convs.len(),
                });
            }
        }

        let merged = match &options.config {
            Some(config) => self.inner.options.default_config.merged_with(config),
            None => self.inner.options.default_config.clone(),
        };

        let client = self
            .inner
            .builder
            .build(&merged)
            .await
            .map_err(|e| SdkError::manager_with("failed to build session", e))?;

        let base_id = if options.auto_connect {
            client
                .connect()
                .await
                .map_err(|e| SdkError::manager_with("failed to connect session", e))?;
            let runtime_id = client
                .create_conversation()
                .await
                .map_err(|e| SdkError::manager_with("failed to create runtime conversation", e))?;
            options.conversation_id.unwrap_or(runtime_id)
        } else {
            options
                .conversation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        };

        let id = self.register(base_id, client.clone()).await?;
        tracing::info!(conversation_id = %id, "conversation created");
        self.inner.signals.created.emit(&ConversationCreated {
            conversation_id: id.clone(),
            client,
        });
        Ok(id)
    }

    /// Look up a conversation's session
    ///
    /// Access counts as activity: the conversation's `last_activity` is
    /// refreshed and its inactivity timer restarted.
    pub async fn get_conversation(&self, id: &str) -> SdkResult<SharedClient> {
        let mut convs = self.inner.conversations.lock().await;
        let entry = convs
            .get_mut(id)
            .ok_or_else(|| SdkError::ConversationNotFound(id.to_string()))?;

        entry.info.last_activity = Utc::now();
        entry.info.is_active = true;
        Self::reset_timer(&self.inner, entry, id);

        Ok(entry.client.clone())
    }

    /// Pull-based stream over a conversation's events
    ///
    /// Events already consumed by an earlier stream are not replayed; the
    /// queue has a single logical consumer.
    pub async fn conversation_events(
        &self,
        id: &str,
    ) -> SdkResult<impl Stream<Item = Result<AgentEvent, StreamError>> + Send + Unpin> {
        let queue = {
            let convs = self.inner.conversations.lock().await;
            convs
                .get(id)
                .ok_or_else(|| SdkError::ConversationNotFound(id.to_string()))?
                .events
                .clone()
        };

        Ok(Box::pin(async_stream::stream! {
            loop {
                match queue.next().await {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => break,
                    Err(error) => {
                        yield Err(error);
                        break;
                    }
                }
            }
        }))
    }

    /// Remove a conversation, closing its session
    ///
    /// Returns false if the ID is unknown. Close failures are surfaced to
    /// the caller (removal did not complete); the conversation stays
    /// registered in that case.
    pub async fn remove_conversation(&self, id: &str) -> SdkResult<bool> {
        let client = {
            let mut convs = self.inner.conversations.lock().await;
            let Some(entry) = convs.get_mut(id) else {
                return Ok(false);
            };
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            entry.client.clone()
        };

        client
            .close()
            .await
            .map_err(|e| SdkError::manager_with("failed to close conversation session", e))?;

        let removed = {
            let mut convs = self.inner.conversations.lock().await;
            convs.remove(id)
        };
        if let Some(entry) = removed {
            entry.watcher.abort();
            entry.events.close();
            tracing::info!(conversation_id = %id, "conversation removed");
            self.inner.signals.removed.emit(&ConversationRemoved {
                conversation_id: id.to_string(),
            });
        }
        Ok(true)
    }

    /// Reconstruct a conversation from a persisted rollout
    ///
    /// Delegates validation and replay to a fresh `ResumptionEngine`
    /// (engines are single-flight), then independently builds and connects
    /// a second session with the same merged configuration and registers
    /// that one; the replayed session served as a dry validation vehicle.
    pub async fn resume_conversation_from_rollout(
        &self,
        rollout: &RolloutData,
        base_config: Option<&ClientConfig>,
        options: ResumeOptions,
    ) -> SdkResult<String> {
        if self.is_shutting_down() {
            return Err(SdkError::ManagerShuttingDown);
        }

        let merged = match base_config {
            Some(config) => self.inner.options.default_config.merged_with(config),
            None => self.inner.options.default_config.clone(),
        };

        let engine = ResumptionEngine::new(self.inner.builder.clone());
        let result = engine.resume_conversation(rollout, &merged, options).await?;

        let client = self
            .inner
            .builder
            .build(&merged)
            .await
            .map_err(|e| SdkError::manager_with("failed to build resumed session", e))?;
        client
            .connect()
            .await
            .map_err(|e| SdkError::manager_with("failed to connect resumed session", e))?;

        let base_id = if result.conversation_id.is_empty() {
            rollout
                .session
                .as_ref()
                .map(|s| s.id.clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        } else {
            result.conversation_id.clone()
        };

        let id = self.register(base_id, client.clone()).await?;
        tracing::info!(
            conversation_id = %id,
            events_replayed = result.events_replayed,
            "conversation resumed from rollout"
        );
        self.inner.signals.resumed.emit(&ConversationResumed {
            conversation_id: id.clone(),
            client,
            rollout: rollout.clone(),
        });
        Ok(id)
    }

    /// Snapshot of every registered conversation's metadata
    pub async fn list_conversations(&self) -> Vec<ConversationInfo> {
        let convs = self.inner.conversations.lock().await;
        convs.values().map(|entry| entry.info.clone()).collect()
    }

    /// Aggregate counts over the registered conversations
    pub async fn stats(&self) -> ManagerStats {
        let convs = self.inner.conversations.lock().await;
        ManagerStats {
            total_conversations: convs.len(),
            active_conversations: convs.values().filter(|e| e.info.is_active).count(),
            oldest_created_at: convs.values().map(|e| e.info.created_at).min(),
            newest_created_at: convs.values().map(|e| e.info.created_at).max(),
        }
    }

    /// Shut the manager down
    ///
    /// Idempotent. Blocks further `create_conversation` and resume calls,
    /// cancels every timer and watcher, closes every session concurrently
    /// (failures logged, not surfaced) and clears the population.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let entries: Vec<(String, ConversationEntry)> = {
            let mut convs = self.inner.conversations.lock().await;
            convs.drain().collect()
        };

        let mut clients = Vec::with_capacity(entries.len());
        for (id, mut entry) in entries {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            entry.watcher.abort();
            entry.events.close();
            clients.push((id, entry.client));
        }

        let results = join_all(clients.iter().map(|(_, client)| client.close())).await;
        for ((id, _), result) in clients.iter().zip(results) {
            if let Err(error) = result {
                tracing::warn!(conversation_id = %id, %error, "session close failed during shutdown");
            }
        }

        tracing::info!("conversation manager shut down");
        self.inner.signals.shutdown.emit(&());
    }

    async fn register(&self, base_id: String, client: SharedClient) -> SdkResult<String> {
        let mut convs = self.inner.conversations.lock().await;

        // The builder and connect awaits above let other tasks run;
        // re-check the invariants before touching the map.
        if self.is_shutting_down() {
            drop(convs);
            Self::close_quietly(&client, "manager began shutting down").await;
            return Err(SdkError::ManagerShuttingDown);
        }
        if convs.len() >= self.inner.options.max_conversations {
            let current = convs.len();
            drop(convs);
            Self::close_quietly(&client, "conversation limit reached").await;
            return Err(SdkError::MaxConversationsExceeded {
                limit: self.inner.options.max_conversations,
                current,
            });
        }

        let id = Self::dedupe_id(&convs, &base_id);
        let now = Utc::now();
        let events: Arc<EventQueue<AgentEvent>> = Arc::new(EventQueue::new());
        let watcher =
            Self::spawn_watcher(self.inner.clone(), id.clone(), client.clone(), events.clone());
        let timer = Self::spawn_timer(self.inner.clone(), id.clone());

        convs.insert(
            id.clone(),
            ConversationEntry {
                info: ConversationInfo {
                    conversation_id: id.clone(),
                    created_at: now,
                    last_activity: now,
                    is_active: true,
                },
                client,
                events,
                timer: Some(timer),
                watcher,
            },
        );
        Ok(id)
    }

    fn dedupe_id(convs: &HashMap<String, ConversationEntry>, base: &str) -> String {
        if !convs.contains_key(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !convs.contains_key(&candidate) {
                tracing::debug!(base_id = %base, assigned = %candidate, "conversation id de-duplicated");
                return candidate;
            }
            n += 1;
        }
    }

    /// Cancel-then-recreate the entry's inactivity timer; callers hold the
    /// map lock, which makes the swap atomic relative to the activity that
    /// triggered it.
    fn reset_timer(inner: &Arc<ManagerInner>, entry: &mut ConversationEntry, id: &str) {
        if let Some(old) = entry.timer.take() {
            old.abort();
        }
        entry.timer = Some(Self::spawn_timer(inner.clone(), id.to_string()));
    }

    fn spawn_timer(inner: Arc<ManagerInner>, id: String) -> JoinHandle<()> {
        let timeout = inner.options.inactivity_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let signal = {
                let mut convs = inner.conversations.lock().await;
                match convs.get_mut(&id) {
                    Some(entry) if entry.info.is_active => {
                        entry.info.is_active = false;
                        Some(ConversationInactive {
                            conversation_id: id.clone(),
                            last_activity: entry.info.last_activity,
                        })
                    }
                    _ => None,
                }
            };

            if let Some(signal) = signal {
                tracing::debug!(conversation_id = %id, "conversation marked inactive");
                inner.signals.inactive.emit(&signal);
            }
        })
    }

    fn spawn_watcher(
        inner: Arc<ManagerInner>,
        id: String,
        client: SharedClient,
        events: Arc<EventQueue<AgentEvent>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match client.next_event().await {
                    Ok(Some(event)) => {
                        Self::touch(&inner, &id).await;
                        events.enqueue(event);
                    }
                    Ok(None) => {
                        tracing::debug!(conversation_id = %id, "event stream closed");
                        events.close();
                        break;
                    }
                    Err(error) => {
                        tracing::warn!(conversation_id = %id, %error, "event stream failed");
                        events.fail(StreamError::from_error(&error));
                        inner.signals.error.emit(&ConversationError {
                            conversation_id: id.clone(),
                            error: error.to_string(),
                        });
                        break;
                    }
                }
            }
        })
    }

    async fn touch(inner: &Arc<ManagerInner>, id: &str) {
        let mut convs = inner.conversations.lock().await;
        if let Some(entry) = convs.get_mut(id) {
            entry.info.last_activity = Utc::now();
            entry.info.is_active = true;
            Self::reset_timer(inner, entry, id);
        }
    }

    async fn close_quietly(client: &SharedClient, context: &str) {
        if let Err(error) = client.close().await {
            tracing::warn!(%error, context, "best-effort session close failed");
        }
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("max_conversations", &self.inner.options.max_conversations)
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
