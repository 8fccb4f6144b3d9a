//! Scripted test doubles for the external agent runtime
//!
//! `MockClient` plays one session: tests push events into it, and the code
//! under test pulls them back out through the `AgentClient` interface.
//! `MockBuilder` plays the factory seam and keeps handles to everything it
//! built so tests can inspect and drive each session.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::core::{SdkError, SdkResult};

use super::config::ClientConfig;
use super::event::{AgentEvent, Submission};
use super::provider::{AgentClient, ClientBuilder, SharedClient};

type ScriptedItem = Result<AgentEvent, String>;

/// A scripted session standing in for the external runtime
pub(crate) struct MockClient {
    conversation_id: String,
    events_tx: Mutex<Option<mpsc::UnboundedSender<ScriptedItem>>>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ScriptedItem>>,
    submissions: Mutex<Vec<Submission>>,
    connect_count: AtomicUsize,
    close_count: AtomicUsize,
    fail_on_close: AtomicBool,
}

impl MockClient {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            conversation_id: conversation_id.into(),
            events_tx: Mutex::new(Some(tx)),
            events_rx: tokio::sync::Mutex::new(rx),
            submissions: Mutex::new(Vec::new()),
            connect_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            fail_on_close: AtomicBool::new(false),
        }
    }

    /// Queue an event for delivery through `next_event`
    pub fn push_event(&self, event: AgentEvent) {
        if let Some(tx) = self.events_tx.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(event));
        }
    }

    /// Close the event stream cleanly; queued events still drain first
    pub fn finish_events(&self) {
        self.events_tx.lock().unwrap().take();
    }

    /// Fail the event stream after any queued events drain
    pub fn fail_events(&self, message: impl Into<String>) {
        let mut tx = self.events_tx.lock().unwrap();
        if let Some(tx) = tx.take() {
            let _ = tx.send(Err(message.into()));
        }
    }

    /// Make `close` calls fail
    pub fn fail_on_close(&self) {
        self.fail_on_close.store(true, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AgentClient for MockClient {
    async fn connect(&self) -> SdkResult<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_conversation(&self) -> SdkResult<String> {
        Ok(self.conversation_id.clone())
    }

    async fn submit(&self, submission: Submission) -> SdkResult<()> {
        self.submissions.lock().unwrap().push(submission);
        Ok(())
    }

    async fn next_event(&self) -> SdkResult<Option<AgentEvent>> {
        let mut rx = self.events_rx.lock().await;
        match rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(message)) => Err(SdkError::Client(message)),
            None => Ok(None),
        }
    }

    async fn close(&self) -> SdkResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.finish_events();
        if self.fail_on_close.load(Ordering::SeqCst) {
            return Err(SdkError::client("close failed"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClient")
            .field("conversation_id", &self.conversation_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Scripted factory producing `MockClient` sessions
#[derive(Default)]
pub(crate) struct MockBuilder {
    built: Mutex<Vec<Arc<MockClient>>>,
    configs: Mutex<Vec<ClientConfig>>,
    fail_next_build: AtomicBool,
    fixed_id: Mutex<Option<String>>,
    id_counter: AtomicUsize,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every built session report the same conversation ID
    pub fn with_fixed_id(self, id: impl Into<String>) -> Self {
        *self.fixed_id.lock().unwrap() = Some(id.into());
        self
    }

    /// Make the next `build` call fail
    pub fn fail_next_build(&self) {
        self.fail_next_build.store(true, Ordering::SeqCst);
    }

    /// Number of sessions built so far
    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    /// Handle to the nth built session
    pub fn client(&self, index: usize) -> Arc<MockClient> {
        self.built.lock().unwrap()[index].clone()
    }

    /// Configs passed to `build`, in call order
    pub fn configs(&self) -> Vec<ClientConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClientBuilder for MockBuilder {
    async fn build(&self, config: &ClientConfig) -> SdkResult<SharedClient> {
        if self.fail_next_build.swap(false, Ordering::SeqCst) {
            return Err(SdkError::client("builder unavailable"));
        }

        let id = self
            .fixed_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| {
                format!("conv-{}", self.id_counter.fetch_add(1, Ordering::SeqCst) + 1)
            });

        let client = Arc::new(MockClient::new(id));
        self.built.lock().unwrap().push(client.clone());
        self.configs.lock().unwrap().push(config.clone());
        Ok(client)
    }
}
