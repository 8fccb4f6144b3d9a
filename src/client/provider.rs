//! Agent runtime client traits
//!
//! Abstracts the external runtime's session interface so different
//! backends (a native binding, a remote proxy, a test double) can be used
//! interchangeably by the pool, manager and resumption engine.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::Stream;

use crate::core::SdkResult;

use super::config::ClientConfig;
use super::event::{AgentEvent, Submission};

/// A client shared across tasks
pub type SharedClient = Arc<dyn AgentClient>;

/// One conversation session against the external agent runtime
///
/// The interface is deliberately narrow: connect, create a conversation,
/// submit operations, pull events, close. Event delivery is pull-based;
/// `next_event` resolves `Ok(None)` once the stream has closed cleanly.
#[async_trait::async_trait]
pub trait AgentClient: Send + Sync + 'static {
    /// Establish the connection to the runtime
    async fn connect(&self) -> SdkResult<()>;

    /// Create a conversation on the runtime, returning its assigned ID
    async fn create_conversation(&self) -> SdkResult<String>;

    /// Submit one operation to the session
    async fn submit(&self, submission: Submission) -> SdkResult<()>;

    /// Pull the next event from the session
    ///
    /// Suspends until an event arrives; `Ok(None)` signals that the event
    /// stream has closed and no further events will be produced.
    async fn next_event(&self) -> SdkResult<Option<AgentEvent>>;

    /// Close the session
    async fn close(&self) -> SdkResult<()>;
}

/// Factory for building sessions from a merged configuration
///
/// This is the seam through which the pool, the conversation manager and
/// the resumption engine construct sessions without knowing the backend.
#[async_trait::async_trait]
pub trait ClientBuilder: Send + Sync + 'static {
    /// Build a new, unconnected session
    async fn build(&self, config: &ClientConfig) -> SdkResult<SharedClient>;
}

/// Pull loop over a client's events, exposed as a `futures::Stream`
///
/// The stream is lazy: nothing is pulled until it is polled. Each call to
/// `EventStream::new` starts a fresh pull loop over the same live session;
/// events already consumed are not replayed.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = SdkResult<AgentEvent>> + Send>>,
}

impl EventStream {
    /// Wrap a client's event pull loop
    pub fn new(client: SharedClient) -> Self {
        let inner = Box::pin(async_stream::try_stream! {
            loop {
                match client.next_event().await? {
                    Some(event) => yield event,
                    None => break,
                }
            }
        });
        Self { inner }
    }
}

impl Stream for EventStream {
    type Item = SdkResult<AgentEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish()
    }
}
