//! SessionPool - bounded pool of runtime sessions
//!
//! `acquire()` returns a session for exclusive use; `release()` returns it.
//! When the pool is at capacity, callers queue as waiters and are served
//! strictly FIFO as sessions come back. `with_client` wraps the pair so the
//! session is released on every exit path.
//!
//! Invariant: `|idle| + |busy| <= max_size`; a session is owned by exactly
//! one of {the idle list, one busy caller, one pending waiter's channel}.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::client::{ClientBuilder, ClientConfig, SharedClient};
use crate::core::{SdkError, SdkResult};

struct PoolState {
    idle: VecDeque<SharedClient>,
    busy: Vec<SharedClient>,
    waiters: VecDeque<oneshot::Sender<SharedClient>>,
    size: usize,
    closed: bool,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions parked and ready to hand out
    pub idle: usize,
    /// Sessions currently held by callers
    pub busy: usize,
    /// Callers queued for a session
    pub waiters: usize,
    /// Sessions constructed and not yet torn down
    pub size: usize,
    /// Configured capacity
    pub max_size: usize,
}

/// Bounded pool of runtime sessions
pub struct SessionPool {
    builder: Arc<dyn ClientBuilder>,
    config: ClientConfig,
    max_size: usize,
    state: Mutex<PoolState>,
}

impl SessionPool {
    /// Create a pool that builds sessions from `config`, up to `max_size`
    pub fn new(builder: Arc<dyn ClientBuilder>, config: ClientConfig, max_size: usize) -> Self {
        Self {
            builder,
            config,
            max_size,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                busy: Vec::new(),
                waiters: VecDeque::new(),
                size: 0,
                closed: false,
            }),
        }
    }

    /// Acquire a session for exclusive use
    ///
    /// Reuses an idle session, constructs a new one while under capacity,
    /// or queues until a `release` hands one over.
    pub async fn acquire(&self) -> SdkResult<SharedClient> {
        let rx = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SdkError::PoolClosed);
            }
            if let Some(client) = state.idle.pop_front() {
                state.busy.push(client.clone());
                return Ok(client);
            }
            if state.size < self.max_size {
                // Reserve the slot before awaiting the builder so concurrent
                // acquires cannot push size past max_size.
                state.size += 1;
                drop(state);
                return self.build_slot().await;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        rx.await.map_err(|_| SdkError::PoolClosed)
    }

    async fn build_slot(&self) -> SdkResult<SharedClient> {
        let built = async {
            let client = self.builder.build(&self.config).await?;
            client.connect().await?;
            Ok(client)
        }
        .await;

        let mut state = self.state.lock().await;
        match built {
            Ok(client) => {
                if state.closed {
                    // Pool closed while we were constructing; the slot was
                    // already reset by close(), so just tear the session down.
                    drop(state);
                    if let Err(error) = client.close().await {
                        tracing::warn!(%error, "failed to close session built during pool shutdown");
                    }
                    return Err(SdkError::PoolClosed);
                }
                state.busy.push(client.clone());
                Ok(client)
            }
            Err(error) => {
                if !state.closed {
                    state.size -= 1;
                }
                Err(error)
            }
        }
    }

    /// Return a session to the pool
    ///
    /// No-op if the session is not currently marked busy (double-release
    /// defense). If a waiter is queued, the session is handed directly to
    /// the oldest one without ever becoming idle.
    pub async fn release(&self, client: &SharedClient) {
        let mut state = self.state.lock().await;
        let Some(pos) = state.busy.iter().position(|c| Arc::ptr_eq(c, client)) else {
            tracing::warn!("release of a session not marked busy; ignoring");
            return;
        };
        let client = state.busy.swap_remove(pos);

        // FIFO hand-off; a waiter whose acquire was dropped is skipped.
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(client.clone()).is_ok() {
                state.busy.push(client);
                return;
            }
        }
        state.idle.push_back(client);
    }

    /// Run `f` with an acquired session, releasing it on every exit path
    pub async fn with_client<F, Fut, R>(&self, f: F) -> SdkResult<R>
    where
        F: FnOnce(SharedClient) -> Fut,
        Fut: Future<Output = SdkResult<R>>,
    {
        let client = self.acquire().await?;
        let result = f(client.clone()).await;
        self.release(&client).await;
        result
    }

    /// Terminate the pool
    ///
    /// Rejects every queued waiter, closes every idle and busy session
    /// concurrently (individual close failures are logged, not surfaced),
    /// and resets `size` to 0. Idempotent.
    pub async fn close(&self) {
        let (clients, waiters) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            let waiters = std::mem::take(&mut state.waiters);
            let mut clients: Vec<SharedClient> = state.idle.drain(..).collect();
            clients.append(&mut state.busy);
            state.size = 0;
            (clients, waiters)
        };

        // Dropping the senders resolves each pending acquire to PoolClosed.
        drop(waiters);

        let results = futures::future::join_all(clients.iter().map(|c| c.close())).await;
        for result in results {
            if let Err(error) = result {
                tracing::warn!(%error, "session close failed during pool shutdown");
            }
        }
    }

    /// Snapshot of current occupancy
    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            idle: state.idle.len(),
            busy: state.busy.len(),
            waiters: state.waiters.len(),
            size: state.size,
            max_size: self.max_size,
        }
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("max_size", &self.max_size)
            .finish()
    }
}
