//! EventQueue - decouples an event producer from an async consumer
//!
//! A producer pushes values with `enqueue` and terminates the queue with
//! `close` or `fail`; a single consumer pulls values with `next`. Values
//! are delivered in enqueue order, and a value enqueued before a terminal
//! signal is always delivered before that signal is observed.
//!
//! Terminal semantics (fixed and tested):
//! - Values enqueued after `close`/`fail` are dropped silently.
//! - Buffered values drain before a `fail` error surfaces.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::core::StreamError;

enum Terminal<E> {
    Open,
    Closed,
    Failed(E),
}

struct State<T, E> {
    buffer: VecDeque<T>,
    terminal: Terminal<E>,
}

/// Single-writer, single-reader async event buffer
///
/// One queue serves one consumer: at most one `next()` call is expected to
/// be pending at a time. The producer side (`enqueue`/`close`/`fail`) is
/// synchronous and never blocks.
pub struct EventQueue<T, E: Clone = StreamError> {
    state: Mutex<State<T, E>>,
    notify: Notify,
}

impl<T, E: Clone> EventQueue<T, E> {
    /// Create a new open queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                buffer: VecDeque::new(),
                terminal: Terminal::Open,
            }),
            notify: Notify::new(),
        }
    }

    /// Append a value to the buffer, waking the consumer if it is waiting
    ///
    /// Dropped silently once the queue is closed or failed.
    pub fn enqueue(&self, value: T) {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(state.terminal, Terminal::Open) {
                tracing::trace!("value enqueued after terminal signal; dropping");
                return;
            }
            state.buffer.push_back(value);
        }
        self.notify.notify_one();
    }

    /// Mark end-of-stream
    ///
    /// Buffered values are still delivered; after the buffer empties,
    /// `next()` resolves with `Ok(None)`. No-op if already terminated.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(state.terminal, Terminal::Open) {
                return;
            }
            state.terminal = Terminal::Closed;
        }
        self.notify.notify_one();
    }

    /// Mark the queue permanently failed
    ///
    /// Buffered values are still delivered; once drained, every `next()`
    /// call returns the error. No-op if already terminated.
    pub fn fail(&self, error: E) {
        {
            let mut state = self.state.lock().unwrap();
            if !matches!(state.terminal, Terminal::Open) {
                return;
            }
            state.terminal = Terminal::Failed(error);
        }
        self.notify.notify_one();
    }

    /// Pull the next value
    ///
    /// Returns the oldest buffered value, or suspends until `enqueue`,
    /// `close` or `fail` is invoked. `Ok(None)` signals a clean close.
    pub async fn next(&self) -> Result<Option<T>, E> {
        loop {
            // Arm the wakeup before inspecting state so a producer running
            // between the check and the await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(value) = state.buffer.pop_front() {
                    return Ok(Some(value));
                }
                match &state.terminal {
                    Terminal::Closed => return Ok(None),
                    Terminal::Failed(error) => return Err(error.clone()),
                    Terminal::Open => {}
                }
            }
            notified.await;
        }
    }

    /// Number of buffered, undelivered values
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().buffer.len()
    }

    /// Whether the buffer is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a terminal signal (`close` or `fail`) has been recorded
    pub fn is_terminated(&self) -> bool {
        !matches!(self.state.lock().unwrap().terminal, Terminal::Open)
    }
}

impl<T, E: Clone> Default for EventQueue<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E: Clone> std::fmt::Debug for EventQueue<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("EventQueue")
            .field("buffered", &state.buffer.len())
            .field(
                "terminal",
                &match state.terminal {
                    Terminal::Open => "open",
                    Terminal::Closed => "closed",
                    Terminal::Failed(_) => "failed",
                },
            )
            .finish()
    }
}
