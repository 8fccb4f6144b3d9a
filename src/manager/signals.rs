//! Manager lifecycle signals

use chrono::{DateTime, Utc};

use crate::client::SharedClient;
use crate::core::SignalHub;
use crate::rollout::RolloutData;

/// A conversation was created and registered
#[derive(Clone)]
pub struct ConversationCreated {
    /// Assigned (de-duplicated) conversation ID
    pub conversation_id: String,
    /// The registered session
    pub client: SharedClient,
}

/// A conversation was explicitly removed
#[derive(Debug, Clone)]
pub struct ConversationRemoved {
    /// The removed conversation's ID
    pub conversation_id: String,
}

/// A conversation was reconstructed from a rollout and registered
#[derive(Clone)]
pub struct ConversationResumed {
    /// Assigned conversation ID
    pub conversation_id: String,
    /// The registered (fresh) session
    pub client: SharedClient,
    /// The rollout it was reconstructed from
    pub rollout: RolloutData,
}

/// A conversation went quiet past the inactivity timeout
#[derive(Debug, Clone)]
pub struct ConversationInactive {
    /// The idle conversation's ID
    pub conversation_id: String,
    /// When it last saw traffic
    pub last_activity: DateTime<Utc>,
}

/// A conversation's event stream failed
#[derive(Debug, Clone)]
pub struct ConversationError {
    /// The affected conversation's ID
    pub conversation_id: String,
    /// The failure, flattened to its message
    pub error: String,
}

/// One hub per lifecycle signal
///
/// Dispatch is synchronous and ordered; see `SignalHub`.
#[derive(Debug, Default)]
pub struct ManagerSignals {
    /// Fired after a conversation is registered
    pub created: SignalHub<ConversationCreated>,
    /// Fired after a conversation is removed
    pub removed: SignalHub<ConversationRemoved>,
    /// Fired after a rollout resume registers its fresh session
    pub resumed: SignalHub<ConversationResumed>,
    /// Fired when the inactivity timer marks a conversation idle
    pub inactive: SignalHub<ConversationInactive>,
    /// Fired when a conversation's event stream fails
    pub error: SignalHub<ConversationError>,
    /// Fired once when the manager shuts down
    pub shutdown: SignalHub<()>,
}

impl std::fmt::Debug for ConversationCreated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationCreated")
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

impl std::fmt::Debug for ConversationResumed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationResumed")
            .field("conversation_id", &self.conversation_id)
            .field("rollout_events", &self.rollout.event_count())
            .finish()
    }
}
