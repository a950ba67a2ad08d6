//! Events emitted to the UI layer.

use glint_shared::Document;
use glint_sync::{SubscriptionKey, ViewSnapshot};

/// One update for the UI. Snapshot payloads are immutable; consumers
/// replace their prior reference wholesale.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    FeedUpdated(ViewSnapshot),
    ExploreLoaded(ViewSnapshot),
    ConversationsUpdated(ViewSnapshot),
    /// Messages of the currently selected conversation.
    MessagesUpdated(ViewSnapshot),
    NotificationsUpdated(ViewSnapshot),
    ProfileLoaded {
        username: String,
        /// `None` if no such user exists.
        profile: Option<Document>,
    },
    ProfilePostsUpdated(ViewSnapshot),
    /// Results of the latest applied search dispatch;
    /// stale responses are never emitted.
    SearchResults {
        seq: u64,
        users: Vec<Document>,
    },
    SearchFailed {
        message: String,
    },
    /// A subscription died with a transport error. Emitted once per
    /// failure; the subscription is left cancelled.
    SubscriptionFailed {
        key: SubscriptionKey,
        message: String,
    },
}
