//! The client facade: view controllers over the synchronization layer.
//!
//! Each `open_*` method wires one view: it builds the query descriptor,
//! registers the subscription under its logical key, and installs a sink
//! that materializes batches into snapshots and emits them as
//! [`ViewEvent`]s. Selection-driven views (messages, profile posts) go
//! through `replace`, so switching can never leave two streams live.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};

use glint_media::{UploadPayload, UploadPipeline, UploadTask};
use glint_remote::RemoteStore;
use glint_shared::constants::EXPLORE_POST_LIMIT;
use glint_shared::{
    CollectionPath, DocumentId, Fields, Predicate, QueryDescriptor, SortSpec,
};
use glint_sync::subscriptions::BatchSink;
use glint_sync::{
    Materializer, ReadReconciler, SearchConfig, SearchSequencer, SubscriptionKey,
    SubscriptionManager, ViewSnapshot,
};

use crate::context::SessionContext;
use crate::error::ClientError;
use crate::events::ViewEvent;

pub struct GlintClient {
    remote: Arc<dyn RemoteStore>,
    session: SessionContext,
    subscriptions: Arc<SubscriptionManager>,
    search: SearchSequencer,
    uploads: UploadPipeline,
    events_tx: mpsc::UnboundedSender<ViewEvent>,
    /// Snapshots of the notification view, fed to the reconciler task.
    reconcile_tx: mpsc::UnboundedSender<ViewSnapshot>,
    selected_conversation: StdMutex<Option<DocumentId>>,
}

impl GlintClient {
    /// Build the client and the event stream the UI consumes.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        session: SessionContext,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let error_events = events_tx.clone();
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&remote),
            Arc::new(move |key, error| {
                let _ = error_events.send(ViewEvent::SubscriptionFailed {
                    key,
                    message: error.to_string(),
                });
            }),
        ));

        let search_events = events_tx.clone();
        let search_error_events = events_tx.clone();
        let search = SearchSequencer::new(
            Arc::clone(&remote),
            SearchConfig::users(),
            Arc::new(move |results| {
                let _ = search_events.send(ViewEvent::SearchResults {
                    seq: results.seq,
                    users: results.documents,
                });
            }),
            Arc::new(move |error| {
                let _ = search_error_events.send(ViewEvent::SearchFailed {
                    message: error.to_string(),
                });
            }),
        );

        // Read reconciliation runs off the delivery path: sinks mirror
        // notification snapshots into this task.
        let (reconcile_tx, mut reconcile_rx) = mpsc::unbounded_channel::<ViewSnapshot>();
        let reconciler = ReadReconciler::new(Arc::clone(&remote));
        tokio::spawn(async move {
            while let Some(snapshot) = reconcile_rx.recv().await {
                let issued = reconciler.mark_read(&snapshot).await;
                if issued > 0 {
                    debug!(issued, "notifications marked read");
                }
            }
        });

        let uploads = UploadPipeline::new(Arc::clone(&remote));
        info!(user = %session.user_id, "client started");

        (
            Self {
                remote,
                session,
                subscriptions,
                search,
                uploads,
                events_tx,
                reconcile_tx,
                selected_conversation: StdMutex::new(None),
            },
            events_rx,
        )
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Live feed of all posts, newest first.
    pub async fn open_feed(&self) -> Result<(), ClientError> {
        let descriptor = QueryDescriptor::new(
            CollectionPath::Posts,
            Predicate::All,
            SortSpec::timestamp_desc(),
        );
        let sink = self.snapshot_sink(descriptor.sort.clone(), ViewEvent::FeedUpdated, false);
        self.subscriptions
            .open(SubscriptionKey::Feed, descriptor, sink)
            .await?;
        Ok(())
    }

    /// One-shot load of the explore grid (most recent posts, capped).
    pub async fn load_explore(&self) -> Result<(), ClientError> {
        let posts = self
            .remote
            .query(
                CollectionPath::Posts,
                Predicate::All,
                SortSpec::timestamp_desc(),
                EXPLORE_POST_LIMIT,
            )
            .await?;
        let _ = self
            .events_tx
            .send(ViewEvent::ExploreLoaded(Arc::new(posts)));
        Ok(())
    }

    /// Conversation list for the signed-in user, most recent activity first.
    pub async fn open_conversations(&self) -> Result<(), ClientError> {
        let descriptor = QueryDescriptor::new(
            CollectionPath::Conversations,
            Predicate::ArrayContains("participants".into(), json!(self.session.user_id)),
            SortSpec::field_desc("lastMessageTime"),
        );
        let sink = self.snapshot_sink(
            descriptor.sort.clone(),
            ViewEvent::ConversationsUpdated,
            false,
        );
        self.subscriptions
            .open(SubscriptionKey::Conversations, descriptor, sink)
            .await?;
        Ok(())
    }

    /// Select a conversation: atomically replaces any previous message
    /// stream with one over the new conversation's sub-collection.
    pub async fn select_conversation(&self, conversation: DocumentId) -> Result<(), ClientError> {
        let descriptor = QueryDescriptor::new(
            CollectionPath::Messages(conversation),
            Predicate::All,
            SortSpec::timestamp_asc(),
        );
        let sink = self.snapshot_sink(descriptor.sort.clone(), ViewEvent::MessagesUpdated, false);
        let outcome = self
            .subscriptions
            .replace(SubscriptionKey::Messages, descriptor, sink)
            .await;
        // Recorded only once the stream is live. On failure `replace` has
        // already torn down any previous stream, so no selection survives.
        if let Ok(mut selected) = self.selected_conversation.lock() {
            *selected = outcome.is_ok().then_some(conversation);
        }
        outcome?;
        debug!(%conversation, "conversation selected");
        Ok(())
    }

    /// Deselect the current conversation and tear down its message stream.
    pub async fn deselect_conversation(&self) {
        if let Ok(mut selected) = self.selected_conversation.lock() {
            *selected = None;
        }
        self.subscriptions
            .close_key(&SubscriptionKey::Messages)
            .await;
    }

    /// Send a message into the selected conversation and refresh the
    /// conversation's denormalized last-message preview.
    pub async fn send_message(&self, text: &str) -> Result<DocumentId, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("Empty message".into()));
        }
        let conversation = self
            .selected_conversation
            .lock()
            .ok()
            .and_then(|selected| *selected)
            .ok_or(ClientError::NoConversationSelected)?;

        let mut fields = Fields::new();
        fields.insert("text".into(), json!(text));
        fields.insert("senderId".into(), json!(self.session.user_id));
        fields.insert("senderUsername".into(), json!(self.session.username));
        let id = self
            .remote
            .write(CollectionPath::Messages(conversation), fields)
            .await?;

        let mut preview = Fields::new();
        preview.insert("lastMessage".into(), json!(text));
        preview.insert("lastMessageTime".into(), json!(Utc::now()));
        self.remote
            .update(CollectionPath::Conversations, conversation, preview)
            .await?;

        debug!(%conversation, message = %id, "message sent");
        Ok(id)
    }

    /// Notifications addressed to the signed-in user; materialized unread
    /// entries are marked read through the reconciler.
    pub async fn open_notifications(&self) -> Result<(), ClientError> {
        let descriptor = QueryDescriptor::new(
            CollectionPath::Notifications,
            Predicate::FieldEq("userId".into(), json!(self.session.user_id)),
            SortSpec::timestamp_desc(),
        );
        let sink = self.snapshot_sink(
            descriptor.sort.clone(),
            ViewEvent::NotificationsUpdated,
            true,
        );
        self.subscriptions
            .open(SubscriptionKey::Notifications, descriptor, sink)
            .await?;
        Ok(())
    }

    /// Look up a profile and follow its posts. Switching profiles replaces
    /// the posts stream under the same key.
    pub async fn open_profile(&self, username: &str) -> Result<(), ClientError> {
        let username = username.to_lowercase();
        let matches = self
            .remote
            .query(
                CollectionPath::Users,
                Predicate::FieldEq("username".into(), json!(username)),
                SortSpec::field_asc("username"),
                1,
            )
            .await?;
        let _ = self.events_tx.send(ViewEvent::ProfileLoaded {
            username: username.clone(),
            profile: matches.into_iter().next(),
        });

        let descriptor = QueryDescriptor::new(
            CollectionPath::Posts,
            Predicate::FieldEq("username".into(), json!(username)),
            SortSpec::timestamp_desc(),
        );
        let sink =
            self.snapshot_sink(descriptor.sort.clone(), ViewEvent::ProfilePostsUpdated, false);
        self.subscriptions
            .replace(SubscriptionKey::ProfilePosts, descriptor, sink)
            .await?;
        Ok(())
    }

    /// Typeahead user search; debounced and sequence-gated.
    pub fn search(&self, term: &str) {
        self.search.set_term(term);
    }

    /// Upload a photo and publish it as a post on success.
    pub fn upload_photo(
        &self,
        payload: UploadPayload,
        caption: &str,
    ) -> Result<UploadTask, ClientError> {
        let mut fields = Fields::new();
        fields.insert("caption".into(), json!(caption));
        fields.insert("username".into(), json!(self.session.username));
        let task = self
            .uploads
            .start(payload, CollectionPath::Posts, fields)?;
        Ok(task)
    }

    /// Tear down every subscription and the search sequencer.
    pub async fn shutdown(&self) {
        self.search.shutdown();
        self.subscriptions.shutdown().await;
        info!("client shut down");
    }

    /// Sink that folds batches through a materializer and emits changed
    /// snapshots as view events. `reconcile` mirrors snapshots to the
    /// read-state reconciler (notification view only).
    fn snapshot_sink(
        &self,
        sort: SortSpec,
        wrap: fn(ViewSnapshot) -> ViewEvent,
        reconcile: bool,
    ) -> BatchSink {
        let materializer = StdMutex::new(Materializer::new(sort));
        let events = self.events_tx.clone();
        let mirror = reconcile.then(|| self.reconcile_tx.clone());
        Box::new(move |batch| {
            let Ok(mut materializer) = materializer.lock() else {
                return;
            };
            if let Some(snapshot) = materializer.apply(&batch) {
                if let Some(mirror) = &mirror {
                    let _ = mirror.send(Arc::clone(&snapshot));
                }
                let _ = events.send(wrap(snapshot));
            }
        })
    }
}
