//! In-memory remote store.
//!
//! [`MemoryStore`] implements [`RemoteStore`] entirely in process: documents
//! live in per-collection maps, and every mutation pushes a change batch to
//! the subscribers whose predicate it touches. Batches are enqueued while the
//! store lock is held, so each subscription observes mutations in causal
//! order. Fault injection hooks let tests drive the error paths of the layers
//! above.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use glint_shared::constants::UPLOAD_CHUNK_SIZE;
use glint_shared::{CollectionPath, Document, DocumentId, Fields, Predicate, SortSpec, Timestamp};

use crate::error::RemoteError;
use crate::event::{BatchResult, ChangeEvent};
use crate::store::{ContentAddress, RemoteStore, StreamHandle, UploadProgress};

/// Per-subscription delivery queue depth.
const CHANNEL_CAPACITY: usize = 256;

struct Subscriber {
    path: CollectionPath,
    predicate: Predicate,
    tx: mpsc::Sender<BatchResult>,
}

#[derive(Default)]
struct Faults {
    fail_next_subscribe: bool,
    fail_next_write: bool,
    fail_next_update: bool,
    fail_upload_after: Option<u64>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<CollectionPath, BTreeMap<DocumentId, Document>>,
    subscribers: HashMap<StreamHandle, Subscriber>,
    faults: Faults,
}

/// In-memory [`RemoteStore`] for tests and local development.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_handle: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document with an explicit committed timestamp and notify
    /// matching subscribers. Test seeding helper; production writes go
    /// through [`RemoteStore::write`].
    pub async fn seed(
        &self,
        path: CollectionPath,
        fields: Fields,
        at: DateTime<Utc>,
    ) -> DocumentId {
        let id = DocumentId::new();
        let doc = Document::new(id, fields, Timestamp::Committed(at));

        let mut inner = self.inner.lock().await;
        inner
            .collections
            .entry(path.clone())
            .or_default()
            .insert(id, doc.clone());
        Self::publish(&mut inner, &path, |predicate| {
            predicate
                .matches(&doc)
                .then(|| vec![ChangeEvent::Added(doc.clone())])
        });
        id
    }

    /// Delete a document and notify matching subscribers with `Removed`.
    pub async fn remove(&self, path: CollectionPath, id: DocumentId) {
        let mut inner = self.inner.lock().await;
        let removed = inner
            .collections
            .get_mut(&path)
            .and_then(|docs| docs.remove(&id));
        if let Some(old) = removed {
            Self::publish(&mut inner, &path, |predicate| {
                predicate
                    .matches(&old)
                    .then(|| vec![ChangeEvent::Removed(id)])
            });
        }
    }

    /// Terminate one live subscription with a transport error.
    pub async fn fail_subscription(&self, handle: StreamHandle) {
        let mut inner = self.inner.lock().await;
        if let Some(sub) = inner.subscribers.remove(&handle) {
            let _ = sub
                .tx
                .try_send(Err(RemoteError::Transport("stream lost".into())));
        }
    }

    pub async fn fail_next_subscribe(&self) {
        self.inner.lock().await.faults.fail_next_subscribe = true;
    }

    pub async fn fail_next_write(&self) {
        self.inner.lock().await.faults.fail_next_write = true;
    }

    pub async fn fail_next_update(&self) {
        self.inner.lock().await.faults.fail_next_update = true;
    }

    /// Make the next binary upload fail once at least `bytes` have been
    /// reported transferred.
    pub async fn fail_upload_after(&self, bytes: u64) {
        self.inner.lock().await.faults.fail_upload_after = Some(bytes);
    }

    /// Number of live subscriptions (test observability).
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Fetch one document directly (test observability).
    pub async fn document(&self, path: &CollectionPath, id: DocumentId) -> Option<Document> {
        self.inner
            .lock()
            .await
            .collections
            .get(path)
            .and_then(|docs| docs.get(&id))
            .cloned()
    }

    /// Enqueue a batch to every subscriber of `path` whose predicate the
    /// mutation touches. Called with the store lock held so every
    /// subscription sees mutations in causal order; `try_send` keeps this
    /// free of await points.
    fn publish<F>(inner: &mut Inner, path: &CollectionPath, events_for: F)
    where
        F: Fn(&Predicate) -> Option<Vec<ChangeEvent>>,
    {
        let mut dead = Vec::new();
        for (handle, sub) in &inner.subscribers {
            if sub.path != *path {
                continue;
            }
            let Some(batch) = events_for(&sub.predicate) else {
                continue;
            };
            if sub.tx.try_send(Ok(batch)).is_err() {
                dead.push(*handle);
            }
        }
        for handle in dead {
            debug!(handle = handle.0, "dropping unreachable subscriber");
            inner.subscribers.remove(&handle);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(
        &self,
        path: CollectionPath,
        predicate: Predicate,
        sort: SortSpec,
    ) -> Result<(StreamHandle, mpsc::Receiver<BatchResult>), RemoteError> {
        let mut inner = self.inner.lock().await;
        if std::mem::take(&mut inner.faults.fail_next_subscribe) {
            return Err(RemoteError::Transport("subscribe refused".into()));
        }

        let handle = StreamHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        // Initial batch: the current matching set, ordered.
        let mut matching: Vec<Document> = inner
            .collections
            .get(&path)
            .map(|docs| {
                docs.values()
                    .filter(|doc| predicate.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| sort.cmp(a, b));
        let initial: Vec<ChangeEvent> = matching.into_iter().map(ChangeEvent::Added).collect();
        if tx.try_send(Ok(initial)).is_err() {
            warn!(handle = handle.0, "initial batch dropped");
        }

        inner
            .subscribers
            .insert(handle, Subscriber { path, predicate, tx });
        debug!(handle = handle.0, "subscription opened");
        Ok((handle, rx))
    }

    async fn unsubscribe(&self, handle: StreamHandle) {
        let mut inner = self.inner.lock().await;
        if inner.subscribers.remove(&handle).is_some() {
            debug!(handle = handle.0, "subscription closed");
        }
    }

    async fn query(
        &self,
        path: CollectionPath,
        predicate: Predicate,
        sort: SortSpec,
        limit: usize,
    ) -> Result<Vec<Document>, RemoteError> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<Document> = inner
            .collections
            .get(&path)
            .map(|docs| {
                docs.values()
                    .filter(|doc| predicate.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| sort.cmp(a, b));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn write(&self, path: CollectionPath, fields: Fields) -> Result<DocumentId, RemoteError> {
        let mut inner = self.inner.lock().await;
        if std::mem::take(&mut inner.faults.fail_next_write) {
            return Err(RemoteError::Transport("write refused".into()));
        }

        let id = DocumentId::new();

        // Writer-side echo: subscribers first observe the document with a
        // pending timestamp, then a second batch carries the commit.
        let pending = Document::new(id, fields.clone(), Timestamp::Pending);
        Self::publish(&mut inner, &path, |predicate| {
            predicate
                .matches(&pending)
                .then(|| vec![ChangeEvent::Added(pending.clone())])
        });

        let committed = Document::new(id, fields, Timestamp::Committed(Utc::now()));
        inner
            .collections
            .entry(path.clone())
            .or_default()
            .insert(id, committed.clone());
        Self::publish(&mut inner, &path, |predicate| {
            predicate
                .matches(&committed)
                .then(|| vec![ChangeEvent::Modified(committed.clone())])
        });

        debug!(%id, collection = %path, "document written");
        Ok(id)
    }

    async fn update(
        &self,
        path: CollectionPath,
        id: DocumentId,
        partial: Fields,
    ) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        if std::mem::take(&mut inner.faults.fail_next_update) {
            return Err(RemoteError::Transport("update refused".into()));
        }

        let old = inner
            .collections
            .get(&path)
            .and_then(|docs| docs.get(&id))
            .cloned()
            .ok_or(RemoteError::NotFound)?;

        let mut updated = old.clone();
        for (name, value) in partial {
            updated.fields.insert(name, value);
        }
        if let Some(docs) = inner.collections.get_mut(&path) {
            docs.insert(id, updated.clone());
        }

        // A merge can move a document into or out of a predicate's scope.
        Self::publish(&mut inner, &path, |predicate| {
            match (predicate.matches(&old), predicate.matches(&updated)) {
                (true, true) => Some(vec![ChangeEvent::Modified(updated.clone())]),
                (true, false) => Some(vec![ChangeEvent::Removed(id)]),
                (false, true) => Some(vec![ChangeEvent::Added(updated.clone())]),
                (false, false) => None,
            }
        });

        debug!(%id, collection = %path, "document updated");
        Ok(())
    }

    async fn upload_binary(&self, payload: Bytes) -> mpsc::Receiver<UploadProgress> {
        let fail_after = {
            let mut inner = self.inner.lock().await;
            inner.faults.fail_upload_after.take()
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let total = payload.len() as u64;
            let mut transferred = 0u64;

            for chunk in payload.chunks(UPLOAD_CHUNK_SIZE) {
                transferred += chunk.len() as u64;
                if fail_after.is_some_and(|limit| transferred >= limit) {
                    let _ = tx
                        .send(UploadProgress::Failed(RemoteError::Transport(
                            "connection reset".into(),
                        )))
                        .await;
                    return;
                }
                if tx
                    .send(UploadProgress::Transferred {
                        bytes: transferred,
                        total,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                tokio::task::yield_now().await;
            }

            let address = ContentAddress::for_bytes(&payload);
            let _ = tx.send(UploadProgress::Done(address)).await;
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<BatchResult>) -> Vec<ChangeEvent> {
        rx.recv().await.expect("channel open").expect("no error")
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_matching_set() {
        let store = MemoryStore::new();
        store
            .seed(
                CollectionPath::Posts,
                fields(json!({ "username": "ada" })),
                Utc::now(),
            )
            .await;

        let (_, mut rx) = store
            .subscribe(
                CollectionPath::Posts,
                Predicate::All,
                SortSpec::timestamp_desc(),
            )
            .await
            .unwrap();

        let initial = recv(&mut rx).await;
        assert_eq!(initial.len(), 1);
        assert!(matches!(initial[0], ChangeEvent::Added(_)));
    }

    #[tokio::test]
    async fn write_echoes_pending_then_committed() {
        let store = MemoryStore::new();
        let (_, mut rx) = store
            .subscribe(
                CollectionPath::Posts,
                Predicate::All,
                SortSpec::timestamp_desc(),
            )
            .await
            .unwrap();
        assert!(recv(&mut rx).await.is_empty());

        let id = store
            .write(CollectionPath::Posts, fields(json!({ "caption": "x" })))
            .await
            .unwrap();

        let first = recv(&mut rx).await;
        match &first[0] {
            ChangeEvent::Added(doc) => {
                assert_eq!(doc.id, id);
                assert!(doc.timestamp.is_pending());
            }
            other => panic!("expected pending Added, got {other:?}"),
        }

        let second = recv(&mut rx).await;
        match &second[0] {
            ChangeEvent::Modified(doc) => assert!(!doc.timestamp.is_pending()),
            other => panic!("expected committed Modified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_moving_out_of_scope_emits_removed() {
        let store = MemoryStore::new();
        let id = store
            .seed(
                CollectionPath::Notifications,
                fields(json!({ "userId": "u1", "read": false })),
                Utc::now(),
            )
            .await;

        let (_, mut rx) = store
            .subscribe(
                CollectionPath::Notifications,
                Predicate::FieldEq("read".into(), json!(false)),
                SortSpec::timestamp_desc(),
            )
            .await
            .unwrap();
        assert_eq!(recv(&mut rx).await.len(), 1);

        store
            .update(
                CollectionPath::Notifications,
                id,
                fields(json!({ "read": true })),
            )
            .await
            .unwrap();

        let batch = recv(&mut rx).await;
        assert_eq!(batch, vec![ChangeEvent::Removed(id)]);
    }

    #[tokio::test]
    async fn query_orders_and_limits() {
        let store = MemoryStore::new();
        for name in ["carol", "ada", "bob"] {
            store
                .seed(
                    CollectionPath::Users,
                    fields(json!({ "username": name })),
                    Utc::now(),
                )
                .await;
        }

        let users = store
            .query(
                CollectionPath::Users,
                Predicate::All,
                SortSpec::field_asc("username"),
                2,
            )
            .await
            .unwrap();

        let names: Vec<&str> = users.iter().filter_map(|d| d.str_field("username")).collect();
        assert_eq!(names, vec!["ada", "bob"]);
    }

    #[tokio::test]
    async fn upload_reports_monotone_progress_then_address() {
        let store = MemoryStore::new();
        let payload = Bytes::from(vec![7u8; UPLOAD_CHUNK_SIZE + 16]);
        let expected = ContentAddress::for_bytes(&payload);

        let mut rx = store.upload_binary(payload).await;
        let mut last = 0u64;
        loop {
            match rx.recv().await.expect("progress stream open") {
                UploadProgress::Transferred { bytes, total } => {
                    assert!(bytes >= last);
                    assert_eq!(total, (UPLOAD_CHUNK_SIZE + 16) as u64);
                    last = bytes;
                }
                UploadProgress::Done(address) => {
                    assert_eq!(address, expected);
                    break;
                }
                UploadProgress::Failed(e) => panic!("unexpected failure: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn injected_upload_failure_terminates_stream() {
        let store = MemoryStore::new();
        store.fail_upload_after(1).await;

        let mut rx = store.upload_binary(Bytes::from(vec![0u8; 64])).await;
        match rx.recv().await {
            Some(UploadProgress::Failed(_)) => {}
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failed_subscription_delivers_error_once() {
        let store = MemoryStore::new();
        let (handle, mut rx) = store
            .subscribe(
                CollectionPath::Posts,
                Predicate::All,
                SortSpec::timestamp_desc(),
            )
            .await
            .unwrap();
        let _ = recv(&mut rx).await;

        store.fail_subscription(handle).await;
        assert!(rx.recv().await.expect("error delivery").is_err());
        assert!(rx.recv().await.is_none());
        assert_eq!(store.subscriber_count().await, 0);
    }
}
