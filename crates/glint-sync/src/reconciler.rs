//! Marks notification documents read as a side effect of materializing the
//! notification view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::json;
use tracing::debug;

use glint_remote::RemoteStore;
use glint_shared::{CollectionPath, Document, DocumentId, Fields};

/// Issues exactly one `read = true` mutation per unread notification per
/// observation session.
///
/// Fire-and-forget: a failed mutation is logged and dropped; the document
/// still shows `read = false` on the next session, which retries naturally.
pub struct ReadReconciler {
    remote: Arc<dyn RemoteStore>,
    reconciled: StdMutex<HashSet<DocumentId>>,
}

impl ReadReconciler {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            reconciled: StdMutex::new(HashSet::new()),
        }
    }

    /// Mark every not-yet-reconciled unread document in `snapshot` read.
    /// Returns the number of mutations issued.
    pub async fn mark_read(&self, snapshot: &[Document]) -> usize {
        let targets: Vec<DocumentId> = {
            let Ok(mut reconciled) = self.reconciled.lock() else {
                return 0;
            };
            snapshot
                .iter()
                .filter(|doc| !doc.bool_field("read"))
                .map(|doc| doc.id)
                .filter(|id| reconciled.insert(*id))
                .collect()
        };

        for id in &targets {
            let mut partial = Fields::new();
            partial.insert("read".into(), json!(true));
            if let Err(error) = self
                .remote
                .update(CollectionPath::Notifications, *id, partial)
                .await
            {
                // Swallowed; the next observation session retries.
                debug!(%id, %error, "read-state mutation failed");
            }
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use glint_remote::MemoryStore;
    use glint_shared::Predicate;
    use glint_shared::SortSpec;

    fn unread_fields(user: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("userId".into(), json!(user));
        fields.insert("type".into(), json!("like"));
        fields.insert("fromUsername".into(), json!("bob"));
        fields.insert("read".into(), json!(false));
        fields
    }

    #[tokio::test]
    async fn marks_each_unread_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                store
                    .seed(CollectionPath::Notifications, unread_fields("u1"), Utc::now())
                    .await,
            );
        }

        let reconciler = ReadReconciler::new(Arc::clone(&store) as Arc<dyn RemoteStore>);
        let snapshot = store
            .query(
                CollectionPath::Notifications,
                Predicate::All,
                SortSpec::timestamp_desc(),
                usize::MAX,
            )
            .await
            .unwrap();

        assert_eq!(reconciler.mark_read(&snapshot).await, 3);
        for id in &ids {
            let doc = store
                .document(&CollectionPath::Notifications, *id)
                .await
                .unwrap();
            assert!(doc.bool_field("read"));
        }

        // Re-delivery of the same identifiers before their own read
        // mutations propagate back: zero additional writes.
        assert_eq!(reconciler.mark_read(&snapshot).await, 0);
    }

    #[tokio::test]
    async fn update_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .seed(CollectionPath::Notifications, unread_fields("u1"), Utc::now())
            .await;

        let reconciler = ReadReconciler::new(Arc::clone(&store) as Arc<dyn RemoteStore>);
        store.fail_next_update().await;

        let snapshot = vec![store
            .document(&CollectionPath::Notifications, id)
            .await
            .unwrap()];
        // Still counted as issued; the failure is dropped on the floor.
        assert_eq!(reconciler.mark_read(&snapshot).await, 1);

        let doc = store
            .document(&CollectionPath::Notifications, id)
            .await
            .unwrap();
        assert!(!doc.bool_field("read"));
    }
}
