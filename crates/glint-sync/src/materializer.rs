//! Folds change batches into ordered, deduplicated view state.

use std::collections::HashSet;
use std::sync::Arc;

use glint_remote::ChangeEvent;
use glint_shared::{Document, SortSpec};

/// Immutable view state snapshot handed to consumers. Consumers replace
/// their prior reference wholesale; snapshots are never patched in place.
pub type ViewSnapshot = Arc<Vec<Document>>;

/// Maintains the view state for one subscription.
///
/// Exactly one entry per live document identifier; entries ordered by the
/// subscription's sort spec (pending timestamps newest, identifier as the
/// stable tie-break).
pub struct Materializer {
    sort: SortSpec,
    current: ViewSnapshot,
}

impl Materializer {
    pub fn new(sort: SortSpec) -> Self {
        Self {
            sort,
            current: Arc::new(Vec::new()),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ViewSnapshot {
        Arc::clone(&self.current)
    }

    /// Apply one batch. Returns the new snapshot if the view state actually
    /// changed, `None` for empty or no-op batches (content equality by
    /// identifier + timestamp + fields, not by reference).
    pub fn apply(&mut self, batch: &[ChangeEvent]) -> Option<ViewSnapshot> {
        if batch.is_empty() {
            return None;
        }

        let mut next: Vec<Document> = (*self.current).clone();

        // Removals first, then upserts, then a whole-sequence re-sort.
        let removed: HashSet<_> = batch
            .iter()
            .filter_map(|event| match event {
                ChangeEvent::Removed(id) => Some(*id),
                _ => None,
            })
            .collect();
        if !removed.is_empty() {
            next.retain(|doc| !removed.contains(&doc.id));
        }

        for event in batch {
            let doc = match event {
                ChangeEvent::Added(doc) | ChangeEvent::Modified(doc) => doc,
                ChangeEvent::Removed(_) => continue,
            };
            match next.iter_mut().find(|entry| entry.id == doc.id) {
                Some(entry) => *entry = doc.clone(),
                None => next.push(doc.clone()),
            }
        }

        next.sort_by(|a, b| self.sort.cmp(a, b));

        if next == *self.current {
            return None;
        }
        self.current = Arc::new(next);
        Some(Arc::clone(&self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use glint_shared::{DocumentId, Fields, Timestamp};
    use serde_json::json;

    fn doc(id: DocumentId, caption: &str, timestamp: Timestamp) -> Document {
        let mut fields = Fields::new();
        fields.insert("caption".into(), json!(caption));
        Document::new(id, fields, timestamp)
    }

    fn committed(secs: i64) -> Timestamp {
        Timestamp::Committed(Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn upsert_by_identifier_never_duplicates() {
        let mut materializer = Materializer::new(SortSpec::timestamp_desc());
        let id = DocumentId::new();

        let batch = vec![ChangeEvent::Added(doc(id, "v1", committed(100)))];
        materializer.apply(&batch).expect("first apply changes state");

        // Same batch again: idempotent, no new snapshot.
        assert!(materializer.apply(&batch).is_none());
        assert_eq!(materializer.snapshot().len(), 1);

        // Modified upserts in place.
        let modified = vec![ChangeEvent::Modified(doc(id, "v2", committed(100)))];
        let snapshot = materializer.apply(&modified).expect("content changed");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].str_field("caption"), Some("v2"));
    }

    #[test]
    fn pending_document_sorts_newest() {
        let mut materializer = Materializer::new(SortSpec::timestamp_desc());
        let pending_id = DocumentId::new();
        let committed_id = DocumentId::new();

        let snapshot = materializer
            .apply(&[
                ChangeEvent::Added(doc(committed_id, "old", committed(100))),
                ChangeEvent::Added(doc(pending_id, "new", Timestamp::Pending)),
            ])
            .expect("state changed");

        assert_eq!(snapshot[0].id, pending_id);
        assert_eq!(snapshot[1].id, committed_id);
    }

    #[test]
    fn removals_apply_before_upserts() {
        let mut materializer = Materializer::new(SortSpec::timestamp_desc());
        let a = DocumentId::new();
        let b = DocumentId::new();
        materializer.apply(&[
            ChangeEvent::Added(doc(a, "a", committed(1))),
            ChangeEvent::Added(doc(b, "b", committed(2))),
        ]);

        // One batch removes `a` and re-adds it; the upsert must survive.
        let snapshot = materializer
            .apply(&[
                ChangeEvent::Removed(a),
                ChangeEvent::Removed(b),
                ChangeEvent::Added(doc(a, "a2", committed(3))),
            ])
            .expect("state changed");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, a);
        assert_eq!(snapshot[0].str_field("caption"), Some("a2"));
    }

    #[test]
    fn empty_batch_emits_nothing() {
        let mut materializer = Materializer::new(SortSpec::timestamp_desc());
        assert!(materializer.apply(&[]).is_none());

        materializer.apply(&[ChangeEvent::Added(doc(DocumentId::new(), "x", committed(1)))]);
        // Heartbeat after content exists: still nothing.
        assert!(materializer.apply(&[]).is_none());
    }

    #[test]
    fn removal_of_unknown_id_is_noop() {
        let mut materializer = Materializer::new(SortSpec::timestamp_desc());
        materializer.apply(&[ChangeEvent::Added(doc(DocumentId::new(), "x", committed(1)))]);
        assert!(materializer
            .apply(&[ChangeEvent::Removed(DocumentId::new())])
            .is_none());
    }
}
