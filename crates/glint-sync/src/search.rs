//! Debounced, sequence-gated typeahead search.
//!
//! Every term change cancels the pending delayed dispatch and schedules a
//! new one after the quiet period. When the quiet period elapses the query
//! is issued under the next monotonic sequence number; a response applies
//! only if its number still equals the latest issued, so a slow response to
//! an earlier keystroke can never overwrite results for a later one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use glint_remote::{RemoteError, RemoteStore};
use glint_shared::constants::{MIN_SEARCH_TERM_LEN, SEARCH_DEBOUNCE_MS, SEARCH_RESULT_LIMIT};
use glint_shared::{CollectionPath, Document, Predicate, SortSpec};

/// Results applied for one search dispatch.
#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Sequence number of the winning query.
    pub seq: u64,
    pub documents: Vec<Document>,
}

/// Receives applied (never stale) search results.
pub type ResultSink = Arc<dyn Fn(SearchResults) + Send + Sync>;

/// Receives search query transport errors, one per failed dispatch.
pub type SearchErrorSink = Arc<dyn Fn(RemoteError) + Send + Sync>;

/// What to search and how to order it.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub path: CollectionPath,
    /// Field the typed prefix is matched against.
    pub field: String,
    pub sort: SortSpec,
    pub limit: usize,
    pub debounce: Duration,
    pub min_term_len: usize,
}

impl SearchConfig {
    /// Username typeahead over the `users` collection.
    pub fn users() -> Self {
        Self {
            path: CollectionPath::Users,
            field: "username".into(),
            sort: SortSpec::field_asc("username"),
            limit: SEARCH_RESULT_LIMIT,
            debounce: Duration::from_millis(SEARCH_DEBOUNCE_MS),
            min_term_len: MIN_SEARCH_TERM_LEN,
        }
    }
}

pub struct SearchSequencer {
    remote: Arc<dyn RemoteStore>,
    config: SearchConfig,
    sink: ResultSink,
    on_error: SearchErrorSink,
    /// Highest sequence number issued so far.
    latest: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    /// The one pending quiet-period timer, if any.
    pending: StdMutex<Option<JoinHandle<()>>>,
}

impl SearchSequencer {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        config: SearchConfig,
        sink: ResultSink,
        on_error: SearchErrorSink,
    ) -> Self {
        Self {
            remote,
            config,
            sink,
            on_error,
            latest: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            pending: StdMutex::new(None),
        }
    }

    /// React to the caller's current term.
    ///
    /// Terms below the minimum length clear results immediately, without
    /// waiting for the quiet period; anything in flight becomes stale.
    pub fn set_term(&self, term: &str) {
        self.cancel_pending();
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let term = term.trim().to_lowercase();
        // Character count, not byte length: one multibyte character is
        // still one character of input.
        if term.chars().count() < self.config.min_term_len {
            let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(seq, "term below minimum length, clearing results");
            (self.sink)(SearchResults {
                seq,
                documents: Vec::new(),
            });
            return;
        }

        let remote = Arc::clone(&self.remote);
        let config = self.config.clone();
        let sink = Arc::clone(&self.sink);
        let on_error = Arc::clone(&self.on_error);
        let latest = Arc::clone(&self.latest);
        let shutdown = Arc::clone(&self.shutdown);

        let timer = tokio::spawn(async move {
            tokio::time::sleep(config.debounce).await;
            if shutdown.load(Ordering::SeqCst) {
                return;
            }

            // Quiet period elapsed: this dispatch gets the next sequence
            // number and runs detached, so it can lose the sequence race
            // but can no longer be cancelled by the timer.
            let seq = latest.fetch_add(1, Ordering::SeqCst) + 1;
            let predicate = Predicate::Prefix(config.field.clone(), term.clone());
            tokio::spawn(async move {
                let result = remote
                    .query(config.path, predicate, config.sort, config.limit)
                    .await;
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                match result {
                    Ok(documents) => {
                        if latest.load(Ordering::SeqCst) == seq {
                            debug!(seq, term = %term, hits = documents.len(), "applying results");
                            sink(SearchResults { seq, documents });
                        } else {
                            // Lost the sequence race; deliberate silent drop.
                            debug!(seq, term = %term, "discarding stale results");
                        }
                    }
                    Err(error) => {
                        if latest.load(Ordering::SeqCst) == seq {
                            warn!(seq, %error, "search query failed");
                            on_error(error);
                        }
                    }
                }
            });
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(timer);
        }
    }

    /// Cancel the pending dispatch and make any in-flight response handling
    /// a no-op. Idempotent; the sequencer is not restartable afterwards.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancel_pending();
    }

    fn cancel_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(timer) = pending.take() {
                timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use glint_remote::{BatchResult, ContentAddress, StreamHandle, UploadProgress};
    use glint_shared::{DocumentId, Fields};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    /// Remote whose query latency is scripted per term, so responses can be
    /// made to complete out of order under a paused clock.
    struct ScriptedRemote {
        latencies: HashMap<String, Duration>,
        issued: Arc<AtomicU64>,
    }

    impl ScriptedRemote {
        fn new(latencies: &[(&str, u64)]) -> Self {
            Self {
                latencies: latencies
                    .iter()
                    .map(|(term, ms)| (term.to_string(), Duration::from_millis(*ms)))
                    .collect(),
                issued: Arc::new(AtomicU64::new(0)),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedRemote {
        async fn subscribe(
            &self,
            _path: CollectionPath,
            _predicate: Predicate,
            _sort: SortSpec,
        ) -> Result<(StreamHandle, mpsc::Receiver<BatchResult>), RemoteError> {
            Err(RemoteError::Transport("not scripted".into()))
        }

        async fn unsubscribe(&self, _handle: StreamHandle) {}

        async fn query(
            &self,
            _path: CollectionPath,
            predicate: Predicate,
            _sort: SortSpec,
            _limit: usize,
        ) -> Result<Vec<Document>, RemoteError> {
            self.issued.fetch_add(1, Ordering::SeqCst);
            let Predicate::Prefix(_, term) = predicate else {
                return Err(RemoteError::Transport("unexpected predicate".into()));
            };
            if let Some(latency) = self.latencies.get(&term) {
                tokio::time::sleep(*latency).await;
            }
            let mut fields = Fields::new();
            fields.insert("username".into(), json!(term));
            Ok(vec![Document::new(
                DocumentId::new(),
                fields,
                glint_shared::Timestamp::Pending,
            )])
        }

        async fn write(
            &self,
            _path: CollectionPath,
            _fields: Fields,
        ) -> Result<DocumentId, RemoteError> {
            Err(RemoteError::Transport("not scripted".into()))
        }

        async fn update(
            &self,
            _path: CollectionPath,
            _id: DocumentId,
            _partial: Fields,
        ) -> Result<(), RemoteError> {
            Err(RemoteError::Transport("not scripted".into()))
        }

        async fn upload_binary(&self, payload: Bytes) -> mpsc::Receiver<UploadProgress> {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(UploadProgress::Done(ContentAddress::for_bytes(&payload)));
            rx
        }
    }

    fn sequencer(
        remote: Arc<ScriptedRemote>,
    ) -> (SearchSequencer, Arc<StdMutex<Vec<SearchResults>>>) {
        let applied = Arc::new(StdMutex::new(Vec::new()));
        let recorded = Arc::clone(&applied);
        let sink: ResultSink = Arc::new(move |results| {
            if let Ok(mut guard) = recorded.lock() {
                guard.push(results);
            }
        });
        let seq = SearchSequencer::new(
            remote as Arc<dyn RemoteStore>,
            SearchConfig::users(),
            sink,
            Arc::new(|_| {}),
        );
        (seq, applied)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_earlier_response_never_overwrites_later_results() {
        let remote = Arc::new(ScriptedRemote::new(&[("a!", 5_000), ("ab", 10)]));
        let (sequencer, applied) = sequencer(Arc::clone(&remote));

        // "a!" dispatches after the quiet period and stalls for 5 s.
        sequencer.set_term("a!");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(remote.issued.load(Ordering::SeqCst), 1);

        // "ab" dispatches and resolves long before "a!" does.
        sequencer.set_term("ab");
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Now let "a!"'s response complete; it lost the race.
        tokio::time::sleep(Duration::from_secs(6)).await;

        let applied = applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].documents[0].str_field("username"), Some("ab"));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_coalesces_into_one_dispatch() {
        let remote = Arc::new(ScriptedRemote::new(&[("abc", 1)]));
        let (sequencer, applied) = sequencer(Arc::clone(&remote));

        sequencer.set_term("ab");
        tokio::time::sleep(Duration::from_millis(100)).await;
        sequencer.set_term("abc");
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(remote.issued.load(Ordering::SeqCst), 1);
        assert_eq!(applied.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn short_term_clears_immediately_without_timer() {
        let remote = Arc::new(ScriptedRemote::new(&[]));
        let (sequencer, applied) = sequencer(Arc::clone(&remote));

        sequencer.set_term("a");

        // No time has passed: the clear is already applied.
        let applied_now = applied.lock().unwrap().clone();
        assert_eq!(applied_now.len(), 1);
        assert!(applied_now[0].documents.is_empty());
        assert_eq!(remote.issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn multibyte_single_character_is_below_minimum() {
        // "é" is two bytes but one character of input.
        let remote = Arc::new(ScriptedRemote::new(&[]));
        let (sequencer, applied) = sequencer(Arc::clone(&remote));

        sequencer.set_term("é");
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(remote.issued.load(Ordering::SeqCst), 0);
        let applied = applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].documents.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_makes_scheduled_dispatch_a_noop() {
        let remote = Arc::new(ScriptedRemote::new(&[("ab", 1)]));
        let (sequencer, applied) = sequencer(Arc::clone(&remote));

        sequencer.set_term("ab");
        sequencer.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(remote.issued.load(Ordering::SeqCst), 0);
        assert!(applied.lock().unwrap().is_empty());
    }
}
