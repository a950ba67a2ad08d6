//! Subscription lifecycle management.
//!
//! The [`SubscriptionManager`] enforces at-most-one active subscription per
//! logical key. Each subscription runs a delivery task that forwards change
//! batches from the remote channel to its batch sink; before every dispatch
//! the task re-checks, under the registry lock, that its generation is still
//! the one registered for the key. `close` and `replace` take that same
//! lock, so once either returns no late batch can reach a sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use glint_remote::{ChangeEvent, RemoteError, RemoteStore, StreamHandle};
use glint_shared::QueryDescriptor;

use crate::error::SyncError;

/// Logical identity of a view's subscription. The message pane and the
/// profile pane each hold a single key; switching conversations or profiles
/// replaces the descriptor under the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    Feed,
    Conversations,
    Messages,
    Notifications,
    ProfilePosts,
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Feed => "feed",
            Self::Conversations => "conversations",
            Self::Messages => "messages",
            Self::Notifications => "notifications",
            Self::ProfilePosts => "profile-posts",
        };
        write!(f, "{name}")
    }
}

/// Handle to one opened subscription. Stale handles (superseded by a
/// `replace` under the same key) close nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub key: SubscriptionKey,
    generation: u64,
}

/// Receives each change batch for one subscription.
pub type BatchSink = Box<dyn Fn(Vec<ChangeEvent>) + Send + Sync>;

/// Receives transport errors, once per failed subscription.
pub type ErrorSink = Arc<dyn Fn(SubscriptionKey, RemoteError) + Send + Sync>;

struct ActiveSub {
    generation: u64,
    descriptor: QueryDescriptor,
    stream: StreamHandle,
    task: Option<JoinHandle<()>>,
}

type Registry = Mutex<HashMap<SubscriptionKey, ActiveSub>>;

/// Owns the lifecycle of all active subscriptions.
pub struct SubscriptionManager {
    remote: Arc<dyn RemoteStore>,
    registry: Arc<Registry>,
    on_error: ErrorSink,
    next_generation: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(remote: Arc<dyn RemoteStore>, on_error: ErrorSink) -> Self {
        Self {
            remote,
            registry: Arc::new(Mutex::new(HashMap::new())),
            on_error,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Open a subscription under `key`.
    ///
    /// Re-opening with a descriptor identical to the live one is a no-op
    /// returning the existing handle. A differing descriptor behaves like
    /// [`SubscriptionManager::replace`].
    pub async fn open(
        &self,
        key: SubscriptionKey,
        descriptor: QueryDescriptor,
        on_batch: BatchSink,
    ) -> Result<SubscriptionHandle, SyncError> {
        self.replace(key, descriptor, on_batch).await
    }

    /// Atomically close any subscription under `key` and open a new one.
    /// No window exists in which both deliver events.
    pub async fn replace(
        &self,
        key: SubscriptionKey,
        descriptor: QueryDescriptor,
        on_batch: BatchSink,
    ) -> Result<SubscriptionHandle, SyncError> {
        let mut registry = self.registry.lock().await;

        if let Some(existing) = registry.get(&key) {
            if existing.descriptor == descriptor {
                debug!(%key, "subscription already live, reusing");
                return Ok(SubscriptionHandle {
                    key,
                    generation: existing.generation,
                });
            }
        }
        if let Some(previous) = registry.remove(&key) {
            Self::teardown(&self.remote, previous).await;
        }

        let (stream, mut rx) = self
            .remote
            .subscribe(
                descriptor.path.clone(),
                descriptor.predicate.clone(),
                descriptor.sort.clone(),
            )
            .await?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        registry.insert(
            key.clone(),
            ActiveSub {
                generation,
                descriptor,
                stream,
                task: None,
            },
        );

        let task_registry = Arc::clone(&self.registry);
        let task_key = key.clone();
        let on_error = Arc::clone(&self.on_error);
        let task = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match delivery {
                    Ok(batch) => {
                        let guard = task_registry.lock().await;
                        let live = guard
                            .get(&task_key)
                            .is_some_and(|sub| sub.generation == generation);
                        if !live {
                            debug!(key = %task_key, "dropping batch for superseded subscription");
                            break;
                        }
                        // Dispatch under the registry lock: close/replace
                        // cannot interleave with an in-flight batch.
                        on_batch(batch);
                    }
                    Err(error) => {
                        let mut guard = task_registry.lock().await;
                        let live = guard
                            .get(&task_key)
                            .is_some_and(|sub| sub.generation == generation);
                        if live {
                            guard.remove(&task_key);
                            drop(guard);
                            warn!(key = %task_key, %error, "subscription failed");
                            on_error(task_key.clone(), error);
                        }
                        break;
                    }
                }
            }
        });
        if let Some(sub) = registry.get_mut(&key) {
            sub.task = Some(task);
        }

        debug!(%key, generation, "subscription opened");
        Ok(SubscriptionHandle { key, generation })
    }

    /// Close a subscription. Guarantees no further batch dispatch for this
    /// handle once the call returns; stale handles are ignored.
    pub async fn close(&self, handle: &SubscriptionHandle) {
        let mut registry = self.registry.lock().await;
        let current = registry
            .get(&handle.key)
            .is_some_and(|sub| sub.generation == handle.generation);
        if !current {
            return;
        }
        if let Some(sub) = registry.remove(&handle.key) {
            Self::teardown(&self.remote, sub).await;
            debug!(key = %handle.key, "subscription closed");
        }
    }

    /// Close whatever subscription is registered under `key`, if any.
    pub async fn close_key(&self, key: &SubscriptionKey) {
        let mut registry = self.registry.lock().await;
        if let Some(sub) = registry.remove(key) {
            Self::teardown(&self.remote, sub).await;
            debug!(%key, "subscription closed");
        }
    }

    /// Close every active subscription.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        for (key, sub) in registry.drain() {
            debug!(%key, "subscription closed at shutdown");
            Self::teardown(&self.remote, sub).await;
        }
    }

    /// Number of active subscriptions.
    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    async fn teardown(remote: &Arc<dyn RemoteStore>, sub: ActiveSub) {
        remote.unsubscribe(sub.stream).await;
        if let Some(task) = sub.task {
            task.abort();
        }
    }
}
