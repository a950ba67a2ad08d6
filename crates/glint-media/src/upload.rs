//! The two-phase resumable upload pipeline.
//!
//! Phase one transfers the binary through [`RemoteStore::upload_binary`],
//! publishing monotone progress on a watch channel. Phase two writes the
//! metadata document referencing the binary's content address. The task
//! reaches `Completed` only after both phases succeed; a publish failure
//! after a successful transfer ends in `Failed` with the binary left
//! orphaned remotely (accepted, no compensating cleanup).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use glint_remote::{ContentAddress, RemoteError, RemoteStore, UploadProgress};
use glint_shared::{CollectionPath, Fields};

use crate::error::UploadError;
use crate::payload::UploadPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Pending,
    Transferring,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Observable state of one upload task.
#[derive(Debug, Clone)]
pub struct UploadSnapshot {
    pub state: UploadState,
    /// Monotonically non-decreasing fraction in `[0, 1]`.
    pub progress: f64,
    /// Set once the binary transfer completed, including on a later
    /// publish failure (it names the orphaned object).
    pub content_address: Option<ContentAddress>,
    pub error: Option<String>,
}

impl UploadSnapshot {
    fn pending() -> Self {
        Self {
            state: UploadState::Pending,
            progress: 0.0,
            content_address: None,
            error: None,
        }
    }
}

struct Shared {
    tx: watch::Sender<UploadSnapshot>,
    cancelled: AtomicBool,
}

impl Shared {
    /// Apply a state change unless the task is already terminal or
    /// cancelled. Every driver-side mutation goes through here, so a
    /// cancelled task never reports progress or a terminal state again.
    fn transition(&self, apply: impl FnOnce(&mut UploadSnapshot)) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.tx.send_modify(|snapshot| {
            if snapshot.state.is_terminal() {
                return;
            }
            apply(snapshot);
        });
    }
}

/// One binary transfer plus its dependent metadata publish.
pub struct UploadTask {
    id: Uuid,
    shared: Arc<Shared>,
    driver: JoinHandle<()>,
}

impl UploadTask {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> UploadSnapshot {
        self.shared.tx.borrow().clone()
    }

    /// Watch channel for progress and terminal-state updates.
    pub fn subscribe(&self) -> watch::Receiver<UploadSnapshot> {
        self.shared.tx.subscribe()
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait_terminal(&self) -> UploadSnapshot {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|snapshot| snapshot.state.is_terminal()).await {
            Ok(snapshot) => snapshot.clone(),
            // Sender kept alive by `self.shared`; unreachable in practice.
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Cancel the task. Valid while not yet terminal; afterwards a no-op
    /// returning `false`. After cancellation no further progress or
    /// terminal callback fires.
    pub fn cancel(&self) -> bool {
        if self.shared.tx.borrow().state.is_terminal() {
            return false;
        }
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.driver.abort();
        self.shared.tx.send_modify(|snapshot| {
            if !snapshot.state.is_terminal() {
                snapshot.state = UploadState::Cancelled;
            }
        });
        debug!(id = %self.id, "upload cancelled");
        true
    }
}

/// Drives uploads against the remote store.
pub struct UploadPipeline {
    remote: Arc<dyn RemoteStore>,
}

impl UploadPipeline {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Validate and start an upload.
    ///
    /// Validation violations fail synchronously, before any transfer
    /// begins. `post_fields` is the metadata document to publish into
    /// `collection` once the transfer completes; the pipeline adds the
    /// `imageUrl` and `storagePath` fields itself.
    pub fn start(
        &self,
        payload: UploadPayload,
        collection: CollectionPath,
        post_fields: Fields,
    ) -> Result<UploadTask, UploadError> {
        payload.validate()?;

        let id = Uuid::new_v4();
        let (tx, _) = watch::channel(UploadSnapshot::pending());
        let shared = Arc::new(Shared {
            tx,
            cancelled: AtomicBool::new(false),
        });

        let remote = Arc::clone(&self.remote);
        let task_shared = Arc::clone(&shared);
        let driver = tokio::spawn(async move {
            drive(remote, task_shared, id, payload, collection, post_fields).await;
        });

        info!(%id, "upload started");
        Ok(UploadTask { id, shared, driver })
    }
}

async fn drive(
    remote: Arc<dyn RemoteStore>,
    shared: Arc<Shared>,
    id: Uuid,
    payload: UploadPayload,
    collection: CollectionPath,
    mut post_fields: Fields,
) {
    let object_name = payload.object_name();
    shared.transition(|snapshot| snapshot.state = UploadState::Transferring);

    let mut progress_rx = remote.upload_binary(payload.data).await;
    let mut address: Option<ContentAddress> = None;
    while let Some(progress) = progress_rx.recv().await {
        match progress {
            UploadProgress::Transferred { bytes, total } => {
                let fraction = if total == 0 {
                    1.0
                } else {
                    bytes as f64 / total as f64
                };
                shared.transition(|snapshot| {
                    if fraction > snapshot.progress {
                        snapshot.progress = fraction;
                    }
                });
            }
            UploadProgress::Done(done) => {
                address = Some(done);
                break;
            }
            UploadProgress::Failed(error) => {
                warn!(%id, %error, "binary transfer failed");
                shared.transition(|snapshot| {
                    snapshot.state = UploadState::Failed;
                    snapshot.error = Some(UploadError::Transfer(error).to_string());
                });
                return;
            }
        }
    }

    let Some(address) = address else {
        shared.transition(|snapshot| {
            snapshot.state = UploadState::Failed;
            snapshot.error = Some(UploadError::Transfer(RemoteError::UploadAborted).to_string());
        });
        return;
    };

    // Phase two: publish the metadata document referencing the binary.
    post_fields.insert("imageUrl".into(), json!(address.url()));
    post_fields.insert("storagePath".into(), json!(format!("images/{object_name}")));
    match remote.write(collection, post_fields).await {
        Ok(post_id) => {
            info!(%id, %post_id, address = %address, "upload completed");
            shared.transition(|snapshot| {
                snapshot.progress = 1.0;
                snapshot.content_address = Some(address);
                snapshot.state = UploadState::Completed;
            });
        }
        Err(error) => {
            // The binary stays stored remotely; accepted orphaning risk.
            warn!(%id, address = %address, %error, "metadata publish failed after transfer");
            shared.transition(|snapshot| {
                snapshot.content_address = Some(address);
                snapshot.state = UploadState::Failed;
                snapshot.error = Some(
                    UploadError::PartialCompletion {
                        address,
                        source: error,
                    }
                    .to_string(),
                );
            });
        }
    }
}
