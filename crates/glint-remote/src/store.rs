//! The abstract remote store contract.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use glint_shared::{CollectionPath, Document, DocumentId, Fields, Predicate, SortSpec};

use crate::error::RemoteError;
use crate::event::BatchResult;

/// Opaque handle to one live change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Content address assigned to an uploaded binary (blake3 of the payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentAddress([u8; 32]);

impl ContentAddress {
    pub fn for_bytes(payload: &[u8]) -> Self {
        Self(*blake3::hash(payload).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Addressable URL form, as stored in post metadata.
    pub fn url(&self) -> String {
        format!("blob://{}", self.to_hex())
    }
}

impl std::fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Progress report on a binary upload stream.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadProgress {
    Transferred { bytes: u64, total: u64 },
    Done(ContentAddress),
    Failed(RemoteError),
}

/// The remote document store, as seen by this client.
///
/// Subscriptions deliver [`BatchResult`]s on a channel: the initial batch is
/// the current matching set as `Added` events, later batches reflect
/// mutations. An `Err` delivery terminates the stream. Dropping the receiver
/// or calling [`RemoteStore::unsubscribe`] ends delivery.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a live change stream over an ordered query.
    async fn subscribe(
        &self,
        path: CollectionPath,
        predicate: Predicate,
        sort: SortSpec,
    ) -> Result<(StreamHandle, mpsc::Receiver<BatchResult>), RemoteError>;

    /// Tear down a change stream. Idempotent.
    async fn unsubscribe(&self, handle: StreamHandle);

    /// One-shot ordered query.
    async fn query(
        &self,
        path: CollectionPath,
        predicate: Predicate,
        sort: SortSpec,
        limit: usize,
    ) -> Result<Vec<Document>, RemoteError>;

    /// Append a document; the server assigns its identifier and commit
    /// timestamp. Live subscribers observe the document first with a
    /// pending timestamp, then committed.
    async fn write(&self, path: CollectionPath, fields: Fields) -> Result<DocumentId, RemoteError>;

    /// Merge partial fields into an existing document.
    async fn update(
        &self,
        path: CollectionPath,
        id: DocumentId,
        partial: Fields,
    ) -> Result<(), RemoteError>;

    /// Transfer a binary payload; the returned channel reports progress and
    /// ends with the content address or a failure.
    async fn upload_binary(&self, payload: Bytes) -> mpsc::Receiver<UploadProgress>;
}
