use glint_shared::{Document, DocumentId};

use crate::error::RemoteError;

/// One change observed by a subscription.
///
/// Events arrive in batches; batches for a given subscription are causally
/// ordered, but a single batch carries its events in arbitrary order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Added(Document),
    Modified(Document),
    Removed(DocumentId),
}

/// One delivery on a subscription channel: a batch of changes, or the
/// transport failure that terminates the stream.
pub type BatchResult = Result<Vec<ChangeEvent>, RemoteError>;
