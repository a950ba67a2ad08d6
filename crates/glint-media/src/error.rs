use thiserror::Error;

use glint_remote::{ContentAddress, RemoteError};

#[derive(Error, Debug, Clone)]
pub enum UploadError {
    /// Rejected before any network effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The binary transfer itself failed.
    #[error("Transfer failed: {0}")]
    Transfer(RemoteError),

    /// Binary transfer succeeded but the metadata publish failed, leaving
    /// an orphaned remote object at `address`. No automatic cleanup.
    #[error("Metadata publish failed after transfer (orphaned binary {address}): {source}")]
    PartialCompletion {
        address: ContentAddress,
        source: RemoteError,
    },
}
