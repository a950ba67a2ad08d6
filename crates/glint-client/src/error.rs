use thiserror::Error;

use glint_media::UploadError;
use glint_remote::RemoteError;
use glint_sync::SyncError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No conversation selected")]
    NoConversationSelected,

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}
