use thiserror::Error;

use glint_remote::RemoteError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}
