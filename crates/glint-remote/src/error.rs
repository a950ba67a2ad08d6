use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Document not found")]
    NotFound,

    #[error("Binary upload aborted")]
    UploadAborted,
}
