use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Field decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
