use bytes::Bytes;
use chrono::Utc;

use glint_shared::constants::MAX_IMAGE_SIZE;

use crate::error::UploadError;

/// A file the user committed for upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadPayload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Bytes,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Unique remote object name: `{unix_millis}_{file_name}`.
    pub fn object_name(&self) -> String {
        format!("{}_{}", Utc::now().timestamp_millis(), self.file_name)
    }

    /// Check the pre-transfer preconditions: image MIME category and the
    /// size ceiling. Violations fail before any transfer begins.
    pub fn validate(&self) -> Result<(), UploadError> {
        if !self.mime_type.starts_with("image/") {
            return Err(UploadError::Validation(format!(
                "Not an image: {}",
                self.mime_type
            )));
        }
        if self.data.len() > MAX_IMAGE_SIZE {
            return Err(UploadError::Validation(format!(
                "Image too large: {} bytes (max {})",
                self.data.len(),
                MAX_IMAGE_SIZE
            )));
        }
        Ok(())
    }
}
