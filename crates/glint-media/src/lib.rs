//! Binary upload pipeline.
//!
//! Validates image payloads, drives the chunked transfer with progress
//! reporting, and performs the dependent metadata-publish write that turns
//! a stored binary into a visible post.

pub mod error;
pub mod payload;
pub mod upload;

pub use error::UploadError;
pub use payload::UploadPayload;
pub use upload::{UploadPipeline, UploadSnapshot, UploadState, UploadTask};
