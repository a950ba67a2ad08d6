//! Shared types for the Glint client core.
//!
//! This crate defines the document model exchanged with the remote store,
//! the query descriptors used to subscribe to it, and the typed field
//! projections the view layer decodes documents into.

pub mod constants;
pub mod document;
pub mod error;
pub mod query;
pub mod types;

pub use document::{Document, Fields, Timestamp};
pub use error::SharedError;
pub use query::{Direction, Predicate, QueryDescriptor, SortField, SortSpec};
pub use types::{CollectionPath, DocumentId, UserId};
