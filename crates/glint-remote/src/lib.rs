//! Remote store collaborator contract and the in-memory implementation.
//!
//! The rest of the client core only ever talks to [`RemoteStore`]; the
//! production transport lives behind that trait, and [`MemoryStore`] stands
//! in for it in tests and local development.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use error::RemoteError;
pub use event::{BatchResult, ChangeEvent};
pub use memory::MemoryStore;
pub use store::{ContentAddress, RemoteStore, StreamHandle, UploadProgress};
