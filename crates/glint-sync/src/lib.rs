//! Client-side synchronization layer.
//!
//! Sits between the remote change streams and the view layer: the
//! [`SubscriptionManager`] owns subscription lifecycles, the
//! [`Materializer`] folds change batches into ordered view snapshots, the
//! [`SearchSequencer`] debounces and sequence-gates typeahead queries, and
//! the [`ReadReconciler`] marks notifications read exactly once.

pub mod error;
pub mod materializer;
pub mod reconciler;
pub mod search;
pub mod subscriptions;

pub use error::SyncError;
pub use materializer::{Materializer, ViewSnapshot};
pub use reconciler::ReadReconciler;
pub use search::{SearchConfig, SearchResults, SearchSequencer};
pub use subscriptions::{SubscriptionHandle, SubscriptionKey, SubscriptionManager};
