//! Glint client facade.
//!
//! Wires the synchronization layer, the upload pipeline, and the remote
//! store into one [`GlintClient`] the UI layer drives. The UI receives
//! [`ViewEvent`]s carrying immutable view snapshots; it never touches the
//! subscription machinery directly.

pub mod client;
pub mod context;
pub mod error;
pub mod events;

pub use client::GlintClient;
pub use context::SessionContext;
pub use error::ClientError;
pub use events::ViewEvent;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise structured logging for the client process.
///
/// Honors `RUST_LOG`; defaults to debug for the client core and info for
/// the supporting crates.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("glint_client=debug,glint_sync=debug,glint_remote=info,glint_media=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
