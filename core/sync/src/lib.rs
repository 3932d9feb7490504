//! Settings synchronization against Google Drive's app data folder.
//!
//! This module provides:
//! - The sync provider surface consumed by the orchestrator:
//!   `init`/`shutdown`/`is_authorized`/`logout`/`load`/`save`
//! - In-memory folder state (name-to-file map and change cursor)
//! - A self-rescheduling poller that watches the remote change log and
//!   raises "sync required" notifications
//! - Trait seams for the host environment's tab opening and listener bus

pub mod listener;
pub mod poller;
pub mod provider;
pub mod state;

// Re-export main types
pub use listener::{BrowserTabOpener, SyncListener, TabOpener};
pub use poller::{PollState, Poller, PollerConfig, PollerHandle};
pub use provider::{DriveSyncProvider, ProviderConfig};
pub use state::FolderState;
