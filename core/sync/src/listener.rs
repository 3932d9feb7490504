//! Host-environment capabilities consumed by the provider.

use prefsync_common::{Error, Result};

/// Receives a notification whenever remote changes require a settings
/// re-sync. Implementations forward to the host's listener bus.
pub trait SyncListener: Send + Sync {
    fn sync_required(&self);
}

/// Opens the OAuth authorization page in a tab or browser window.
pub trait TabOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Default opener using the system browser.
pub struct BrowserTabOpener;

impl TabOpener for BrowserTabOpener {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url).map_err(Error::Io)
    }
}
