//! Google Drive settings-sync provider.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use prefsync_common::Result;
use prefsync_drive::{AppDataApi, AuthManager, DriveFile, TokenManager};

use crate::listener::{SyncListener, TabOpener};
use crate::poller::{PollState, Poller, PollerConfig, PollerHandle};
use crate::state::FolderState;

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Redirect URI embedded in the authorization URL.
    pub redirect_uri: String,
    /// Poll timing.
    pub poll: PollerConfig,
}

impl ProviderConfig {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            poll: PollerConfig::default(),
        }
    }
}

/// Settings-sync provider backed by the Drive app-data space.
///
/// All collaborators are injected so independent sync sessions can
/// coexist and tests can substitute any seam.
pub struct DriveSyncProvider {
    api: Arc<dyn AppDataApi>,
    auth: Arc<AuthManager>,
    tokens: Arc<TokenManager>,
    state: Arc<RwLock<FolderState>>,
    listener: Arc<dyn SyncListener>,
    tab_opener: Arc<dyn TabOpener>,
    config: ProviderConfig,
    poller: Mutex<Option<PollerHandle>>,
}

impl DriveSyncProvider {
    /// Create a new provider. Nothing is contacted until [`init`].
    ///
    /// [`init`]: DriveSyncProvider::init
    pub fn new(
        api: Arc<dyn AppDataApi>,
        auth: Arc<AuthManager>,
        tokens: Arc<TokenManager>,
        listener: Arc<dyn SyncListener>,
        tab_opener: Arc<dyn TabOpener>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            api,
            auth,
            tokens,
            state: Arc::new(RwLock::new(FolderState::new())),
            listener,
            tab_opener,
            config,
            poller: Mutex::new(None),
        }
    }

    /// Provider name, as registered with the sync orchestrator.
    pub fn name(&self) -> &str {
        "gdrive"
    }

    /// Initialize the provider and start change polling.
    ///
    /// When `security_token` is supplied it must match the nonce staged
    /// by the last authorization-URL build; a mismatch aborts the call
    /// (logged, not an error) and leaves all token state untouched.
    ///
    /// An explicit `token` wins and is persisted; otherwise the
    /// previously persisted token is loaded. With a token in hand
    /// polling starts, without one the authorization page is opened.
    pub async fn init(&self, token: Option<String>, security_token: Option<String>) -> Result<()> {
        if let Some(provided) = security_token {
            if !self.auth.verify_security_token(&provided) {
                warn!("Security token mismatch, ignoring init request");
                return Ok(());
            }
        }

        let token = match token {
            Some(token) => {
                self.tokens.set_token(&token).await?;
                Some(token)
            }
            None => self.tokens.load_persisted().await?,
        };

        if token.is_some() {
            self.start_polling();
        } else {
            info!("No access token available, requesting authorization");
            let url = self.auth.authorization_url(&self.config.redirect_uri)?;
            self.tab_opener.open(&url)?;
        }

        Ok(())
    }

    /// Stop polling and drop the in-memory token. The persisted token is
    /// left intact so a later `init` can resume without re-authorizing.
    pub async fn shutdown(&self) {
        self.stop_polling();
        self.tokens.clear_memory().await;
    }

    /// True iff a token is currently held in memory.
    pub async fn is_authorized(&self) -> bool {
        self.tokens.is_authorized().await
    }

    /// Revoke the token remotely and clear it everywhere.
    pub async fn logout(&self) -> Result<()> {
        self.api.revoke_token().await?;
        self.tokens.invalidate().await
    }

    /// Load a settings file by name.
    ///
    /// Resolves the name against a fresh full listing; `Ok(None)` when
    /// no such file exists.
    pub async fn load(&self, name: &str) -> Result<Option<Value>> {
        match self.resolve_file_id(name).await? {
            Some(id) => Ok(Some(self.api.download_file(&id).await?)),
            None => Ok(None),
        }
    }

    /// Save a settings file by name, creating or updating as needed, and
    /// record the uploaded metadata in the folder state.
    pub async fn save(&self, name: &str, data: &Value) -> Result<DriveFile> {
        let file_id = self.resolve_file_id(name).await?;
        let file = self.api.upload_file(file_id.as_deref(), name, data).await?;
        self.state.write().await.record_file(file.clone());
        Ok(file)
    }

    /// Current poll loop position.
    pub fn poll_state(&self) -> PollState {
        self.poller
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.state())
            .unwrap_or(PollState::Idle)
    }

    /// Resolve a file name to its Drive id via a fresh full listing,
    /// refreshing the folder state along the way.
    async fn resolve_file_id(&self, name: &str) -> Result<Option<String>> {
        let files = self.api.list_files().await?;
        let mut state = self.state.write().await;
        state.record_listing(files);
        Ok(state.file_id(name).map(str::to_string))
    }

    fn start_polling(&self) {
        let mut slot = self.poller.lock().unwrap();

        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!("Change poller already running");
                return;
            }
        }

        *slot = Some(Poller::spawn(
            self.api.clone(),
            self.state.clone(),
            self.listener.clone(),
            self.config.poll.clone(),
        ));
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().unwrap().take() {
            handle.cancel();
        }
    }
}
