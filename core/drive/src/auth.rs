//! OAuth2 implicit-flow authorization and bearer-token lifecycle.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use prefsync_common::{Error, Result};

/// OAuth2 client ID for the Drive API.
const GOOGLE_CLIENT_ID: &str = "YOUR_CLIENT_ID";
/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Token revocation endpoint.
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
/// Scope granting access to the hidden per-application folder only.
const APPDATA_SCOPE: &str = "https://www.googleapis.com/auth/drive.appdata";

/// Fixed key under which the bearer token is persisted.
pub const TOKEN_STORAGE_KEY: &str = "sync.gdrive.accessToken";

/// Configuration for OAuth2 authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Client ID (can be overridden from default).
    pub client_id: String,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Revocation endpoint.
    pub revoke_url: String,
    /// Requested scope.
    pub scope: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: GOOGLE_CLIENT_ID.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            revoke_url: GOOGLE_REVOKE_URL.to_string(),
            scope: APPDATA_SCOPE.to_string(),
        }
    }
}

/// Persistent key-value slot for the bearer token.
///
/// The host environment decides where tokens live (extension storage, a
/// config file, a keychain); the token manager only needs these three
/// operations against the fixed [`TOKEN_STORAGE_KEY`] entry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any.
    async fn read(&self) -> Result<Option<String>>;

    /// Persist the token, replacing any previous value.
    async fn write(&self, token: &str) -> Result<()>;

    /// Remove the persisted token.
    async fn clear(&self) -> Result<()>;
}

/// In-memory token store.
///
/// Useful for testing and for hosts that mirror the token elsewhere.
/// The value is lost on drop.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: std::sync::RwLock<Option<String>>,
}

impl MemoryTokenStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: std::sync::RwLock::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self) -> Result<Option<String>> {
        Ok(self.token.read().unwrap().clone())
    }

    async fn write(&self, token: &str) -> Result<()> {
        *self.token.write().unwrap() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.write().unwrap() = None;
        Ok(())
    }
}

/// Token store backed by a JSON file on disk.
///
/// The file holds a flat string map so other keys the host may add
/// survive token updates.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store under the user's configuration directory.
    pub fn in_config_dir(app_name: &str) -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Storage("No configuration directory available".to_string()))?;
        Ok(Self::new(base.join(app_name).join("sync-tokens.json")))
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes =
            serde_json::to_vec_pretty(map).map_err(|e| Error::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn read(&self) -> Result<Option<String>> {
        Ok(self.read_map().await?.get(TOKEN_STORAGE_KEY).cloned())
    }

    async fn write(&self, token: &str) -> Result<()> {
        let mut map = self.read_map().await?;
        map.insert(TOKEN_STORAGE_KEY.to_string(), token.to_string());
        self.write_map(&map).await
    }

    async fn clear(&self) -> Result<()> {
        let mut map = self.read_map().await?;
        if map.remove(TOKEN_STORAGE_KEY).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

/// Bearer-token holder.
///
/// Keeps the active token in memory and mirrors writes to the persistent
/// store. At most one token is active per manager; every caller goes
/// through these methods rather than touching the store directly.
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<String>>,
}

impl TokenManager {
    /// Create a manager over the given store. No token is loaded yet.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            token: RwLock::new(None),
        }
    }

    /// Set a new active token and persist it.
    pub async fn set_token(&self, token: &str) -> Result<()> {
        *self.token.write().await = Some(token.to_string());
        self.store.write(token).await
    }

    /// Load the persisted token into memory, returning it if present.
    pub async fn load_persisted(&self) -> Result<Option<String>> {
        let persisted = self.store.read().await?;
        if let Some(token) = &persisted {
            debug!("Loaded persisted access token");
            *self.token.write().await = Some(token.clone());
        }
        Ok(persisted)
    }

    /// The in-memory token, if any.
    pub async fn current(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// True iff a token is currently held in memory.
    pub async fn is_authorized(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Drop the in-memory token only; the persisted copy survives so a
    /// later session can resume without re-authorization.
    pub async fn clear_memory(&self) {
        *self.token.write().await = None;
    }

    /// Drop the token everywhere. The next operation that needs one will
    /// force re-authorization.
    pub async fn invalidate(&self) -> Result<()> {
        *self.token.write().await = None;
        self.store.clear().await
    }
}

/// Builds implicit-flow authorization URLs and tracks the anti-forgery
/// state nonce round-tripped through the OAuth redirect.
pub struct AuthManager {
    config: AuthConfig,
    security_token: Mutex<Option<String>>,
}

impl AuthManager {
    /// Create a new authorization manager.
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            security_token: Mutex::new(None),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(AuthConfig::default())
    }

    /// Build the implicit-flow authorization URL for the user to visit.
    ///
    /// The `state` parameter carries the staged anti-forgery nonce; a
    /// fresh random one is generated and staged if none is pending. The
    /// nonce stays staged for a single later
    /// [`verify_security_token`] check.
    ///
    /// [`verify_security_token`]: AuthManager::verify_security_token
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String> {
        let client = BasicClient::new(
            ClientId::new(self.config.client_id.clone()),
            None,
            AuthUrl::new(self.config.auth_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            None,
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        let state = {
            let mut staged = self.security_token.lock().unwrap();
            staged
                .get_or_insert_with(|| CsrfToken::new_random().secret().clone())
                .clone()
        };

        let (auth_url, _csrf_token) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scope(Scope::new(self.config.scope.clone()))
            .use_implicit_flow()
            .url();

        Ok(auth_url.to_string())
    }

    /// Check a value returned through the OAuth redirect against the
    /// staged nonce. The nonce is single-use: any check consumes it.
    pub fn verify_security_token(&self, provided: &str) -> bool {
        match self.security_token.lock().unwrap().take() {
            Some(staged) => staged == provided,
            None => {
                warn!("Security token check with no staged token");
                false
            }
        }
    }

    /// The configured revocation endpoint.
    pub fn revoke_url(&self) -> &str {
        &self.config.revoke_url
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
