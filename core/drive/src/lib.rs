//! Google Drive app-data client for Prefsync.
//!
//! This module provides the remote half of settings synchronization:
//! - OAuth2 implicit-flow authorization URL construction with an
//!   anti-forgery state nonce
//! - Bearer-token lifecycle (in-memory token mirrored to a pluggable
//!   persistent store)
//! - A REST client for the Drive v3 app-data space: multipart upload,
//!   media download, file listing, change tracking and deletion

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{
    AuthConfig, AuthManager, FileTokenStore, MemoryTokenStore, TokenManager, TokenStore,
    TOKEN_STORAGE_KEY,
};
pub use client::{AppDataApi, DriveClient};
pub use types::{Change, ChangeList, DriveFile, FileList, StartPageToken};
