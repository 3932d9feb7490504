//! Shared test doubles: a stateful in-memory Drive backend plus
//! recording implementations of the host capabilities.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use prefsync_common::{Error, Result};
use prefsync_drive::{
    AppDataApi, AuthConfig, AuthManager, ChangeList, DriveFile, MemoryTokenStore, TokenManager,
};
use prefsync_sync::{DriveSyncProvider, ProviderConfig, SyncListener, TabOpener};

pub const REDIRECT_URI: &str = "https://example.invalid/callback";

/// In-memory Drive backend.
///
/// Files live in a map keyed by id; change-check responses can be
/// scripted per call, with a configurable default once the script runs
/// dry. Every change check records its virtual timestamp and cursor so
/// tests can assert poll cadence.
#[derive(Default)]
pub struct FakeApi {
    files: Mutex<HashMap<String, (DriveFile, Value)>>,
    next_id: AtomicUsize,
    changes: Mutex<VecDeque<Result<ChangeList>>>,
    fail_changes: AtomicBool,
    fail_listing: AtomicBool,
    check_times: Mutex<Vec<Instant>>,
    cursors_seen: Mutex<Vec<String>>,
    pub revoked: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one scripted change-check response.
    pub fn push_changes(&self, response: Result<ChangeList>) {
        self.changes.lock().unwrap().push_back(response);
    }

    /// Make unscripted change checks fail.
    pub fn set_fail_changes(&self, fail: bool) {
        self.fail_changes.store(fail, Ordering::SeqCst);
    }

    /// Make file listings fail.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn check_count(&self) -> usize {
        self.check_times.lock().unwrap().len()
    }

    pub fn check_times(&self) -> Vec<Instant> {
        self.check_times.lock().unwrap().clone()
    }

    pub fn cursors_seen(&self) -> Vec<String> {
        self.cursors_seen.lock().unwrap().clone()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

fn meta(id: &str, name: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some("application/json".to_string()),
        size: None,
        modified_time: None,
        md5_checksum: None,
    }
}

#[async_trait]
impl AppDataApi for FakeApi {
    async fn upload_file(
        &self,
        file_id: Option<&str>,
        name: &str,
        data: &Value,
    ) -> Result<DriveFile> {
        let mut files = self.files.lock().unwrap();

        match file_id {
            Some(id) => {
                let entry = files.get_mut(id).ok_or_else(|| Error::Http {
                    status: 404,
                    message: format!("File not found: {}", id),
                })?;
                entry.1 = data.clone();
                Ok(entry.0.clone())
            }
            None => {
                let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let file = meta(&id, name);
                files.insert(id, (file.clone(), data.clone()));
                Ok(file)
            }
        }
    }

    async fn download_file(&self, file_id: &str) -> Result<Value> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::Http {
                status: 404,
                message: format!("File not found: {}", file_id),
            })
    }

    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::Network("listing unavailable".to_string()));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .map(|(file, _)| file.clone())
            .collect())
    }

    async fn get_start_page_token(&self) -> Result<String> {
        Ok("cursor-0".to_string())
    }

    async fn list_changes(&self, page_token: &str) -> Result<ChangeList> {
        self.check_times.lock().unwrap().push(Instant::now());
        self.cursors_seen
            .lock()
            .unwrap()
            .push(page_token.to_string());

        if let Some(scripted) = self.changes.lock().unwrap().pop_front() {
            return scripted;
        }

        if self.fail_changes.load(Ordering::SeqCst) {
            return Err(Error::Http {
                status: 500,
                message: "backend error".to_string(),
            });
        }

        Ok(ChangeList {
            changes: vec![],
            next_page_token: None,
            new_start_page_token: Some("cursor-next".to_string()),
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| Error::Http {
                status: 404,
                message: format!("File not found: {}", file_id),
            })
    }

    async fn revoke_token(&self) -> Result<()> {
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts "sync required" notifications.
#[derive(Default)]
pub struct RecordingListener {
    count: AtomicUsize,
}

impl RecordingListener {
    pub fn notifications(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl SyncListener for RecordingListener {
    fn sync_required(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every authorization URL the provider asks to open.
#[derive(Default)]
pub struct RecordingTabOpener {
    urls: Mutex<Vec<String>>,
}

impl RecordingTabOpener {
    pub fn opened(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl TabOpener for RecordingTabOpener {
    fn open(&self, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// A fully wired provider over fakes.
pub struct Harness {
    pub api: Arc<FakeApi>,
    pub listener: Arc<RecordingListener>,
    pub opener: Arc<RecordingTabOpener>,
    pub store: Arc<MemoryTokenStore>,
    pub auth: Arc<AuthManager>,
    pub provider: DriveSyncProvider,
}

pub fn harness(persisted_token: Option<&str>) -> Harness {
    let api = Arc::new(FakeApi::new());
    let listener = Arc::new(RecordingListener::default());
    let opener = Arc::new(RecordingTabOpener::default());

    let store = match persisted_token {
        Some(token) => Arc::new(MemoryTokenStore::with_token(token)),
        None => Arc::new(MemoryTokenStore::new()),
    };
    let tokens = Arc::new(TokenManager::new(store.clone()));

    let auth = Arc::new(AuthManager::new(AuthConfig {
        client_id: "test_client".to_string(),
        ..AuthConfig::default()
    }));

    let provider = DriveSyncProvider::new(
        api.clone(),
        auth.clone(),
        tokens,
        listener.clone(),
        opener.clone(),
        ProviderConfig::new(REDIRECT_URI),
    );

    Harness {
        api,
        listener,
        opener,
        store,
        auth,
        provider,
    }
}

/// Extract the `state` query parameter from an authorization URL.
pub fn state_param(url: &str) -> String {
    let parsed = url::Url::parse(url).unwrap();
    parsed
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}
