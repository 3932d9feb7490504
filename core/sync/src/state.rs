//! In-memory folder state: the change cursor and the name-to-file map.

use std::collections::HashMap;

use prefsync_drive::DriveFile;

/// Snapshot of the remote app-data folder.
///
/// `files` stays `None` until the first full listing; the cursor stays
/// `None` until the first start-token fetch. Only the provider's own
/// listing and polling calls populate either, always from authoritative
/// server responses.
#[derive(Debug, Clone, Default)]
pub struct FolderState {
    /// Cursor into the remote change log.
    pub change_cursor: Option<String>,
    files: Option<HashMap<String, DriveFile>>,
}

impl FolderState {
    /// Create a new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the file map with a fresh listing.
    pub fn record_listing(&mut self, files: Vec<DriveFile>) {
        self.files = Some(files.into_iter().map(|f| (f.name.clone(), f)).collect());
    }

    /// Record a single uploaded file's metadata.
    pub fn record_file(&mut self, file: DriveFile) {
        self.files
            .get_or_insert_with(HashMap::new)
            .insert(file.name.clone(), file);
    }

    /// Resolve a file name to its Drive id.
    pub fn file_id(&self, name: &str) -> Option<&str> {
        self.files
            .as_ref()
            .and_then(|m| m.get(name))
            .map(|f| f.id.as_str())
    }

    /// Get the tracked metadata for a file name.
    pub fn get(&self, name: &str) -> Option<&DriveFile> {
        self.files.as_ref().and_then(|m| m.get(name))
    }

    /// True until the first listing has populated the map.
    pub fn is_unlisted(&self) -> bool {
        self.files.is_none()
    }
}
