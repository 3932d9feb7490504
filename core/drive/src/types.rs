//! Wire types for the Google Drive v3 app-data endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Google Drive file metadata from the API.
///
/// Settings blobs only rely on `id` and `name`; the remaining fields are
/// carried through opaquely for callers that want them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File size in bytes, as returned by the API (a decimal string).
    #[serde(default)]
    pub size: Option<String>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// MD5 checksum.
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A single entry in the change log.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// ID of the changed file.
    #[serde(default)]
    pub file_id: Option<String>,
    /// Whether the file was removed from the space.
    #[serde(default)]
    pub removed: bool,
    /// Metadata of the changed file (absent for removals).
    #[serde(default)]
    pub file: Option<DriveFile>,
}

/// Response from the changes endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeList {
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Cursor for the next page when more changes are pending.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Cursor for the next poll cycle, returned on the last page.
    #[serde(default)]
    pub new_start_page_token: Option<String>,
}

impl ChangeList {
    /// The cursor to store for the next poll: the next page if the change
    /// log has more entries, otherwise the fresh start token.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .or(self.new_start_page_token.as_deref())
    }
}

/// Response from the start-page-token endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPageToken {
    pub start_page_token: String,
}
