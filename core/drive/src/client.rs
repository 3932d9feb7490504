//! Google Drive API client for the app-data space.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use prefsync_common::{Error, Result};

use crate::auth::{AuthManager, TokenManager};
use crate::types::{ChangeList, DriveFile, FileList, StartPageToken};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Hidden per-application storage space.
const APPDATA_SPACE: &str = "appDataFolder";
/// Fields to request for file resources.
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,md5Checksum";
/// Boundary for multipart upload bodies.
const MULTIPART_BOUNDARY: &str = "prefsync_upload_boundary";

/// Remote operations against the app-data space.
///
/// This is the seam between the sync provider and the HTTP layer; tests
/// inject scripted implementations.
#[async_trait]
pub trait AppDataApi: Send + Sync {
    /// Create (no `file_id`) or update (with `file_id`) a settings file.
    async fn upload_file(
        &self,
        file_id: Option<&str>,
        name: &str,
        data: &Value,
    ) -> Result<DriveFile>;

    /// Download a file's JSON content.
    async fn download_file(&self, file_id: &str) -> Result<Value>;

    /// List every file in the app-data space.
    async fn list_files(&self) -> Result<Vec<DriveFile>>;

    /// Fetch a cursor pointing at the current end of the change log.
    async fn get_start_page_token(&self) -> Result<String>;

    /// List changes in the app-data space since the given cursor.
    async fn list_changes(&self, page_token: &str) -> Result<ChangeList>;

    /// Delete a file.
    async fn delete_file(&self, file_id: &str) -> Result<()>;

    /// Best-effort remote revocation, then unconditional local
    /// invalidation of the token.
    async fn revoke_token(&self) -> Result<()>;
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
    tokens: Arc<TokenManager>,
    auth: Arc<AuthManager>,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new Drive client against the production endpoints.
    pub fn new(tokens: Arc<TokenManager>, auth: Arc<AuthManager>) -> Self {
        Self::with_base_urls(tokens, auth, DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Create a client with custom base URLs (useful for testing).
    pub fn with_base_urls(
        tokens: Arc<TokenManager>,
        auth: Arc<AuthManager>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("Prefsync/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            tokens,
            auth,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Build the implicit-flow authorization URL for this client's
    /// configuration.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String> {
        self.auth.authorization_url(redirect_uri)
    }

    /// Get authorization header value, failing before any request is
    /// sent when no token is held.
    async fn bearer(&self) -> Result<String> {
        match self.tokens.current().await {
            Some(token) => Ok(format!("Bearer {}", token)),
            None => Err(Error::Authentication(
                "No access token available".to_string(),
            )),
        }
    }

    /// Build a multipart/related upload body.
    ///
    /// The metadata part names the file and parents it into the app-data
    /// space on create; updates address the file by id, so their metadata
    /// part is empty.
    fn build_multipart_body(file_id: Option<&str>, name: &str, data: &Value) -> Result<Vec<u8>> {
        let metadata = match file_id {
            None => serde_json::json!({ "name": name, "parents": [APPDATA_SPACE] }),
            Some(_) => serde_json::json!({}),
        };
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let data_json =
            serde_json::to_string(data).map_err(|e| Error::Serialization(e.to_string()))?;

        let mut body = Vec::new();

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // Data part
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(data_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // End boundary
        body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());

        Ok(body)
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            Err(self.fail(status, response).await)
        }
    }

    /// Turn a non-success response into an error. A 401/403 revokes the
    /// token so the next operation forces re-authorization instead of
    /// looping on an invalid token; the in-flight call still fails.
    async fn fail(&self, status: StatusCode, response: reqwest::Response) -> Error {
        let message = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Authorization failure ({}), revoking access token", status);
            if let Err(e) = self.revoke_token().await {
                warn!("Token revocation failed: {}", e);
            }
        }

        Error::Http {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl AppDataApi for DriveClient {
    async fn upload_file(
        &self,
        file_id: Option<&str>,
        name: &str,
        data: &Value,
    ) -> Result<DriveFile> {
        let auth = self.bearer().await?;
        let body = Self::build_multipart_body(file_id, name, data)?;

        let request = match file_id {
            Some(id) => self
                .http
                .patch(format!("{}/files/{}", self.upload_base, id)),
            None => self.http.post(format!("{}/files", self.upload_base)),
        };

        let response = request
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Value> {
        let auth = self.bearer().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .header(header::AUTHORIZATION, auth)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        self.handle_response(response).await
    }

    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let fields = format!("files({}),nextPageToken", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.bearer().await?;

            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .header(header::AUTHORIZATION, auth)
                .query(&[
                    ("spaces", APPDATA_SPACE),
                    ("fields", fields.as_str()),
                    ("pageSize", "100"),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

            let list: FileList = self.handle_response(response).await?;
            all_files.extend(list.files);

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} files in app-data space", all_files.len());

        Ok(all_files)
    }

    async fn get_start_page_token(&self) -> Result<String> {
        let auth = self.bearer().await?;

        let response = self
            .http
            .get(format!("{}/changes/startPageToken", self.api_base))
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get start page token: {}", e)))?;

        let token: StartPageToken = self.handle_response(response).await?;
        Ok(token.start_page_token)
    }

    async fn list_changes(&self, page_token: &str) -> Result<ChangeList> {
        let fields = format!(
            "changes(fileId,removed,file({})),nextPageToken,newStartPageToken",
            FILE_FIELDS
        );
        let auth = self.bearer().await?;

        let response = self
            .http
            .get(format!("{}/changes", self.api_base))
            .header(header::AUTHORIZATION, auth)
            .query(&[
                ("pageToken", page_token),
                ("spaces", APPDATA_SPACE),
                ("fields", fields.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list changes: {}", e)))?;

        self.handle_response(response).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let auth = self.bearer().await?;

        let response = self
            .http
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.fail(status, response).await)
        }
    }

    async fn revoke_token(&self) -> Result<()> {
        if let Some(token) = self.tokens.current().await {
            let result = self
                .http
                .get(self.auth.revoke_url())
                .query(&[("token", token.as_str())])
                .send()
                .await;

            match result {
                Ok(response) if !response.status().is_success() => {
                    debug!("Revoke endpoint returned {}", response.status());
                }
                Err(e) => {
                    debug!("Revoke request failed: {}", e);
                }
                _ => {}
            }
        }

        self.tokens.invalidate().await
    }
}
