use super::google_api::{check_status, drive_query_literal};
use crate::app::ports::DrivePort;
use crate::constants::{DRIVE_API_BASE, DRIVE_FOLDER_MIME, XLSX_MIME};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, error, warn};

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Folder names along a Drive path; a leading `My Drive` means the root.
pub fn folder_segments(path: &str) -> (bool, Vec<&str>) {
    let mut segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let from_root = segments.first() == Some(&"My Drive");
    if from_root {
        segments.remove(0);
    }
    (from_root, segments)
}

/// Builds a `multipart/related` upload body: JSON metadata, then the file.
pub fn multipart_related_body(boundary: &str, metadata: &serde_json::Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Google Drive v3 REST client.
pub struct DriveClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(DRIVE_API_BASE, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    async fn first_folder(&self, query: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(format!("{}/drive/v3/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query),
                ("fields", "files(id, name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: FileList = check_status(resp).await?.json().await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    fn folder_query(name: &str, parent: Option<&str>) -> String {
        let mut q = format!(
            "mimeType='{}' and name={} and trashed=false",
            DRIVE_FOLDER_MIME,
            drive_query_literal(name)
        );
        if let Some(parent) = parent {
            q.push_str(&format!(" and {} in parents", drive_query_literal(parent)));
        }
        q
    }

    /// Walks the path one folder at a time.
    async fn walk(&self, from_root: bool, segments: &[&str]) -> Result<Option<String>> {
        let mut parent: Option<String> = from_root.then(|| "root".to_string());
        for segment in segments {
            let query = Self::folder_query(segment, parent.as_deref());
            match self.first_folder(&query).await? {
                Some(id) => parent = Some(id),
                None => {
                    debug!("Drive folder '{}' not found while walking path", segment);
                    return Ok(None);
                }
            }
        }
        Ok(parent)
    }
}

#[async_trait]
impl DrivePort for DriveClient {
    async fn resolve_folder(&self, path: &str) -> Result<Option<String>> {
        let (from_root, segments) = folder_segments(path);
        let Some(last) = segments.last() else {
            return Ok(from_root.then(|| "root".to_string()));
        };

        match self.walk(from_root, &segments).await {
            Ok(Some(id)) => return Ok(Some(id)),
            Ok(None) => {}
            Err(e) => warn!("Drive path walk failed, searching by folder name: {}", e),
        }

        // Shared folders are not under the root; fall back to the first folder with that name
        let found = self.first_folder(&Self::folder_query(last, None)).await?;
        if found.is_none() {
            error!("Google Drive folder '{}' not found.", last);
        }
        Ok(found)
    }

    async fn upload(&self, path: &Path, folder_id: &str) -> Result<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ReportError::MissingField(format!("file name in {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;

        let boundary = format!("ov_reports_{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [folder_id] });
        let body = multipart_related_body(&boundary, &metadata, XLSX_MIME, &bytes);

        let resp = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let file: DriveFile = check_status(resp).await?.json().await?;
        Ok(file.id)
    }
}
