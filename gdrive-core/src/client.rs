use std::io;
use std::path::Path;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const FILE_FIELDS: &str = "id,name,mimeType,parents,webViewLink";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,parents,webViewLink)";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed")]
    Request(#[from] reqwest::Error),
    #[error("invalid url")]
    Url(#[from] url::ParseError),
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("failed to encode metadata")]
    Json(#[from] serde_json::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Restricts a name lookup to folders or to everything that is not a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn about(&self) -> Result<About, DriveError> {
        let mut url = self.endpoint("/drive/v3/about")?;
        url.query_pairs_mut().append_pair("fields", "user");
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        Self::handle_response(response).await
    }

    /// Lists every non-trashed entry named exactly `name` under `parent_id`,
    /// oldest first, following page tokens until the listing is exhausted.
    pub async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: Option<EntryKind>,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let query = children_query(parent_id, name, kind);
        let mut page_token: Option<String> = None;
        let mut files = Vec::new();
        loop {
            let mut url = self.endpoint("/drive/v3/files")?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", &query)
                    .append_pair("fields", LIST_FIELDS)
                    .append_pair("orderBy", "createdTime")
                    .append_pair("includeItemsFromAllDrives", "true")
                    .append_pair("supportsAllDrives", "true");
                if let Some(token) = page_token.as_deref() {
                    pairs.append_pair("pageToken", token);
                }
            }
            let response = self.http.get(url).bearer_auth(&self.token).send().await?;
            let page: FileList = Self::handle_response(response).await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    pub async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("fields", FILE_FIELDS)
            .append_pair("supportsAllDrives", "true");
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec![parent_id],
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&metadata)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Creates a file under `parent_id` with a multipart upload. The media
    /// part is streamed from `source`.
    pub async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<DriveFile, DriveError> {
        let mut url = self.endpoint("/upload/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", FILE_FIELDS)
            .append_pair("supportsAllDrives", "true");
        let metadata = serde_json::to_string(&FileMetadata {
            name,
            mime_type: None,
            parents: vec![parent_id],
        })?;

        let boundary = multipart_boundary();
        let head = format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n"
        );
        let tail = format!("\r\n--{boundary}--\r\n");

        let file = tokio::fs::File::open(source).await?;
        let file_len = file.metadata().await?.len();
        let content_length = head.len() as u64 + file_len + tail.len() as u64;
        let body = stream::iter([Ok::<_, io::Error>(Bytes::from(head))])
            .chain(ReaderStream::new(file))
            .chain(stream::iter([Ok(Bytes::from(tail))]));

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(body))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Replaces the content of an existing file. Id, name and parents are
    /// left untouched.
    pub async fn update_file(&self, file_id: &str, source: &Path) -> Result<DriveFile, DriveError> {
        let mut url = self.file_endpoint("/upload/drive/v3/files", file_id)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("fields", FILE_FIELDS)
            .append_pair("supportsAllDrives", "true");

        let file = tokio::fs::File::open(source).await?;
        let file_len = file.metadata().await?.len();
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, file_len)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Permanently deletes a file. A missing file counts as deleted, so a
    /// repeated call after a lost response still succeeds.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        let mut url = self.file_endpoint("/drive/v3/files", file_id)?;
        url.query_pairs_mut().append_pair("supportsAllDrives", "true");
        let response = self.http.delete(url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DriveError::Api { status, body })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    fn file_endpoint(&self, prefix: &str, file_id: &str) -> Result<Url, DriveError> {
        let mut url = self.endpoint(prefix)?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(file_id);
        }
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

fn children_query(parent_id: &str, name: &str, kind: Option<EntryKind>) -> String {
    let mut query = format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id)
    );
    match kind {
        Some(EntryKind::Folder) => {
            query.push_str(&format!(" and mimeType = '{FOLDER_MIME_TYPE}'"));
        }
        Some(EntryKind::File) => {
            query.push_str(&format!(" and mimeType != '{FOLDER_MIME_TYPE}'"));
        }
        None => {}
    }
    query
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("gdrive-upload-{suffix}")
}

/// A file or folder as returned by the files endpoints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct About {
    pub user: DriveUser,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    parents: Vec<&'a str>,
}
