use std::fmt;

use gdrive_core::EntryKind;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::store::DriveStore;

/// Slash-delimited folder path below the upload root. Empty segments are
/// dropped, so `"/a//b/"` and `"a/b"` are the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

pub struct FolderResolver<'a, S> {
    store: &'a S,
    retry: &'a RetryPolicy,
}

impl<'a, S: DriveStore> FolderResolver<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Walks `path` below `root_id`, creating missing folders, and returns
    /// the id of the last one. An empty path resolves to `root_id`.
    pub async fn resolve(&self, root_id: &str, path: &FolderPath) -> Result<String, UploadError> {
        let mut current = root_id.to_string();
        for segment in path.segments() {
            current = self.descend(&current, segment).await?;
        }
        Ok(current)
    }

    async fn descend(&self, parent_id: &str, name: &str) -> Result<String, UploadError> {
        let label = format!("list folder '{name}' in {parent_id}");
        let mut matches = self
            .retry
            .run(&label, || {
                self.store.find_children(parent_id, name, EntryKind::Folder)
            })
            .await?;

        if matches.len() > 1 {
            return Err(UploadError::AmbiguousFolder {
                name: name.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        if let Some(existing) = matches.pop() {
            debug!("folder '{name}' exists: {}", existing.id);
            return Ok(existing.id);
        }

        let label = format!("create folder '{name}' in {parent_id}");
        let created = self
            .retry
            .run(&label, || self.store.create_folder(parent_id, name))
            .await?;
        info!("Created folder '{name}' ({})", created.id);
        Ok(created.id)
    }
}
