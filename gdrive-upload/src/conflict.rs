use std::fmt;
use std::path::Path;
use std::str::FromStr;

use gdrive_core::{DriveFile, EntryKind};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::store::DriveStore;

/// What to do with existing files that share the upload's name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacementPolicy {
    DeleteFirst,
    UpdateInPlace,
    #[default]
    AddNew,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid replace_mode '{0}': expected one of delete_first, update_in_place, add_new")]
pub struct ParsePolicyError(pub String);

impl ReplacementPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplacementPolicy::DeleteFirst => "delete_first",
            ReplacementPolicy::UpdateInPlace => "update_in_place",
            ReplacementPolicy::AddNew => "add_new",
        }
    }

    /// Folds the legacy `override` flag in. The flag only takes effect when
    /// the policy is still `add_new`.
    pub fn with_legacy_override(self, override_existing: bool) -> Self {
        if override_existing && self == ReplacementPolicy::AddNew {
            ReplacementPolicy::DeleteFirst
        } else {
            self
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = ParsePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "delete_first" => Ok(ReplacementPolicy::DeleteFirst),
            "update_in_place" => Ok(ReplacementPolicy::UpdateInPlace),
            "add_new" => Ok(ReplacementPolicy::AddNew),
            _ => Err(ParsePolicyError(value.to_string())),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The caller should create a new file.
    ProceedToCreate,
    /// An existing file received the new content.
    Updated(DriveFile),
}

pub struct ConflictResolver<'a, S> {
    store: &'a S,
    retry: &'a RetryPolicy,
}

impl<'a, S: DriveStore> ConflictResolver<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Non-trashed files named `file_name` directly inside `folder_id`, in
    /// the order the service returns them. Folders are never matched.
    pub async fn find_existing(
        &self,
        folder_id: &str,
        file_name: &str,
    ) -> Result<Vec<DriveFile>, UploadError> {
        let label = format!("find existing '{file_name}' in {folder_id}");
        let matches = self
            .retry
            .run(&label, || {
                self.store.find_children(folder_id, file_name, EntryKind::File)
            })
            .await?;
        debug!("{} existing file(s) named '{file_name}'", matches.len());
        Ok(matches)
    }

    pub async fn apply(
        &self,
        policy: ReplacementPolicy,
        matches: Vec<DriveFile>,
        file_name: &str,
        file_path: &Path,
    ) -> Result<Resolution, UploadError> {
        if matches.is_empty() {
            return Ok(Resolution::ProceedToCreate);
        }

        match policy {
            ReplacementPolicy::AddNew => Ok(Resolution::ProceedToCreate),
            ReplacementPolicy::DeleteFirst => {
                for existing in &matches {
                    debug!("Removing {}({})", existing.name, existing.id);
                    let label = format!("delete '{}' ({})", existing.name, existing.id);
                    self.retry
                        .run(&label, || self.store.delete_file(&existing.id))
                        .await?;
                }
                Ok(Resolution::ProceedToCreate)
            }
            ReplacementPolicy::UpdateInPlace => {
                if matches.len() > 1 {
                    warn!(
                        "{} files named '{file_name}' exist; updating the first ({})",
                        matches.len(),
                        matches[0].id
                    );
                }
                let target = &matches[0];
                let label = format!("update '{file_name}' ({})", target.id);
                let updated = self
                    .retry
                    .run(&label, || self.store.update_file(&target.id, file_path))
                    .await?;
                Ok(Resolution::Updated(updated))
            }
        }
    }
}
