use std::path::Path;

use gdrive_core::{DriveClient, DriveError, DriveFile, EntryKind};

/// The remote operations the resolvers and the uploader depend on.
/// Implemented by [`DriveClient`]; tests substitute an in-memory drive.
#[allow(async_fn_in_trait)]
pub trait DriveStore {
    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<DriveFile>, DriveError>;

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError>;

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<DriveFile, DriveError>;

    async fn update_file(&self, file_id: &str, source: &Path) -> Result<DriveFile, DriveError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError>;
}

impl DriveStore for DriveClient {
    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<DriveFile>, DriveError> {
        DriveClient::find_children(self, parent_id, name, Some(kind)).await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        DriveClient::create_folder(self, parent_id, name).await
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<DriveFile, DriveError> {
        DriveClient::create_file(self, parent_id, name, source).await
    }

    async fn update_file(&self, file_id: &str, source: &Path) -> Result<DriveFile, DriveError> {
        DriveClient::update_file(self, file_id, source).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        DriveClient::delete_file(self, file_id).await
    }
}
