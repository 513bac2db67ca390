use gdrive_core::DriveFile;
use tracing::{error, info};

use crate::conflict::{ConflictResolver, ReplacementPolicy, Resolution};
use crate::error::{UploadError, error_chain};
use crate::retry::RetryPolicy;
use crate::store::DriveStore;
use crate::target::LocalFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub view_link: Option<String>,
    pub action: UploadAction,
}

impl UploadedFile {
    fn from_entry(entry: DriveFile, action: UploadAction) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            view_link: entry.web_view_link,
            action,
        }
    }
}

/// Result of one file in a batch. Failures keep the error message only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file: LocalFile,
    pub result: Result<UploadedFile, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UploadedFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&LocalFile, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.file, e.as_str())))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Turns any failed file into a failure of the whole batch.
    pub fn ensure_success(&self) -> Result<(), UploadError> {
        if self.is_success() {
            return Ok(());
        }
        Err(UploadError::PartialFailure {
            failed: self.failure_count(),
            total: self.outcomes.len(),
        })
    }

    pub fn ids(&self) -> String {
        self.succeeded()
            .map(|f| f.id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn names(&self) -> String {
        self.succeeded()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn view_links(&self) -> String {
        self.succeeded()
            .filter_map(|f| f.view_link.as_deref())
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub struct Uploader<'a, S> {
    store: &'a S,
    retry: &'a RetryPolicy,
    policy: ReplacementPolicy,
}

impl<'a, S: DriveStore> Uploader<'a, S> {
    pub fn new(store: &'a S, retry: &'a RetryPolicy, policy: ReplacementPolicy) -> Self {
        Self {
            store,
            retry,
            policy,
        }
    }

    /// Uploads `files` in order into `folder_id`. A failing file is recorded
    /// and the batch continues.
    pub async fn upload_all(&self, folder_id: &str, files: &[LocalFile]) -> BatchReport {
        let mut report = BatchReport::default();
        for file in files {
            let result = self.upload_one(folder_id, file).await.map_err(|err| {
                let message = error_chain(&err);
                error!("Failed to upload {}: {message}", file.path.display());
                message
            });
            report.outcomes.push(UploadOutcome {
                file: file.clone(),
                result,
            });
        }
        report
    }

    pub async fn upload_one(
        &self,
        folder_id: &str,
        file: &LocalFile,
    ) -> Result<UploadedFile, UploadError> {
        check_readable(file).await?;
        info!("Uploading {} ...", file.remote_name);

        let conflicts = ConflictResolver::new(self.store, self.retry);
        let matches = conflicts.find_existing(folder_id, &file.remote_name).await?;
        let resolution = conflicts
            .apply(self.policy, matches, &file.remote_name, &file.path)
            .await?;

        let uploaded = match resolution {
            Resolution::Updated(entry) => UploadedFile::from_entry(entry, UploadAction::Updated),
            Resolution::ProceedToCreate => {
                let label = format!("upload '{}' to {folder_id}", file.remote_name);
                let entry = self
                    .retry
                    .run(&label, || {
                        self.store
                            .create_file(folder_id, &file.remote_name, &file.path)
                    })
                    .await?;
                UploadedFile::from_entry(entry, UploadAction::Created)
            }
        };
        info!(
            "{} {} ({})",
            match uploaded.action {
                UploadAction::Created => "Uploaded",
                UploadAction::Updated => "Updated",
            },
            uploaded.name,
            uploaded.id
        );
        Ok(uploaded)
    }
}

async fn check_readable(file: &LocalFile) -> Result<(), UploadError> {
    let local_error = |source| UploadError::LocalFile {
        path: file.path.clone(),
        source,
    };
    let handle = tokio::fs::File::open(&file.path).await.map_err(local_error)?;
    let metadata = handle.metadata().await.map_err(local_error)?;
    if !metadata.is_file() {
        return Err(UploadError::NotAFile(file.path.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use crate::test_support::{MemoryDrive, Op};
    use std::path::Path;
    use std::time::Duration;

    fn retry() -> RetryPolicy {
        RetryPolicy::new(3, Backoff::new(Duration::from_millis(10), 2))
    }

    fn write(dir: &Path, name: &str, content: &[u8]) -> LocalFile {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        LocalFile {
            path,
            remote_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn creates_new_file_when_nothing_exists() {
        let drive = MemoryDrive::new();
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"bytes");
        let retry = retry();

        let uploaded = Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_one("dest", &file)
            .await
            .unwrap();

        assert_eq!(uploaded.action, UploadAction::Created);
        assert_eq!(uploaded.name, "app.zip");
        assert!(uploaded.view_link.is_some());
        assert_eq!(drive.content(&uploaded.id).as_deref(), Some(&b"bytes"[..]));
    }

    #[tokio::test]
    async fn add_new_keeps_duplicates() {
        let drive = MemoryDrive::new();
        drive.add_file("dest", "app.zip", b"1");
        drive.add_file("dest", "app.zip", b"2");
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"3");
        let retry = retry();

        Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_one("dest", &file)
            .await
            .unwrap();

        assert_eq!(drive.entries_named("dest", "app.zip").len(), 3);
        assert_eq!(drive.count(Op::Delete), 0);
    }

    #[tokio::test]
    async fn delete_first_deletes_before_creating() {
        let drive = MemoryDrive::new();
        let old_a = drive.add_file("dest", "app.zip", b"1");
        let old_b = drive.add_file("dest", "app.zip", b"2");
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"3");
        let retry = retry();

        let uploaded = Uploader::new(&drive, &retry, ReplacementPolicy::DeleteFirst)
            .upload_one("dest", &file)
            .await
            .unwrap();

        let ops: Vec<_> = drive.calls().into_iter().map(|(op, _)| op).collect();
        assert_eq!(ops, [Op::Find, Op::Delete, Op::Delete, Op::CreateFile]);
        let remaining = drive.entries_named("dest", "app.zip");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, uploaded.id);
        assert!(!drive.exists(&old_a) && !drive.exists(&old_b));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_first_failure_skips_create() {
        let drive = MemoryDrive::new();
        drive.add_file("dest", "app.zip", b"1");
        let stuck = drive.add_file("dest", "app.zip", b"2");
        drive.break_id(&stuck);
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"3");
        let retry = retry();

        let report = Uploader::new(&drive, &retry, ReplacementPolicy::DeleteFirst)
            .upload_all("dest", &[file])
            .await;

        assert_eq!(report.failure_count(), 1);
        assert_eq!(drive.count(Op::CreateFile), 0);
    }

    #[tokio::test]
    async fn update_in_place_keeps_id() {
        let drive = MemoryDrive::new();
        let existing = drive.add_file("dest", "app.zip", b"old");
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"new");
        let retry = retry();

        let uploaded = Uploader::new(&drive, &retry, ReplacementPolicy::UpdateInPlace)
            .upload_one("dest", &file)
            .await
            .unwrap();

        assert_eq!(uploaded.id, existing);
        assert_eq!(uploaded.action, UploadAction::Updated);
        assert_eq!(drive.count(Op::Update), 1);
        assert_eq!(drive.count(Op::CreateFile), 0);
        assert_eq!(drive.content(&existing).as_deref(), Some(&b"new"[..]));
    }

    #[tokio::test]
    async fn missing_local_file_fails_without_remote_calls() {
        let drive = MemoryDrive::new();
        let retry = retry();
        let file = LocalFile {
            path: "/definitely/not/here.bin".into(),
            remote_name: "here.bin".into(),
        };

        let err = Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_one("dest", &file)
            .await
            .expect_err("missing file");

        assert!(matches!(err, UploadError::LocalFile { .. }));
        assert!(drive.calls().is_empty());
    }

    #[tokio::test]
    async fn directory_is_not_uploaded() {
        let drive = MemoryDrive::new();
        let retry = retry();
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile {
            path: dir.path().to_path_buf(),
            remote_name: "dir".into(),
        };

        let err = Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_one("dest", &file)
            .await
            .expect_err("directory");

        assert!(matches!(err, UploadError::NotAFile(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_continues_after_a_failure() {
        let drive = MemoryDrive::new();
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a.txt", b"a");
        let missing = LocalFile {
            path: dir.path().join("gone.txt"),
            remote_name: "gone.txt".into(),
        };
        let last = write(dir.path(), "c.txt", b"c");
        let retry = retry();

        let report = Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_all("dest", &[first, missing, last])
            .await;

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_success());
        assert_eq!(report.names(), "a.txt,c.txt");
        assert_eq!(report.ids().split(',').count(), 2);
        assert_eq!(report.view_links().split(',').count(), 2);
        let (failed, message) = report.failed().next().unwrap();
        assert_eq!(failed.remote_name, "gone.txt");
        assert!(message.contains("gone.txt"), "{message}");

        let err = report.ensure_success().expect_err("one file failed");
        assert!(matches!(
            err,
            UploadError::PartialFailure {
                failed: 1,
                total: 3
            }
        ));
        assert_eq!(err.to_string(), "1 of 3 file(s) failed to upload");
    }

    #[test]
    fn partial_batch_is_a_failed_run() {
        let uploaded = LocalFile {
            path: "dist/a.zip".into(),
            remote_name: "a.zip".into(),
        };
        let missing = LocalFile {
            path: "dist/b.zip".into(),
            remote_name: "b.zip".into(),
        };
        let mut report = BatchReport {
            outcomes: vec![UploadOutcome {
                file: uploaded,
                result: Ok(UploadedFile {
                    id: "file-1".into(),
                    name: "a.zip".into(),
                    view_link: None,
                    action: UploadAction::Created,
                }),
            }],
        };
        assert!(report.ensure_success().is_ok());

        report.outcomes.push(UploadOutcome {
            file: missing,
            result: Err("cannot read local file dist/b.zip".into()),
        });
        let err = report.ensure_success().expect_err("partial batch");
        assert_eq!(err.to_string(), "1 of 2 file(s) failed to upload");
        assert_eq!(report.ids(), "file-1");
    }

    #[tokio::test(start_paused = true)]
    async fn create_is_retried_until_it_succeeds() {
        let drive = MemoryDrive::new();
        drive.fail_next(Op::CreateFile, 2);
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "app.zip", b"bytes");
        let retry = retry();

        let report = Uploader::new(&drive, &retry, ReplacementPolicy::AddNew)
            .upload_all("dest", &[file])
            .await;

        assert!(report.is_success());
        assert_eq!(drive.count(Op::CreateFile), 3);
        assert_eq!(drive.entries_named("dest", "app.zip").len(), 1);
    }
}
