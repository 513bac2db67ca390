use std::path::PathBuf;

use gdrive_core::DriveError;
use thiserror::Error;

use crate::retry::RetryError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Remote(#[from] RetryError<DriveError>),
    #[error("more than one folder named '{name}' exists under parent {parent_id}")]
    AmbiguousFolder { name: String, parent_id: String },
    #[error("cannot read local file {}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("local path is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("invalid glob pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("no files match target pattern '{0}'")]
    NoMatches(String),
    #[error("{failed} of {total} file(s) failed to upload")]
    PartialFailure { failed: usize, total: usize },
}

/// Renders an error followed by each of its sources, separated by `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
