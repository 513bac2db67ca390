use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::UploadError;

/// A local file queued for upload together with the name it gets remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub remote_name: String,
}

/// The `target` input: one explicit file, or a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Single {
        path: PathBuf,
        name: Option<String>,
    },
    Pattern(String),
}

impl Target {
    pub fn parse(target: &str, name: Option<&str>) -> Self {
        let name = name.filter(|n| !n.is_empty());
        if is_glob(target) {
            if let Some(name) = name {
                warn!("input 'name' ({name}) is ignored for glob target '{target}'");
            }
            Target::Pattern(target.to_string())
        } else {
            Target::Single {
                path: PathBuf::from(target),
                name: name.map(str::to_string),
            }
        }
    }

    /// Enumerates the files to upload. Directories matched by a pattern are
    /// skipped; a pattern matching no files is an error.
    pub fn expand(&self) -> Result<Vec<LocalFile>, UploadError> {
        match self {
            Target::Single { path, name } => Ok(vec![LocalFile {
                path: path.clone(),
                remote_name: name.clone().unwrap_or_else(|| base_name(path)),
            }]),
            Target::Pattern(pattern) => expand_pattern(pattern),
        }
    }
}

pub fn is_glob(target: &str) -> bool {
    target.contains('*')
}

fn expand_pattern(pattern: &str) -> Result<Vec<LocalFile>, UploadError> {
    let entries = glob::glob(pattern).map_err(|source| UploadError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!("skipping unreadable match for '{pattern}': {err}");
                continue;
            }
        };
        if path.is_dir() {
            debug!("skipping directory {}", path.display());
            continue;
        }
        files.push(LocalFile {
            remote_name: base_name(&path),
            path,
        });
    }

    if files.is_empty() {
        return Err(UploadError::NoMatches(pattern.to_string()));
    }
    Ok(files)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
