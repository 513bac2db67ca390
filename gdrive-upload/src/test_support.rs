use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use gdrive_core::{DriveError, DriveFile, EntryKind, FOLDER_MIME_TYPE};

use crate::store::DriveStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Find,
    CreateFolder,
    CreateFile,
    Update,
    Delete,
}

/// In-memory drive with call recording and failure injection.
#[derive(Default)]
pub struct MemoryDrive {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    entries: Vec<DriveFile>,
    contents: HashMap<String, Vec<u8>>,
    next_id: u64,
    calls: Vec<(Op, String)>,
    pending_failures: HashMap<Op, u32>,
    broken_ids: HashSet<String>,
}

impl State {
    fn record(&mut self, op: Op, target: String) -> Result<(), DriveError> {
        self.calls.push((op, target.clone()));
        if let Some(remaining) = self.pending_failures.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(injected(op, &target));
        }
        if self.broken_ids.contains(&target) {
            return Err(injected(op, &target));
        }
        Ok(())
    }

    fn insert(&mut self, prefix: &str, parent_id: &str, name: &str, folder: bool) -> DriveFile {
        self.next_id += 1;
        let id = format!("{prefix}-{}", self.next_id);
        let entry = DriveFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: Some(if folder {
                FOLDER_MIME_TYPE.to_string()
            } else {
                "application/octet-stream".to_string()
            }),
            parents: vec![parent_id.to_string()],
            web_view_link: (!folder).then(|| format!("https://drive.test/{id}/view")),
        };
        self.entries.push(entry.clone());
        entry
    }
}

fn injected(op: Op, target: &str) -> DriveError {
    DriveError::Io(io::Error::other(format!("injected {op:?} failure for {target}")))
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, parent_id: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.insert("folder", parent_id, name, true).id
    }

    pub fn add_file(&self, parent_id: &str, name: &str, content: &[u8]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.insert("file", parent_id, name, false).id;
        state.contents.insert(id.clone(), content.to_vec());
        id
    }

    /// Makes the next `times` calls of `op` fail.
    pub fn fail_next(&self, op: Op, times: u32) {
        self.state.lock().unwrap().pending_failures.insert(op, times);
    }

    /// Makes every update or delete of `id` fail.
    pub fn break_id(&self, id: &str) {
        self.state.lock().unwrap().broken_ids.insert(id.to_string());
    }

    pub fn count(&self, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(called, _)| *called == op)
            .count()
    }

    pub fn calls(&self) -> Vec<(Op, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn entries_named(&self, parent_id: &str, name: &str) -> Vec<DriveFile> {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.name == name && e.parents.iter().any(|p| p == parent_id))
            .cloned()
            .collect()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.state.lock().unwrap().entries.iter().any(|e| e.id == id)
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().contents.get(id).cloned()
    }
}

impl DriveStore for MemoryDrive {
    async fn find_children(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Find, format!("{parent_id}/{name}"))?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.name == name && e.parents.iter().any(|p| p == parent_id))
            .filter(|e| match kind {
                EntryKind::Folder => e.is_folder(),
                EntryKind::File => !e.is_folder(),
            })
            .cloned()
            .collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<DriveFile, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::CreateFolder, format!("{parent_id}/{name}"))?;
        Ok(state.insert("folder", parent_id, name, true))
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        source: &Path,
    ) -> Result<DriveFile, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::CreateFile, format!("{parent_id}/{name}"))?;
        let content = std::fs::read(source)?;
        let entry = state.insert("file", parent_id, name, false);
        state.contents.insert(entry.id.clone(), content);
        Ok(entry)
    }

    async fn update_file(&self, file_id: &str, source: &Path) -> Result<DriveFile, DriveError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Update, file_id.to_string())?;
        let entry = state
            .entries
            .iter()
            .find(|e| e.id == file_id)
            .cloned()
            .ok_or_else(|| {
                DriveError::Io(io::Error::new(io::ErrorKind::NotFound, file_id.to_string()))
            })?;
        let content = std::fs::read(source)?;
        state.contents.insert(entry.id.clone(), content);
        Ok(entry)
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), DriveError> {
        let mut state = self.state.lock().unwrap();
        state.record(Op::Delete, file_id.to_string())?;
        state.entries.retain(|e| e.id != file_id);
        state.contents.remove(file_id);
        Ok(())
    }
}
