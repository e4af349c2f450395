//! [`InMemoryStage`], a fake remote stage.
//!
//! Files live in a map keyed by their path below the stage root
//! (`v1/app/main.py`). Every call is recorded, and individual calls can be
//! made to fail.

use chrono::{DateTime, TimeZone, Utc};
use stage_diff::{RemoteEntry, RemoteError, RemoteStage, StageLocation};
use stage_fs::{StagePath, compute_bytes_md5sum};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How listed entries report their hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// Plain MD5 of the content
    Md5,
    /// Multi-part MD5 with the given part size
    MultiPart { chunk_size: u64 },
    /// No hash at all
    Missing,
}

/// A recorded call against the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCall {
    List { location: String },
    Delete { address: String, role: String },
    Upload {
        local_path: PathBuf,
        directory: String,
        role: String,
    },
    UseRole { role: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    List,
    Delete(String),
    Upload(String),
    UseRole(String),
}

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    hash: Option<String>,
}

/// In-memory [`RemoteStage`].
///
/// # Example
///
/// ```rust,no_run
/// use stage_test_utils::InMemoryStage;
///
/// let mut stage = InMemoryStage::named("stg").with_role("deployer");
/// stage.put_file("app/main.py", "print('hi')");
/// assert_eq!(stage.files(), vec!["app/main.py"]);
/// ```
#[derive(Debug)]
pub struct InMemoryStage {
    /// Prefix reported in listings; empty for the user stage
    name: String,
    role: String,
    hash_mode: HashMode,
    files: BTreeMap<String, StoredFile>,
    failures: Vec<Failure>,
    calls: RefCell<Vec<StageCall>>,
}

impl InMemoryStage {
    /// A named stage whose listing reports `name/<path>`.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: "PUBLIC".to_string(),
            hash_mode: HashMode::Md5,
            files: BTreeMap::new(),
            failures: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// A user stage whose listing reports bare paths.
    pub fn user() -> Self {
        Self::named("")
    }

    /// Start the session on `role`.
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    /// Hash mode for files stored from now on.
    pub fn with_hash_mode(mut self, mode: HashMode) -> Self {
        self.hash_mode = mode;
        self
    }

    /// Seed a file directly, bypassing call recording.
    pub fn put_file(&mut self, key: &str, content: impl AsRef<[u8]>) {
        let content = content.as_ref().to_vec();
        let hash = self.hash_for(&content);
        self.files
            .insert(StagePath::from(key).as_str().to_string(), StoredFile { content, hash });
    }

    /// Override the hash reported for `key`.
    pub fn set_hash(&mut self, key: &str, hash: Option<&str>) {
        if let Some(file) = self.files.get_mut(StagePath::from(key).as_str()) {
            file.hash = hash.map(str::to_string);
        }
    }

    /// Make listing fail.
    pub fn fail_listing(&mut self) {
        self.failures.push(Failure::List);
    }

    /// Make deleting any address ending in `suffix` fail.
    pub fn fail_delete_of(&mut self, suffix: &str) {
        self.failures.push(Failure::Delete(suffix.to_string()));
    }

    /// Make uploading a local file named `file_name` fail.
    pub fn fail_upload_of(&mut self, file_name: &str) {
        self.failures.push(Failure::Upload(file_name.to_string()));
    }

    /// Make switching to `role` fail.
    pub fn fail_use_role(&mut self, role: &str) {
        self.failures.push(Failure::UseRole(role.to_string()));
    }

    /// Stored keys, sorted.
    pub fn files(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn content(&self, key: &str) -> Option<&[u8]> {
        self.files.get(key).map(|file| file.content.as_slice())
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StageCall> {
        self.calls.borrow().clone()
    }

    /// Recorded mutations only (deletes and uploads).
    pub fn mutations(&self) -> Vec<StageCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, StageCall::Delete { .. } | StageCall::Upload { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn hash_for(&self, content: &[u8]) -> Option<String> {
        match self.hash_mode {
            HashMode::Md5 => Some(compute_bytes_md5sum(content, None)),
            HashMode::MultiPart { chunk_size } => Some(compute_bytes_md5sum(content, Some(chunk_size))),
            HashMode::Missing => None,
        }
    }

    fn record(&self, call: StageCall) {
        self.calls.borrow_mut().push(call);
    }

    fn listed_name(&self, key: &str) -> String {
        if self.name.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.name, key)
        }
    }
}

/// Stage key of a fully qualified address: everything after the stage
/// identifier.
fn address_key(address: &str) -> String {
    match address.split_once('/') {
        Some((_, rest)) => StagePath::from(rest).as_str().to_string(),
        None => String::new(),
    }
}

fn listed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl RemoteStage for InMemoryStage {
    fn list(&self, location: &StageLocation) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.record(StageCall::List {
            location: location.to_string(),
        });
        if self.failures.contains(&Failure::List) {
            return Err(RemoteError::new(format!("listing {} refused", location)));
        }

        Ok(self
            .files
            .iter()
            .filter(|(key, _)| StagePath::from(key.as_str()).starts_with(location.subpath()))
            .map(|(key, file)| RemoteEntry {
                path: self.listed_name(key),
                size: file.content.len() as u64,
                hash: file.hash.clone(),
                last_modified: listed_at(),
            })
            .collect())
    }

    fn delete(&mut self, address: &str, role: &str) -> Result<(), RemoteError> {
        self.record(StageCall::Delete {
            address: address.to_string(),
            role: role.to_string(),
        });
        let refused = self
            .failures
            .iter()
            .any(|f| matches!(f, Failure::Delete(suffix) if address.ends_with(suffix.as_str())));
        if refused {
            return Err(RemoteError::new(format!("delete of {} refused", address)));
        }

        match self.files.remove(&address_key(address)) {
            Some(_) => Ok(()),
            None => Err(RemoteError::new(format!("{} does not exist", address))),
        }
    }

    fn upload(
        &mut self,
        local_path: &Path,
        destination_directory: &str,
        role: &str,
    ) -> Result<(), RemoteError> {
        self.record(StageCall::Upload {
            local_path: local_path.to_path_buf(),
            directory: destination_directory.to_string(),
            role: role.to_string(),
        });
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RemoteError::new(format!("{} has no file name", local_path.display())))?;
        let refused = self
            .failures
            .iter()
            .any(|f| matches!(f, Failure::Upload(name) if *name == file_name));
        if refused {
            return Err(RemoteError::new(format!("upload of {} refused", file_name)));
        }

        let content = std::fs::read(local_path)
            .map_err(|e| RemoteError::new(format!("{}: {}", local_path.display(), e)))?;
        let key = StagePath::from(address_key(destination_directory)).join(&file_name);
        self.put_file(key.as_str(), content);
        Ok(())
    }

    fn current_role(&self) -> Result<String, RemoteError> {
        Ok(self.role.clone())
    }

    fn use_role(&mut self, role: &str) -> Result<(), RemoteError> {
        self.record(StageCall::UseRole {
            role: role.to_string(),
        });
        if self.failures.contains(&Failure::UseRole(role.to_string())) {
            return Err(RemoteError::new(format!("role {} is not granted", role)));
        }
        self.role = role.to_string();
        Ok(())
    }
}
