use chrono::Utc;
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

pub const INDEX_FILE_NAME: &str = "snipmenu.list";

/// Prefix marking a content file as UTF-8.
const CONTENT_MARKER: [u8; 4] = [0x2, 0x9, 0x0, 0x8];

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("snippet file access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{0}' cannot be used as a snippet file name")]
    UnsafeId(String),
    #[error("snippet titles cannot contain '=' or line breaks: '{0}'")]
    InvalidTitle(String),
}

/// A snippet descriptor: the menu label plus the id its content file is named after.
///
/// The id is fixed at creation; only the label can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: String,
    value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, StoreError> {
        let key = valid_key(key.into())?;
        let value = value.into();
        if !is_safe_id(&value) {
            return Err(StoreError::UnsafeId(value));
        }
        Ok(Self { key, value })
    }

    /// Parses one trimmed index line. Lines without `=` are legacy bare labels and
    /// receive a fresh id.
    pub fn parse(line: &str, ids: &IdGenerator) -> Result<Self, StoreError> {
        match line.split_once('=') {
            Some((key, value)) if !value.trim().is_empty() => Entry::new(key, value.trim()),
            Some((key, _)) => Entry::new(key, ids.next()),
            None => Entry::new(line, ids.next()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> Result<(), StoreError> {
        self.key = valid_key(key.into())?;
        Ok(())
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn to_line(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// A title must survive the `key=value` line format unchanged.
pub fn is_valid_key(key: &str) -> bool {
    !key.contains(['=', '\n', '\r'])
}

fn valid_key(key: String) -> Result<String, StoreError> {
    if is_valid_key(&key) {
        Ok(key)
    } else {
        Err(StoreError::InvalidTitle(key))
    }
}

/// Ids must map to a plain file name inside the snippets directory, other than the index.
pub fn is_safe_id(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.eq_ignore_ascii_case(INDEX_FILE_NAME)
        && !value.contains(['/', '\\', '\n', '\r', '\0', ':'])
}

/// Hands out millisecond timestamps as ids, strictly increasing within the process.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn next(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Each id names one content file, so a repeated id keeps only its first entry.
pub fn parse_index(data: &str, ids: &IdGenerator) -> Vec<Entry> {
    let mut lines: Vec<&str> = data.split('\n').collect();
    while matches!(lines.last(), Some(last) if last.trim().is_empty()) {
        lines.pop();
    }
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match Entry::parse(line, ids) {
            Ok(entry) if seen.insert(entry.value.clone()) => Some(entry),
            Ok(entry) => {
                warn!("skipping index line '{line}': id {} is already used", entry.value);
                None
            }
            Err(err) => {
                warn!("skipping index line '{line}': {err}");
                None
            }
        })
        .collect()
}

pub fn serialize_index(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(Entry::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Owns the snippets directory: the index file and one content file per entry.
#[derive(Debug)]
pub struct SnippetStore {
    dir: PathBuf,
    ids: IdGenerator,
}

impl SnippetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ids: IdGenerator::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    pub fn content_path(&self, value: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_id(value) {
            return Err(StoreError::UnsafeId(value.to_string()));
        }
        Ok(self.dir.join(value))
    }

    /// Reads the index. A missing index is an empty list, not an error.
    pub fn load(&self) -> Result<Vec<Entry>, StoreError> {
        let bytes = match fs::read(self.index_path()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(parse_index(&decode(&bytes), &self.ids))
    }

    pub fn save(&self, entries: &[Entry]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.index_path(), serialize_index(entries))?;
        Ok(())
    }

    pub fn create_content(&self, value: &str, text: &str) -> Result<(), StoreError> {
        let path = self.content_path(value)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::with_capacity(CONTENT_MARKER.len() + text.len());
        buf.extend_from_slice(&CONTENT_MARKER);
        buf.extend_from_slice(text.as_bytes());
        fs::write(path, buf)?;
        Ok(())
    }

    /// Returns the snippet body, or an empty string when it cannot be read.
    pub fn load_content(&self, value: &str) -> String {
        let path = match self.content_path(value) {
            Ok(path) => path,
            Err(err) => {
                warn!("{err}");
                return String::new();
            }
        };
        match fs::read(&path) {
            Ok(bytes) => decode(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("content file {} is missing", path.display());
                String::new()
            }
            Err(err) => {
                warn!("failed to read {}: {err}", path.display());
                String::new()
            }
        }
    }

    /// Best effort; failures are only logged.
    pub fn delete_content(&self, value: &str) {
        let path = match self.content_path(value) {
            Ok(path) => path,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        if let Err(err) = fs::remove_file(&path) {
            warn!("failed to delete {}: {err}", path.display());
        }
    }

    /// A fresh id whose content file does not exist yet.
    pub fn next_id(&self) -> String {
        loop {
            let id = self.ids.next();
            if !self.dir.join(&id).exists() {
                return id;
            }
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&CONTENT_MARKER[..]) {
        Some(rest) => String::from_utf8_lossy(rest).into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
