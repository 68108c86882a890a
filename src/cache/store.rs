// src/cache/store.rs
//! Key → JSON document persistence.
//!
//! Keys are slash-separated (`market-reports/latest`). The file store maps a
//! key to `<root>/<key>.json` and writes through a temp file + rename so a
//! reader never observes a half-written document.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Raw document text, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Replace the document under `key` (all-or-nothing).
    async fn put(&self, key: &str, body: &str) -> Result<()>;
    /// Keys under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Outcome of a typed read: the store may hold bytes that no longer parse.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    Missing,
    Unparsable(String),
    Found(T),
}

pub async fn read_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    key: &str,
) -> Result<ReadOutcome<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(ReadOutcome::Missing);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(doc) => Ok(ReadOutcome::Found(doc)),
        Err(e) => Ok(ReadOutcome::Unparsable(e.to_string())),
    }
}

pub async fn write_doc<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    key: &str,
    doc: &T,
) -> Result<()> {
    let body =
        serde_json::to_string_pretty(doc).map_err(|e| PipelineError::persistence(key, e))?;
    store.put(key, &body).await
}

fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(PipelineError::persistence(key, "invalid document key"));
    }
    Ok(())
}

// ------------------------------------------------------------
// File store
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::persistence(key, e)),
        }
    }

    async fn put(&self, key: &str, body: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::persistence(key, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body.as_bytes())
            .await
            .map_err(|e| PipelineError::persistence(key, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::persistence(key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            validate_key(prefix)?;
            self.root.join(prefix)
        };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::persistence(prefix, e)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::persistence(prefix, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".json") {
                if prefix.is_empty() {
                    keys.push(stem.to_string());
                } else {
                    keys.push(format!("{prefix}/{stem}"));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ------------------------------------------------------------
// In-memory store
// ------------------------------------------------------------

/// Volatile store; used when no data directory is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let g = self.docs.lock().unwrap_or_else(|p| p.into_inner());
        Ok(g.get(key).cloned())
    }

    async fn put(&self, key: &str, body: &str) -> Result<()> {
        validate_key(key)?;
        let mut g = self.docs.lock().unwrap_or_else(|p| p.into_inner());
        g.insert(key.to_string(), body.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let g = self.docs.lock().unwrap_or_else(|p| p.into_inner());
        Ok(g.keys()
            .filter(|k| {
                prefix.is_empty()
                    || k.strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/') && !rest[1..].contains('/'))
            })
            .cloned()
            .collect())
    }
}
