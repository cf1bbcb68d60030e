//! Configuration Sources
//!
//! Where sitemap documents and the resources they name come from. A source
//! exposes a modification stamp so a compiled tree can detect staleness.

use crate::error::ProcessingError;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// A readable document with a modification stamp
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn uri(&self) -> &str;

    /// Last modification time, `None` if unknown or the source is missing
    fn last_modified(&self) -> Option<SystemTime>;

    fn load(&self) -> Result<Vec<u8>, ProcessingError>;

    /// A sibling source, relative to this one's location
    fn resolve(&self, relative: &str) -> Arc<dyn ConfigSource>;
}

/// Join a relative reference onto the directory of `base`, folding `.` and `..`
pub fn resolve_path(base: &str, relative: &str) -> String {
    let joined = if relative.starts_with('/') {
        relative.to_string()
    } else {
        match base.rfind('/') {
            Some(slash) => format!("{}{}", &base[..=slash], relative),
            None => relative.to_string(),
        }
    };

    let absolute = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(s) if *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    let mut path = segments.join("/");
    if absolute {
        path.insert(0, '/');
    }
    path
}

/// A source on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    uri: String,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let uri = path.to_string_lossy().into_owned();
        FileSource { path, uri }
    }
}

impl ConfigSource for FileSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn load(&self) -> Result<Vec<u8>, ProcessingError> {
        std::fs::read(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ProcessingError::ResourceNotFound(self.uri.clone()),
            _ => ProcessingError::Io(err),
        })
    }

    fn resolve(&self, relative: &str) -> Arc<dyn ConfigSource> {
        Arc::new(FileSource::new(resolve_path(&self.uri, relative)))
    }
}

#[derive(Debug)]
struct StoredDocument {
    content: Vec<u8>,
    modified: SystemTime,
}

/// Shared in-memory document store with a logical clock.
///
/// Each write advances the clock by one second, so successive updates
/// always carry strictly increasing stamps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    documents: HashMap<String, StoredDocument>,
    clock: u64,
}

impl MemoryStoreInner {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Store or replace a document
    pub fn insert<S: Into<String>, C: Into<Vec<u8>>>(&self, path: S, content: C) {
        if let Ok(mut inner) = self.inner.write() {
            let modified = inner.tick();
            inner.documents.insert(
                path.into(),
                StoredDocument {
                    content: content.into(),
                    modified,
                },
            );
        }
    }

    /// Advance a document's stamp without changing its content
    pub fn touch(&self, path: &str) {
        if let Ok(mut inner) = self.inner.write() {
            let modified = inner.tick();
            if let Some(document) = inner.documents.get_mut(path) {
                document.modified = modified;
            }
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.documents.remove(path);
        }
    }

    pub fn source<S: Into<String>>(&self, path: S) -> MemorySource {
        MemorySource {
            store: self.clone(),
            path: path.into(),
        }
    }
}

/// A document held by a `MemoryStore`
#[derive(Debug, Clone)]
pub struct MemorySource {
    store: MemoryStore,
    path: String,
}

impl ConfigSource for MemorySource {
    fn uri(&self) -> &str {
        &self.path
    }

    fn last_modified(&self) -> Option<SystemTime> {
        let inner = self.store.inner.read().ok()?;
        inner.documents.get(&self.path).map(|d| d.modified)
    }

    fn load(&self) -> Result<Vec<u8>, ProcessingError> {
        let inner = self
            .store
            .inner
            .read()
            .map_err(|_| ProcessingError::LockPoisoned)?;
        inner
            .documents
            .get(&self.path)
            .map(|d| d.content.clone())
            .ok_or_else(|| ProcessingError::ResourceNotFound(self.path.clone()))
    }

    fn resolve(&self, relative: &str) -> Arc<dyn ConfigSource> {
        Arc::new(self.store.source(resolve_path(&self.path, relative)))
    }
}
