//! Where topic documents come from

use crate::error::{CampusError, Result};
use ahash::{HashMap, HashMapExt};
use std::path::{Component, Path, PathBuf};

/// Resolves a topic's document reference to its raw text
pub trait DocumentSource: Send + Sync {
    /// Read the document named by `reference`
    fn load(&self, reference: &str) -> Result<String>;

    /// Human-readable location of `reference`, for logs
    fn describe(&self, reference: &str) -> String {
        reference.to_string()
    }
}

/// Documents stored as files under one directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.trim().is_empty() || escapes {
            return Err(CampusError::Config(format!(
                "Document reference must be a relative path inside the data directory: {:?}",
                reference
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentSource for DirectorySource {
    fn load(&self, reference: &str) -> Result<String> {
        let path = self.resolve(reference)?;
        std::fs::read_to_string(&path).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to read topic document: {:?}", path),
        })
    }

    fn describe(&self, reference: &str) -> String {
        self.root.join(reference).display().to_string()
    }
}

/// Documents held in memory, keyed by reference
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<String, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    pub fn with(mut self, reference: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(reference, text);
        self
    }

    pub fn insert(&mut self, reference: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(reference.into(), text.into());
    }
}

impl DocumentSource for InMemorySource {
    fn load(&self, reference: &str) -> Result<String> {
        self.documents.get(reference).cloned().ok_or_else(|| CampusError::Io {
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
            context: format!("No in-memory document named {:?}", reference),
        })
    }
}
