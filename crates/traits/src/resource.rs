//! ResourceProvider trait for abstracting resource loading.
//!
//! Stylesheets, images and imported CSS are all fetched through this trait,
//! so a conversion never touches the network or filesystem on its own.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{path}': {message}")]
    LoadFailed { path: String, message: String },

    #[error("Unsupported resource reference: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

/// Shared resource data type (reference-counted bytes).
pub type SharedResourceData = Arc<Vec<u8>>;

/// A source of stylesheet, image and font bytes keyed by the reference found
/// in the document (`href`, `src`, `@import`).
pub trait ResourceProvider: Send + Sync + Debug {
    /// Load a resource by its path/URI.
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    /// Check if a resource exists.
    fn exists(&self, path: &str) -> bool;

    /// Get the base path for resolving relative resources.
    ///
    /// Returns `None` if the provider doesn't use path-based resolution.
    fn base_path(&self) -> Option<&str> {
        None
    }

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Normalizes a document reference into a relative, slash-separated key.
///
/// Query strings and fragments are dropped, `.` segments removed and `..`
/// segments folded. Returns an error for references that climb above the root
/// or that name a remote scheme.
pub fn normalize_reference(reference: &str) -> Result<String, ResourceError> {
    let trimmed = reference.trim();
    let without_suffix = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if let Some((scheme, _)) = without_suffix.split_once(':')
        && scheme.len() > 1
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        if !scheme.eq_ignore_ascii_case("file") {
            return Err(ResourceError::Unsupported(reference.to_string()));
        }
    }
    let path = without_suffix
        .strip_prefix("file://")
        .unwrap_or(without_suffix)
        .replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ResourceError::LoadFailed {
                        path: reference.to_string(),
                        message: "reference escapes the resource root".to_string(),
                    });
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(ResourceError::NotFound(reference.to_string()));
    }
    Ok(segments.join("/"))
}

/// An in-memory resource provider.
///
/// Resources are stored in memory and must be pre-populated before use.
/// Keys are normalized, so `./css/site.css` and `css/site.css` name the same entry.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    resources: std::sync::RwLock<std::collections::HashMap<String, SharedResourceData>>,
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not normalize or the lock is poisoned.
    pub fn add(&self, path: impl Into<String>, data: Vec<u8>) -> Result<(), ResourceError> {
        self.add_shared(path, Arc::new(data))
    }

    /// Add a resource from shared data.
    pub fn add_shared(
        &self,
        path: impl Into<String>,
        data: SharedResourceData,
    ) -> Result<(), ResourceError> {
        let path_string = path.into();
        let key = normalize_reference(&path_string)?;
        let mut resources = self
            .resources
            .write()
            .map_err(|_| ResourceError::LoadFailed {
                path: path_string.clone(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources.insert(key, data);
        Ok(())
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let key = normalize_reference(path)?;
        let resources = self
            .resources
            .read()
            .map_err(|_| ResourceError::LoadFailed {
                path: path.to_string(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources
            .get(&key)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        let Ok(key) = normalize_reference(path) else {
            return false;
        };
        self.resources
            .read()
            .map(|r| r.contains_key(&key))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryResourceProvider"
    }
}

/// Reads resources from a base directory. References are resolved relative to
/// it and may not climb out of it.
#[derive(Debug, Clone)]
pub struct FilesystemResourceProvider {
    base: PathBuf,
    base_display: String,
}

impl FilesystemResourceProvider {
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().to_path_buf();
        let base_display = base.to_string_lossy().into_owned();
        Self { base, base_display }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, ResourceError> {
        let relative = normalize_reference(reference)?;
        Ok(self.base.join(relative))
    }
}

impl ResourceProvider for FilesystemResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let full = self.resolve(path)?;
        log::debug!("Loading resource '{}' from {}", path, full.display());
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Arc::new(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResourceError::NotFound(path.to_string()))
            }
            Err(e) => Err(ResourceError::LoadFailed {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn base_path(&self) -> Option<&str> {
        Some(&self.base_display)
    }

    fn name(&self) -> &'static str {
        "FilesystemResourceProvider"
    }
}
