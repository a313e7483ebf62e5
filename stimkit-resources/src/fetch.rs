use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ResourceError;

/// Retrieves raw bytes for a locator. Runs on blocking worker threads.
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Reads locators as paths. Relative paths resolve against `root`.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }
}

impl Fetcher for FsFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Err(ResourceError::Fetch {
                locator: locator.to_string(),
                reason: "network locators are not served from disk".into(),
            });
        }
        std::fs::read(self.resolve(locator)).map_err(|e| ResourceError::Fetch {
            locator: locator.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-memory asset table, for bundled assets and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(locator, bytes);
        self
    }

    pub fn insert(&mut self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(locator.into(), Arc::from(bytes.into()));
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        self.entries
            .get(locator)
            .map(|b| b.to_vec())
            .ok_or_else(|| ResourceError::Fetch {
                locator: locator.to_string(),
                reason: "not found".into(),
            })
    }
}
