//! Cart Persistence
//!
//! The cart lives on the shopper's device. Backends only ever see the full
//! list of lines.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::CartLine;
use crate::error::{Result, StorefrontError};

/// Durable local storage for cart lines
pub trait CartStorage: Send + Sync {
    /// Load saved lines; an empty list when nothing was saved yet
    fn load(&self) -> Result<Vec<CartLine>>;

    /// Replace the saved lines
    fn save(&self, lines: &[CartLine]) -> Result<()>;
}

/// In-memory storage (tests and server-side previews)
#[derive(Debug, Default)]
pub struct MemoryCartStorage {
    lines: RwLock<Vec<CartLine>>,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with previously saved lines
    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        Self {
            lines: RwLock::new(lines),
        }
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Result<Vec<CartLine>> {
        let lines = self
            .lines
            .read()
            .map_err(|_| StorefrontError::Storage("cart storage lock poisoned".into()))?;
        Ok(lines.clone())
    }

    fn save(&self, lines: &[CartLine]) -> Result<()> {
        let mut saved = self
            .lines
            .write()
            .map_err(|_| StorefrontError::Storage("cart storage lock poisoned".into()))?;
        *saved = lines.to_vec();
        Ok(())
    }
}

/// JSON file storage
#[derive(Debug, Clone)]
pub struct JsonFileCartStorage {
    path: PathBuf,
}

impl JsonFileCartStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for JsonFileCartStorage {
    fn load(&self) -> Result<Vec<CartLine>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, lines: &[CartLine]) -> Result<()> {
        let json = serde_json::to_vec(lines)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> CartLine {
        CartLine {
            product_variant_id: "apertura-black".into(),
            accessory_id: "none".into(),
            device_model_id: "iphone-15".into(),
            quantity: 2,
        }
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileCartStorage::new(dir.path().join("cart.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_persists_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileCartStorage::new(dir.path().join("cart.json"));
        storage.save(&[line()]).unwrap();

        let reopened = JsonFileCartStorage::new(storage.path());
        assert_eq!(reopened.load().unwrap(), vec![line()]);
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(JsonFileCartStorage::new(path).load().is_err());
    }
}
