// src/fastbid/storage.rs

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::error::{AdapterError, Result};

/// 存放 FastBid 缓存脚本的持久化键值存储
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(key: &str, value: &str) -> Self {
        let storage = Self::new();
        if let Ok(mut items) = storage.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
        storage
    }
}

impl LocalStorage for InMemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        items.remove(key);
        Ok(())
    }
}

/// 以目录为后端的存储，每个 key 一个文件
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(AdapterError::Storage(format!("invalid storage key {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // 非 UTF-8 内容不可能是合法脚本
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(key, error = %e, "discarding unreadable storage item");
                self.remove_item(key)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key)?, value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let storage = InMemoryStorage::with_item("k", "v");
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn file_storage_treats_missing_as_empty() {
        let dir = std::env::temp_dir().join(format!("criteo-storage-{}", uuid::Uuid::new_v4()));
        let storage = FileStorage::new(&dir);
        assert_eq!(storage.get_item("criteo_fast_bid").unwrap(), None);
        storage.set_item("criteo_fast_bid", "// Hash: x\nbody").unwrap();
        assert_eq!(
            storage.get_item("criteo_fast_bid").unwrap().as_deref(),
            Some("// Hash: x\nbody")
        );
        storage.remove_item("criteo_fast_bid").unwrap();
        storage.remove_item("criteo_fast_bid").unwrap();
        assert_eq!(storage.get_item("criteo_fast_bid").unwrap(), None);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_storage_discards_non_utf8_items() {
        let dir = std::env::temp_dir().join(format!("criteo-storage-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("criteo_fast_bid");
        fs::write(&path, [0x2F, 0x2F, 0xFF, 0xFE, 0x0A]).unwrap();

        let storage = FileStorage::new(&dir);
        assert_eq!(storage.get_item("criteo_fast_bid").unwrap(), None);
        assert!(!path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let storage = FileStorage::new(std::env::temp_dir());
        assert!(storage.get_item("../etc/passwd").is_err());
    }
}
