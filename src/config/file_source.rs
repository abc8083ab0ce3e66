// src/config/file_source.rs

use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::config::AdapterConfig;

pub trait ConfigSource: Send + Sync {
    fn load(&self) -> AdapterConfig;
}

/// 从 JSON 文件读取适配器配置，文件缺失或格式错误时回退到默认值
pub struct FileConfigSource {
    pub path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> AdapterConfig {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config file unreadable, using defaults");
                return AdapterConfig::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "config file malformed, using defaults");
            AdapterConfig::default()
        })
    }
}
