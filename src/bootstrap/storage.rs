//! 对象存储

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::AppError;

pub trait Storage: Send + Sync {
    /// 保存对象，返回公开访问地址
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    fn delete(&self, key: &str) -> Result<(), AppError>;

    fn public_url(&self, key: &str) -> String;
}

/// 拼接公开地址，两侧多余的 `/` 会被去掉
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// 只接受相对路径，且不能包含 `..`
fn check_key(key: &str) -> Result<(), AppError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(AppError::Generic(format!("invalid storage key '{}'", key)))
    }
}

pub struct LocalStorage {
    base_dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(base_dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            base_dir,
            public_base_url: public_base_url.to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Storage for LocalStorage {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError> {
        check_key(key)?;
        let path = self.base_dir.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::IO(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&path, bytes).map_err(|e| AppError::IO(format!("writing {}", path.display()), e))?;
        debug!(key = %key, size = bytes.len(), "object stored on disk");
        Ok(self.public_url(key))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        check_key(key)?;
        let path = self.base_dir.join(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::IO(format!("reading {}", path.display()), e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        check_key(key)?;
        let path = self.base_dir.join(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::IO(format!("removing {}", path.display()), e)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

pub struct MemoryStorage {
    public_base_url: String,
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, AppError> {
        check_key(key)?;
        self.objects.insert(key.to_string(), bytes.to_vec());
        Ok(self.public_url(key))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        check_key(key)?;
        Ok(self.objects.get(key).map(|entry| entry.value().clone()))
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        check_key(key)?;
        self.objects.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }
}

/// 按配置选择存储实现
pub fn build_storage(config: &StorageConfig) -> Arc<dyn Storage> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(config.base_dir.clone(), &config.public_base_url)),
        StorageBackend::Memory => Arc::new(MemoryStorage::new(&config.public_base_url)),
    }
}
