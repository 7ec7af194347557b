// src/cursor.rs
//! Cursor persistence: the id of the furthest item considered.
//! On disk it is the bare token, nothing else.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor io on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>, CursorError>;
    async fn save(&self, cursor: &str) -> Result<(), CursorError>;
}

/// No persistence; a restart starts from the newest page again.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    inner: Mutex<Option<String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Some(cursor.into())),
        }
    }
}

#[async_trait::async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<String>, CursorError> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn save(&self, cursor: &str) -> Result<(), CursorError> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(cursor.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cursor".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> CursorError {
        CursorError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<String>, CursorError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => {
                let t = s.trim();
                Ok((!t.is_empty()).then(|| t.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn save(&self, cursor: &str) -> Result<(), CursorError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| self.io_err(e))?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, cursor.as_bytes())
            .await
            .map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        Ok(())
    }
}
