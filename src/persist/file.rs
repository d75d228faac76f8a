//! File-backed persistence.
//!
//! Each key is stored in its own file:
//!
//! ```text
//! magic "CLH\0" | version u8 | crc32 u32 LE | length u64 LE | MessagePack body
//! ```
//!
//! Writes go to a temporary file that is synced and then renamed over the
//! old one, so a crash mid-save leaves the previous value readable.

use super::PersistenceAdapter;
use crate::error::{HistoryError, Result};
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Magic bytes for value files.
const VALUE_MAGIC: &[u8; 4] = b"CLH\0";

/// Current value file format version.
const VALUE_VERSION: u8 = 1;

/// Magic + version + checksum + length.
const HEADER_LEN: u64 = 4 + 1 + 4 + 8;

/// Durable key/value store rooted at a directory.
///
/// Holds an exclusive lock on the directory for its lifetime.
#[derive(Clone)]
pub struct FilePersistence {
    inner: Arc<FileStore>,
}

struct FileStore {
    path: PathBuf,
    _lock_file: File,
}

impl FilePersistence {
    /// Open (creating if needed) a store directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            inner: Arc::new(FileStore {
                path,
                _lock_file: lock_file,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| HistoryError::Locked)?;
        Ok(lock_file)
    }
}

impl FileStore {
    fn value_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(HistoryError::InvalidFormat(format!("invalid key: {key:?}")));
        }
        Ok(self.path.join(format!("{key}.bin")))
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.value_path(key)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != VALUE_MAGIC {
            return Err(HistoryError::InvalidFormat(format!(
                "invalid magic in {}",
                path.display()
            )));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != VALUE_VERSION {
            return Err(HistoryError::InvalidFormat(format!(
                "unsupported value version: {}",
                version[0]
            )));
        }

        let mut crc_bytes = [0u8; 4];
        file.read_exact(&mut crc_bytes)?;
        let expected = u32::from_le_bytes(crc_bytes);

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);

        let available = file.metadata()?.len().saturating_sub(HEADER_LEN);
        if len > available {
            return Err(HistoryError::Corruption(format!(
                "length {len} exceeds {available} body bytes in {}",
                path.display()
            )));
        }

        let mut body = vec![0u8; len as usize];
        file.read_exact(&mut body).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                HistoryError::Corruption(format!("truncated value file {}", path.display()))
            }
            _ => e.into(),
        })?;

        let got = crc32fast::hash(&body);
        if got != expected {
            return Err(HistoryError::ChecksumMismatch { expected, got });
        }

        Ok(Some(rmp_serde::from_slice(&body)?))
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.value_path(key)?;
        let tmp_path = path.with_extension("bin.tmp");
        let body = rmp_serde::to_vec(value)?;

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(VALUE_MAGIC)?;
            file.write_all(&[VALUE_VERSION])?;
            file.write_all(&crc32fast::hash(&body).to_le_bytes())?;
            file.write_all(&(body.len() as u64).to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || inner.read(&key)).await?
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || inner.write(&key, &value)).await?
    }
}
