//! Content-hash duplicate suppression.
//!
//! The check-and-insert is one atomic operation in both backings: a single
//! `HashSet::insert` under the set mutex in volatile mode, a single
//! `INSERT OR IGNORE` in persistent mode. Two concurrent calls with
//! identical content never both report "new".

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::pool::ConnectionPool;

enum Backing {
    Volatile(Mutex<HashSet<String>>),
    Persistent(ConnectionPool),
}

/// Suppresses saves of content whose hash has been seen before.
pub struct DedupTracker {
    backing: Backing,
}

impl DedupTracker {
    /// In-process set; seen hashes are lost on restart.
    pub fn in_memory() -> Self {
        debug!("dedup tracker using in-memory set");
        Self {
            backing: Backing::Volatile(Mutex::new(HashSet::new())),
        }
    }

    /// SQLite-backed store that survives restarts.
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening persistent dedup store");
        Ok(Self {
            backing: Backing::Persistent(ConnectionPool::new(path)?),
        })
    }

    /// Persistent store at the platform default path.
    pub fn persistent_default() -> Result<Self> {
        Self::persistent(default_db_path()?)
    }

    /// Checks whether `body` has been seen before, recording it if not.
    ///
    /// The first call for a given content returns `false`; every later call
    /// returns `true`, regardless of interleaving across threads.
    pub fn is_duplicate(&self, body: &[u8]) -> Result<bool> {
        let digest = hash_content(body);
        match &self.backing {
            Backing::Volatile(set) => Ok(!set.lock().insert(digest)),
            Backing::Persistent(pool) => {
                let conn = pool.get()?;
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO seen_hashes (digest) VALUES (?1)",
                    [&digest],
                )?;
                Ok(inserted == 0)
            }
        }
    }

    /// Number of distinct hashes recorded.
    pub fn seen_count(&self) -> Result<u64> {
        match &self.backing {
            Backing::Volatile(set) => Ok(set.lock().len() as u64),
            Backing::Persistent(pool) => {
                let conn = pool.get()?;
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM seen_hashes", [], |row| row.get(0))?;
                Ok(count as u64)
            }
        }
    }
}

/// Default database path under the user data dir.
pub fn default_db_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "weir", "weir")
        .ok_or_else(|| StorageError::Config("could not determine app data directory".into()))?;
    Ok(dirs.data_dir().join("seen_hashes.sqlite"))
}

/// SHA-256 hex digest of the content.
pub fn hash_content(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

// Minimal hex encoding for digests.
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut hex = String::with_capacity(bytes.len() * 2);
        for &byte in bytes {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }
}
