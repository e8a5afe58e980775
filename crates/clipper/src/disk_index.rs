//! Index from structured cache keys to files in one cache directory.
//!
//! File names are derived from a hash of the key, so a fresh process can find
//! files written by an earlier one without parsing names back into keys.

use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ClipError, Result};

/// A key that can be persisted as a deterministic file name.
pub trait DiskKey: Clone + Eq + Hash + Send + Sync {
    /// Stable textual identity; equal keys must produce equal identities.
    fn identity(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskRecord {
    pub path: PathBuf,
    pub created_at: SystemTime,
}

impl DiskRecord {
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or(Duration::ZERO)
    }
}

pub struct DiskIndex<K: DiskKey> {
    dir: PathBuf,
    prefix: &'static str,
    ttl: Duration,
    entries: DashMap<K, DiskRecord>,
}

impl<K: DiskKey> DiskIndex<K> {
    pub fn new(dir: impl Into<PathBuf>, prefix: &'static str, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            prefix,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path_for(&self, key: &K) -> PathBuf {
        self.dir.join(format!("{}.mp4", self.stem_for(key)))
    }

    /// Scratch path for one write attempt on `key`. Unique per call, so
    /// concurrent writers of the same key never share a file.
    pub fn part_path_for(&self, key: &K) -> PathBuf {
        static ATTEMPT: AtomicU64 = AtomicU64::new(0);
        let attempt = ATTEMPT.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}-{attempt}.part.mp4",
            self.stem_for(key),
            std::process::id()
        ))
    }

    fn stem_for(&self, key: &K) -> String {
        let digest = hex::encode(Sha256::digest(key.identity().as_bytes()));
        format!("{}-{}", self.prefix, &digest[..16])
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ClipError::io_path("creating cache directory", &self.dir, e))
    }

    /// Unexpired record for `key`: the in-memory index first, then the file
    /// system (adopting a file left by an earlier run).
    pub async fn lookup(&self, key: &K) -> Option<DiskRecord> {
        let now = SystemTime::now();

        let known = self.entries.get(key).map(|r| r.clone());
        if let Some(record) = known {
            if record.age(now) < self.ttl && file_exists(&record.path).await {
                return Some(record);
            }
            self.entries.remove(key);
        }

        let path = self.path_for(key);
        let created_at = tokio::fs::metadata(&path).await.ok()?.modified().ok()?;
        let record = DiskRecord { path, created_at };
        if record.age(now) >= self.ttl {
            return None;
        }

        debug!(path = %record.path.display(), "Adopted cached file from disk");
        self.entries.insert(key.clone(), record.clone());
        Some(record)
    }

    /// Record a file that was just written for `key`.
    pub fn insert(&self, key: K, path: PathBuf) -> DiskRecord {
        let record = DiskRecord {
            path,
            created_at: SystemTime::now(),
        };
        self.entries.insert(key, record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete every file in the directory older than the TTL and drop index
    /// entries that no longer point at a live file. Returns the number of
    /// files deleted.
    pub async fn sweep(&self) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ClipError::io_path("reading cache directory", &self.dir, e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ClipError::io_path("reading cache directory", &self.dir, e))?
        {
            let path = entry.path();
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < self.ttl {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to remove stale cache file")
                }
            }
        }

        let ttl = self.ttl;
        self.entries.retain(|_, record| record.age(now) < ttl);

        let tracked: Vec<(K, PathBuf)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().path.clone()))
            .collect();
        for (key, path) in tracked {
            if !file_exists(&path).await {
                self.entries.remove_if(&key, |_, record| record.path == path);
            }
        }

        if removed > 0 {
            info!(dir = %self.dir.display(), removed, "Swept stale cache files");
        }
        Ok(removed)
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
