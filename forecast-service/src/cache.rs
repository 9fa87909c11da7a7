use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const STORE_FILE: &str = "cache.json";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store {path} is not usable: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry<V> {
    value: V,
    /// Unix seconds at write time
    timestamp: f64,
}

/// Time-to-live cache with lazy expiry.
///
/// Entries are only inspected when read: a read that finds an entry at least
/// `ttl` old removes it and reports a miss. There is no capacity bound and no
/// background sweep. With a backing store, the whole map is rewritten after
/// every `set` and every expiring `get`.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl_seconds: f64,
    store: Option<PathBuf>,
}

impl<V> TtlCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn in_memory(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_seconds: ttl_seconds as f64,
            store: None,
        }
    }

    /// Open the store at `<dir>/cache.json`, creating it when missing.
    ///
    /// A store that cannot be parsed is logged and replaced by an empty map.
    pub async fn persistent(dir: impl AsRef<Path>, ttl_seconds: u64) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        let path = dir.join(STORE_FILE);
        let store_error = |source| CacheError::Store {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(store_error)?;

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(payload) => serde_json::from_str(&payload).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache store");
                HashMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                write_atomic(&path, b"{}").await.map_err(store_error)?;
                HashMap::new()
            }
            Err(e) => return Err(store_error(e)),
        };

        info!(path = %path.display(), entries = entries.len(), "Cache store opened");

        Ok(Self {
            entries: RwLock::new(entries),
            ttl_seconds: ttl_seconds as f64,
            store: Some(path),
        })
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = unix_now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    debug!(key = %key, "Cache miss");
                    return None;
                }
                Some(entry) if self.is_fresh(entry, now) => {
                    debug!(key = %key, "Cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // A writer may have refreshed the entry between the two locks.
        if let Some(entry) = entries.get(key)
            && self.is_fresh(entry, now)
        {
            return Some(entry.value.clone());
        }

        if entries.remove(key).is_some() {
            info!(key = %key, "Cache expired");
            self.persist(&entries).await;
        }
        None
    }

    pub async fn set(&self, key: String, value: V) {
        let mut entries = self.entries.write().await;
        info!(key = %key, "Set cache");
        entries.insert(
            key,
            CacheEntry {
                value,
                timestamp: unix_now(),
            },
        );
        self.persist(&entries).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: f64) -> bool {
        now - entry.timestamp < self.ttl_seconds
    }

    /// Rewrite the backing store. Called with the write lock held so
    /// rewrites from this process never interleave.
    async fn persist(&self, entries: &HashMap<String, CacheEntry<V>>) {
        let Some(path) = &self.store else {
            return;
        };

        let payload = match serde_json::to_vec(entries) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize cache");
                return;
            }
        };

        if let Err(e) = write_atomic(path, &payload).await {
            error!(path = %path.display(), error = %e, "Failed to write cache store");
        }
    }
}

fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}
