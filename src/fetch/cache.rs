use crate::fetch::error::FetchError;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;

/// On-disk cache of raw API response bodies.
///
/// Entries are keyed by the SHA-256 of the full request URL and expire `ttl` after
/// they were written. Callers treat every error as a cache miss.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(dir: &Path, ttl: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.json"))
    }

    /// Returns the cached body for `url` if present and younger than the TTL.
    pub async fn get(&self, url: &str) -> Result<Option<String>, FetchError> {
        let path = self.entry_path(url);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FetchError::CacheRead(path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| FetchError::CacheRead(path.clone(), e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .map_err(|e| FetchError::SystemTimeCalculation(path.clone(), e))?;
        if age > self.ttl {
            debug!("Cache entry {:?} expired ({:?} old)", path, age);
            return Ok(None);
        }

        let body = fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::CacheRead(path.clone(), e))?;
        debug!("Cache hit for {} at {:?}", url, path);
        Ok(Some(body))
    }

    pub async fn put(&self, url: &str, body: &str) -> Result<(), FetchError> {
        if fs::metadata(&self.dir).await.is_err() {
            info!("Creating response cache directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| FetchError::CacheDirCreation(self.dir.clone(), e))?;
        }
        let path = self.entry_path(url);
        fs::write(&path, body)
            .await
            .map_err(|e| FetchError::CacheWrite(path, e))
    }
}
