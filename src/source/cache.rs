//! On-disk document cache
//!
//! Every source URI owns two files in the cache directory, both named after
//! the SHA-1 of the URI: `{key}.pdf` for a finished document and
//! `{key}.pdf.tmp` for a download in progress. The directory is shared by
//! every view in the process.

use crate::error::Result;
use glob::Pattern;
use sha1::{Digest, Sha1};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FINAL_SUFFIX: &str = ".pdf";
const TEMP_SUFFIX: &str = ".pdf.tmp";

/// Cache key for a URI: lowercase hex SHA-1 of its bytes
pub fn cache_key(uri: &str) -> String {
    hex::encode(Sha1::digest(uri.as_bytes()))
}

/// Paths owned by one source URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Completed, valid document
    pub final_path: PathBuf,
    /// In-progress or interrupted download
    pub temp_path: PathBuf,
}

/// Outcome of checking the cache for an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Finished document present and no leftover temp file
    Hit(PathBuf),
    /// A leftover temp file was found and removed
    StaleTemp,
    Miss,
}

/// Content-addressed document cache rooted at one directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Derive the cache paths for `uri`
    pub fn entry(&self, uri: &str) -> CacheEntry {
        let key = cache_key(uri);
        CacheEntry {
            final_path: self.dir.join(format!("{}{}", key, FINAL_SUFFIX)),
            temp_path: self.dir.join(format!("{}{}", key, TEMP_SUFFIX)),
            key,
        }
    }

    /// Create the cache directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Check whether `entry` can be served from disk.
    ///
    /// A temp file is never trusted: it is deleted and the entry reported as
    /// stale, even if a finished file sits next to it. Filesystem errors
    /// count as absence.
    pub async fn lookup(&self, entry: &CacheEntry) -> CacheLookup {
        if exists(&entry.temp_path).await {
            remove_quietly(&entry.temp_path).await;
            return CacheLookup::StaleTemp;
        }
        if exists(&entry.final_path).await {
            return CacheLookup::Hit(entry.final_path.clone());
        }
        CacheLookup::Miss
    }

    /// Remove both files of `entry`, ignoring absence
    pub async fn purge(&self, entry: &CacheEntry) {
        remove_quietly(&entry.temp_path).await;
        remove_quietly(&entry.final_path).await;
    }

    /// Remove only the in-progress file of `entry`; a finished document stays
    pub async fn discard_temp(&self, entry: &CacheEntry) {
        remove_quietly(&entry.temp_path).await;
    }

    /// Temp files currently present in the cache directory
    pub fn stale_temp_files(&self) -> Vec<PathBuf> {
        self.matching(TEMP_SUFFIX)
    }

    /// Delete every temp file in the cache directory.
    /// Only safe while no download is running in this process.
    pub async fn purge_stale_temps(&self) -> usize {
        let mut removed = 0;
        for path in self.stale_temp_files() {
            if tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Delete every cached document and temp file, returning how many files
    /// were removed
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self
            .matching(FINAL_SUFFIX)
            .into_iter()
            .chain(self.matching(TEMP_SUFFIX))
        {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    fn matching(&self, suffix: &str) -> Vec<PathBuf> {
        let Some(dir) = self.dir.to_str() else {
            return Vec::new();
        };
        let pattern = format!("{}/*{}", Pattern::escape(dir), suffix);
        match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "invalid cache glob pattern");
                Vec::new()
            }
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a file, treating absence as success and logging anything else
pub(crate) async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "failed to remove cache file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_key_is_sha1_hex() {
        assert_eq!(
            cache_key("https://example.com/test.pdf"),
            "ca3e6227218055f59b9fb19439b75fc4e14300fa"
        );
        assert_eq!(cache_key(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_entry_paths_are_deterministic() {
        let cache = DiskCache::new("/cache");
        let a = cache.entry("https://example.com/test.pdf");
        let b = cache.entry("https://example.com/test.pdf");
        assert_eq!(a, b);
        assert_eq!(
            a.final_path,
            PathBuf::from("/cache/ca3e6227218055f59b9fb19439b75fc4e14300fa.pdf")
        );
        assert_eq!(
            a.temp_path,
            PathBuf::from("/cache/ca3e6227218055f59b9fb19439b75fc4e14300fa.pdf.tmp")
        );
        assert_ne!(a, cache.entry("https://example.com/other.pdf"));
    }

    #[tokio::test]
    async fn test_lookup_miss_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("https://example.com/test.pdf");
        assert_eq!(cache.lookup(&entry).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_lookup_missing_dir_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("not-created"));
        let entry = cache.entry("https://example.com/test.pdf");
        assert_eq!(cache.lookup(&entry).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_lookup_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("https://example.com/test.pdf");
        std::fs::write(&entry.final_path, b"%PDF-1.4").unwrap();

        assert_eq!(
            cache.lookup(&entry).await,
            CacheLookup::Hit(entry.final_path.clone())
        );
    }

    #[tokio::test]
    async fn test_lookup_temp_wins_over_final() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("https://example.com/test.pdf");
        std::fs::write(&entry.final_path, b"%PDF-1.4").unwrap();
        std::fs::write(&entry.temp_path, b"%PDF-1.").unwrap();

        assert_eq!(cache.lookup(&entry).await, CacheLookup::StaleTemp);
        assert!(!entry.temp_path.exists());
    }

    #[tokio::test]
    async fn test_purge_removes_both() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("a");
        std::fs::write(&entry.final_path, b"x").unwrap();
        std::fs::write(&entry.temp_path, b"y").unwrap();

        cache.purge(&entry).await;
        assert!(!entry.final_path.exists());
        assert!(!entry.temp_path.exists());

        // Purging an absent entry is fine
        cache.purge(&entry).await;
    }

    #[tokio::test]
    async fn test_discard_temp_keeps_final() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("a");
        std::fs::write(&entry.final_path, b"x").unwrap();
        std::fs::write(&entry.temp_path, b"y").unwrap();

        cache.discard_temp(&entry).await;
        assert!(entry.final_path.exists());
        assert!(!entry.temp_path.exists());
    }

    #[tokio::test]
    async fn test_purge_stale_temps_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let a = cache.entry("a");
        let b = cache.entry("b");
        std::fs::write(&a.final_path, b"x").unwrap();
        std::fs::write(&a.temp_path, b"x").unwrap();
        std::fs::write(&b.temp_path, b"x").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        assert_eq!(cache.stale_temp_files().len(), 2);
        assert_eq!(cache.purge_stale_temps().await, 2);
        assert!(a.final_path.exists());
        assert!(cache.stale_temp_files().is_empty());

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(!a.final_path.exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }
}
