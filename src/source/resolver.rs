//! Classification and acquisition of non-network sources

use crate::error::{Error, Result};
use crate::source::cache::{remove_quietly, CacheEntry};
use crate::source::descriptor::{AssetBundle, ASSET_SCHEME};
use base64::Engine;
use std::path::{Path, PathBuf};

/// Prefix shared by every inline PDF payload
const BASE64_MARKER: &str = "data:application/pdf;base64";
const BASE64_PREFIX: &str = "data:application/pdf;base64,";
const FILE_SCHEME: &str = "file://";

/// Where a URI's bytes come from, checked in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind<'a> {
    /// `http://` or `https://` URL
    Network(&'a str),
    /// Asset name following `bundle-assets://`
    Asset(&'a str),
    /// Payload following the `data:application/pdf;base64,` prefix
    Base64(&'a str),
    /// Local path with any `file://` prefix removed
    File(&'a str),
}

/// Classify a non-empty URI
pub fn classify(uri: &str) -> SourceKind<'_> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        SourceKind::Network(uri)
    } else if let Some(name) = uri.strip_prefix(ASSET_SCHEME) {
        SourceKind::Asset(name)
    } else if uri.starts_with(BASE64_MARKER) {
        SourceKind::Base64(strip_prefix_ignore_case(uri, BASE64_PREFIX).unwrap_or(uri))
    } else {
        SourceKind::File(strip_prefix_ignore_case(uri, FILE_SCHEME).unwrap_or(uri))
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

/// Copy a bundled asset byte-for-byte into the entry.
/// The copy lands on the temp path first and is renamed into place.
pub async fn resolve_asset(
    assets: Option<&dyn AssetBundle>,
    name: &str,
    entry: &CacheEntry,
) -> Result<PathBuf> {
    let bundle = assets.ok_or_else(|| Error::AssetNotFound {
        name: name.to_string(),
    })?;
    let source = bundle.locate(name)?;

    let copied = tokio::fs::copy(&source, &entry.temp_path).await.map(|_| ());
    commit(copied, entry).await
}

/// Decode an inline base64 payload into the entry.
/// ASCII whitespace inside the payload is ignored.
pub async fn resolve_base64(payload: &str, entry: &CacheEntry) -> Result<PathBuf> {
    let data = decode_base64(payload)?;

    let written = tokio::fs::write(&entry.temp_path, &data).await;
    commit(written, entry).await
}

/// Move a fully written temp file onto the final path, or drop it
async fn commit(written: std::io::Result<()>, entry: &CacheEntry) -> Result<PathBuf> {
    let renamed = match written {
        Ok(()) => tokio::fs::rename(&entry.temp_path, &entry.final_path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = renamed {
        remove_quietly(&entry.temp_path).await;
        return Err(e.into());
    }
    Ok(entry.final_path.clone())
}

fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD;
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(engine.decode(compact)?)
}

/// Local files are viewed in place
pub fn resolve_path(path: &str) -> PathBuf {
    Path::new(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::cache::DiskCache;
    use crate::source::descriptor::DirAssetBundle;
    use rstest::rstest;

    #[rstest]
    #[case("http://example.com/a.pdf", SourceKind::Network("http://example.com/a.pdf"))]
    #[case("https://example.com/a.pdf", SourceKind::Network("https://example.com/a.pdf"))]
    #[case("bundle-assets://docs/a.pdf", SourceKind::Asset("docs/a.pdf"))]
    #[case("data:application/pdf;base64,JVBERi0=", SourceKind::Base64("JVBERi0="))]
    #[case("file:///sdcard/a.pdf", SourceKind::File("/sdcard/a.pdf"))]
    #[case("FILE:///sdcard/a.pdf", SourceKind::File("/sdcard/a.pdf"))]
    #[case("/sdcard/a.pdf", SourceKind::File("/sdcard/a.pdf"))]
    #[case("relative/a.pdf", SourceKind::File("relative/a.pdf"))]
    fn test_classify(#[case] uri: &str, #[case] expected: SourceKind<'_>) {
        assert_eq!(classify(uri), expected);
    }

    #[test]
    fn test_classify_scheme_is_case_sensitive_for_network() {
        // Uppercase schemes are not treated as network sources
        assert_eq!(
            classify("HTTPS://example.com/a.pdf"),
            SourceKind::File("HTTPS://example.com/a.pdf")
        );
    }

    #[test]
    fn test_classify_base64_without_comma_keeps_uri() {
        let uri = "data:application/pdf;base64";
        assert_eq!(classify(uri), SourceKind::Base64(uri));
    }

    #[test]
    fn test_classify_other_data_uri_is_file() {
        let uri = "data:text/plain;base64,SGk=";
        assert_eq!(classify(uri), SourceKind::File(uri));
    }

    #[tokio::test]
    async fn test_resolve_base64_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("data:application/pdf;base64,JVBERi0xLjQK");

        let path = resolve_base64("JVBERi0xLjQK", &entry).await.unwrap();
        assert_eq!(path, entry.final_path);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4\n");
        assert!(!entry.temp_path.exists());
    }

    #[tokio::test]
    async fn test_resolve_base64_ignores_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("x");

        resolve_base64("JVBE\nRi0x\r\nLjQK ", &entry).await.unwrap();
        assert_eq!(std::fs::read(&entry.final_path).unwrap(), b"%PDF-1.4\n");
    }

    #[tokio::test]
    async fn test_resolve_base64_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("x");

        let result = resolve_base64("not valid base64!!!", &entry).await;
        assert!(matches!(result, Err(Error::Base64Decode(_))));
        assert!(!entry.final_path.exists());
    }

    #[tokio::test]
    async fn test_resolve_base64_write_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("missing-dir"));
        let entry = cache.entry("x");

        let result = resolve_base64("JVBERi0xLjQK", &entry).await;
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!entry.final_path.exists());
        assert!(!entry.temp_path.exists());
    }

    #[tokio::test]
    async fn test_resolve_asset_copies_bytes() {
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("guide.pdf"), b"%PDF-1.7 guide").unwrap();
        let bundle = DirAssetBundle::new(assets.path());

        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("bundle-assets://guide.pdf");

        let path = resolve_asset(Some(&bundle), "guide.pdf", &entry).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.7 guide");
        assert!(!entry.temp_path.exists());
    }

    #[tokio::test]
    async fn test_resolve_asset_without_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let entry = cache.entry("bundle-assets://guide.pdf");

        let result = resolve_asset(None, "guide.pdf", &entry).await;
        assert!(matches!(result, Err(Error::AssetNotFound { .. })));
        assert!(!entry.final_path.exists());
    }

    #[test]
    fn test_resolve_path_is_verbatim() {
        assert_eq!(resolve_path("/sdcard/a.pdf"), PathBuf::from("/sdcard/a.pdf"));
    }
}
