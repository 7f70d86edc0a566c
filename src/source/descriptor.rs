//! Source descriptors and their normalization

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Scheme marking a document shipped inside the application bundle
pub const ASSET_SCHEME: &str = "bundle-assets://";

fn default_method() -> String {
    "GET".to_string()
}

/// Canonical description of where a document comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Network URL, `bundle-assets://` name, `data:` URI or file path
    #[serde(default)]
    pub uri: String,
    /// Reuse a previously finished download for the same URI
    #[serde(default)]
    pub cache: bool,
    /// Extra request headers for network sources
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request method for network sources
    #[serde(default = "default_method")]
    pub method: String,
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        Self {
            uri: String::new(),
            cache: false,
            headers: HashMap::new(),
            method: default_method(),
        }
    }
}

impl SourceDescriptor {
    /// Descriptor for `uri` with caching disabled and a plain GET
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Enable or disable reuse of a finished cache entry
    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the request method
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }
}

/// Source as supplied by the host: a descriptor or an opaque bundled-asset id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// Id handed out by the host's asset registry
    Asset(u32),
    Descriptor(SourceDescriptor),
}

impl From<SourceDescriptor> for Source {
    fn from(descriptor: SourceDescriptor) -> Self {
        Source::Descriptor(descriptor)
    }
}

/// Documents packaged with the application
pub trait AssetBundle: Send + Sync {
    /// Turn an opaque asset id into a descriptor, if the id is known
    fn resolve(&self, id: u32) -> Option<SourceDescriptor>;

    /// Local path of the asset named after `bundle-assets://`
    fn locate(&self, name: &str) -> Result<PathBuf>;
}

/// Asset bundle backed by a directory on disk
#[derive(Debug, Clone, Default)]
pub struct DirAssetBundle {
    root: PathBuf,
    ids: HashMap<u32, String>,
}

impl DirAssetBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ids: HashMap::new(),
        }
    }

    /// Register `name` (relative to the root) under `id`
    #[must_use]
    pub fn with_asset(mut self, id: u32, name: impl Into<String>) -> Self {
        self.ids.insert(id, name.into());
        self
    }
}

impl AssetBundle for DirAssetBundle {
    fn resolve(&self, id: u32) -> Option<SourceDescriptor> {
        self.ids
            .get(&id)
            .map(|name| SourceDescriptor::new(format!("{}{}", ASSET_SCHEME, name)))
    }

    fn locate(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(Error::AssetAccessDenied {
                name: name.to_string(),
            });
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(Error::AssetNotFound {
                name: name.to_string(),
            });
        }
        Ok(path)
    }
}

/// Turn a host-supplied source into a canonical descriptor.
///
/// Unregistered asset ids, or asset ids without a bundle, yield an empty URI,
/// which the pipeline reports as a missing source.
pub fn normalize(source: &Source, assets: Option<&dyn AssetBundle>) -> SourceDescriptor {
    match source {
        Source::Descriptor(descriptor) => descriptor.clone(),
        Source::Asset(id) => assets
            .and_then(|bundle| bundle.resolve(*id))
            .unwrap_or_default(),
    }
}
