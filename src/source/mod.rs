//! Source resolution and caching

pub mod cache;
pub mod descriptor;
pub mod download;
pub mod resolver;

pub use cache::{cache_key, CacheEntry, CacheLookup, DiskCache};
pub use descriptor::{normalize, AssetBundle, DirAssetBundle, Source, SourceDescriptor};
pub use download::{progress_fraction, ActiveTransfer, Downloader, TransferPhase};
pub use resolver::{classify, resolve_asset, resolve_base64, resolve_path, SourceKind};
