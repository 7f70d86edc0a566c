//! PDF View Source Library
//!
//! This crate backs an embedded PDF view:
//! - resolves a document source (URL, bundled asset, base64 payload or file
//!   path) into a local file for the native viewer
//! - caches network downloads on disk, keyed by the SHA-1 of the URI
//! - cancels superseded downloads when the source changes or the view goes away
//! - bridges native viewer events to host callbacks

pub mod config;
pub mod error;
pub mod events;
pub mod source;
pub mod view;

pub use config::{FitPolicy, ViewConfig, ViewProps};
pub use error::{Error, Result};
pub use events::{NoListener, ViewListener, ViewerEvent};
pub use source::{DirAssetBundle, Source, SourceDescriptor, TransferPhase};
pub use view::{Frame, PdfView, PdfViewBuilder, RenderRequest, ViewState};
