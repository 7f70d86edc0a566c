//! PDF view component
//!
//! [`PdfView`] owns one source at a time. Setting a source resets the view
//! state, cancels whatever the previous source was still doing, and runs the
//! resolution pipeline on a tokio task:
//!
//! 1. normalize the source into a [`SourceDescriptor`]
//! 2. consult the disk cache when the descriptor asks for it
//! 3. otherwise acquire the document by network, asset copy, base64 decode or
//!    in-place file path
//! 4. publish the resolved path, at which point [`PdfView::frame`] switches
//!    from the placeholder to a render request for the native viewer

use crate::config::{ViewConfig, ViewProps};
use crate::error::{Error, Result};
use crate::events::{dispatch, NoListener, ViewListener, ViewerEvent};
use crate::source::{
    classify, normalize, resolve_asset, resolve_base64, resolve_path, ActiveTransfer,
    AssetBundle, CacheEntry, CacheLookup, DiskCache, Downloader, Source, SourceDescriptor,
    SourceKind, TransferPhase,
};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// What the view currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    /// A local document is ready for the viewer
    pub downloaded: bool,
    /// Resolved local path, empty until `downloaded`
    pub path: PathBuf,
    /// Download progress in `[0, 1]`
    pub progress: f32,
}

impl ViewState {
    fn ready(path: PathBuf) -> Self {
        Self {
            downloaded: true,
            path,
            progress: 1.0,
        }
    }
}

/// Everything the native viewer needs to show a resolved document
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub path: PathBuf,
    pub props: ViewProps,
}

/// Output of the view for the current state
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Document not ready; show a progress indicator
    Placeholder { progress: f32 },
    Document(RenderRequest),
}

/// State shared between the view and its resolution task
struct Shared {
    cache: DiskCache,
    downloader: Downloader,
    assets: Option<Arc<dyn AssetBundle>>,
    listener: Arc<dyn ViewListener>,
    state: watch::Sender<ViewState>,
    /// Generation of the resolution allowed to write state
    generation: Mutex<u64>,
    phase: Mutex<TransferPhase>,
}

/// Builder for [`PdfView`]
pub struct PdfViewBuilder {
    config: ViewConfig,
    props: ViewProps,
    assets: Option<Arc<dyn AssetBundle>>,
    listener: Arc<dyn ViewListener>,
}

impl PdfViewBuilder {
    /// Register the host callbacks
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ViewListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Register the bundle used for `bundle-assets://` sources and asset ids
    #[must_use]
    pub fn assets(mut self, assets: Arc<dyn AssetBundle>) -> Self {
        self.assets = Some(assets);
        self
    }

    #[must_use]
    pub fn props(mut self, props: ViewProps) -> Self {
        self.props = props;
        self
    }

    pub fn build(self) -> Result<PdfView> {
        let downloader = Downloader::new(&self.config)?;
        let (state, _) = watch::channel(ViewState::default());
        Ok(PdfView {
            shared: Arc::new(Shared {
                cache: DiskCache::new(self.config.cache_dir.clone()),
                downloader,
                assets: self.assets,
                listener: self.listener,
                state,
                generation: Mutex::new(0),
                phase: Mutex::new(TransferPhase::Idle),
            }),
            props: RwLock::new(self.props),
            current: Mutex::new(None),
            active: Mutex::new(None),
        })
    }
}

/// A PDF view bound to at most one source at a time
pub struct PdfView {
    shared: Arc<Shared>,
    props: RwLock<ViewProps>,
    current: Mutex<Option<Arc<Source>>>,
    active: Mutex<Option<ActiveTransfer>>,
}

impl PdfView {
    pub fn builder(config: ViewConfig) -> PdfViewBuilder {
        PdfViewBuilder {
            config,
            props: ViewProps::default(),
            assets: None,
            listener: Arc::new(NoListener),
        }
    }

    /// View with default props, no assets and no listener
    pub fn new(config: ViewConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Bind the view to `source` and start resolving it.
    ///
    /// Passing the very same `Arc` as the active source is a no-op; a new
    /// `Arc` with equal contents resolves again. Any previous resolution is
    /// cancelled and its temp file removed before this returns.
    pub async fn set_source(&self, source: Arc<Source>) {
        {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &source)) {
                tracing::debug!("source unchanged, skipping resolution");
                return;
            }
            *current = Some(Arc::clone(&source));
        }

        self.cancel_active().await;

        let generation = self.shared.advance();
        let descriptor = normalize(&source, self.shared.assets.as_deref());
        let token = CancellationToken::new();
        *self.shared.phase.lock() = TransferPhase::Fetching;

        let transfer = ActiveTransfer::spawn(
            generation,
            token.clone(),
            Arc::clone(&self.shared).resolve(generation, descriptor, token),
        );

        let previous = self.active.lock().replace(transfer);
        if let Some(previous) = previous {
            // A concurrent set_source raced us; it is already superseded.
            previous.signal();
        }
    }

    /// Tear the view down: cancel any in-flight work and reset state
    pub async fn unmount(&self) {
        self.current.lock().take();
        self.cancel_active().await;
        self.shared.advance();
        *self.shared.phase.lock() = TransferPhase::Idle;
    }

    /// Wait for the current resolution to finish and return its phase.
    ///
    /// The view keeps ownership of the transfer, so dropping this future
    /// early leaves it cancellable by `set_source`, `unmount` and drop.
    pub async fn settle(&self) -> TransferPhase {
        let finished = self.active.lock().as_ref().map(ActiveTransfer::finished);
        match finished {
            Some(finished) => finished.await,
            None => self.phase(),
        }
    }

    async fn cancel_active(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            let generation = active.generation();
            let phase = active.cancel().await;
            tracing::debug!(generation, ?phase, "previous resolution released");
        }
    }

    /// Phase of the most recent resolution
    pub fn phase(&self) -> TransferPhase {
        *self.shared.phase.lock()
    }

    /// Snapshot of the current view state
    pub fn state(&self) -> ViewState {
        self.shared.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.state.subscribe()
    }

    pub fn props(&self) -> ViewProps {
        self.props.read().clone()
    }

    /// Replace the presentation props; the source is unaffected
    pub fn set_props(&self, props: ViewProps) {
        *self.props.write() = props;
    }

    /// What the host should display right now
    pub fn frame(&self) -> Frame {
        let state = self.state();
        if state.downloaded {
            Frame::Document(RenderRequest {
                path: state.path,
                props: self.props(),
            })
        } else {
            Frame::Placeholder {
                progress: state.progress,
            }
        }
    }

    /// Handle a delimited message from the native viewer.
    /// Unknown or malformed messages are ignored.
    pub fn handle_native_message(&self, message: &str) {
        match ViewerEvent::parse(message) {
            Some(event) => self.handle_viewer_event(&event),
            None => tracing::debug!(raw = message, "ignoring viewer message"),
        }
    }

    /// Handle a structured event from the native viewer
    pub fn handle_viewer_event(&self, event: &ViewerEvent) {
        let path = self.shared.state.borrow().path.clone();
        dispatch(self.shared.listener.as_ref(), event, &path);
    }
}

impl Drop for PdfView {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.signal();
        }
    }
}

impl Shared {
    /// Invalidate every earlier resolution and reset the visible state
    fn advance(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.state.send_replace(ViewState::default());
        *generation
    }

    /// Apply `update` only if `generation` is still the current one
    fn publish(&self, generation: u64, update: impl FnOnce(&mut ViewState)) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        self.state.send_modify(update);
        true
    }

    fn report_progress(&self, generation: u64, fraction: f32) {
        if self.publish(generation, |state| state.progress = fraction) {
            self.listener.on_load_progress(fraction);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        *self.generation.lock() == generation
    }

    #[instrument(skip(self, descriptor, token), fields(uri = %log_uri(&descriptor.uri), cache = descriptor.cache))]
    async fn resolve(
        self: Arc<Self>,
        generation: u64,
        descriptor: SourceDescriptor,
        token: CancellationToken,
    ) -> TransferPhase {
        let entry = self.cache.entry(&descriptor.uri);

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            result = self.acquire(generation, &descriptor, &entry) => result,
        };

        let phase = match result {
            Ok(path) => {
                if self.publish(generation, |state| *state = ViewState::ready(path)) {
                    TransferPhase::Done
                } else {
                    TransferPhase::Cancelled
                }
            }
            Err(e) if e.is_cancelled() => {
                self.cache.discard_temp(&entry).await;
                tracing::debug!("resolution cancelled");
                TransferPhase::Cancelled
            }
            Err(Error::MissingSource) => {
                tracing::error!("no pdf source");
                TransferPhase::Failed
            }
            Err(e) if token.is_cancelled() || !self.is_current(generation) => {
                tracing::debug!(error = %e, "superseded resolution failed");
                TransferPhase::Cancelled
            }
            Err(e) => {
                tracing::warn!(error = %e, "load pdf failed");
                self.listener.on_error(&e.client_message());
                TransferPhase::Failed
            }
        };

        if self.is_current(generation) {
            *self.phase.lock() = phase;
        }
        phase
    }

    async fn acquire(
        &self,
        generation: u64,
        descriptor: &SourceDescriptor,
        entry: &CacheEntry,
    ) -> Result<PathBuf> {
        if descriptor.uri.is_empty() {
            return Err(Error::MissingSource);
        }

        if descriptor.cache {
            match self.cache.lookup(entry).await {
                CacheLookup::Hit(path) => {
                    tracing::debug!(key = %entry.key, "serving from cache");
                    return Ok(path);
                }
                CacheLookup::StaleTemp => {
                    tracing::debug!(key = %entry.key, "discarded interrupted download")
                }
                CacheLookup::Miss => {}
            }
        }

        self.cache.purge(entry).await;

        match classify(&descriptor.uri) {
            SourceKind::Network(_) => {
                self.cache.ensure_dir().await?;
                self.downloader
                    .download(descriptor, entry, |fraction| {
                        self.report_progress(generation, fraction)
                    })
                    .await
            }
            SourceKind::Asset(name) => {
                self.cache.ensure_dir().await?;
                resolve_asset(self.assets.as_deref(), name, entry).await
            }
            SourceKind::Base64(payload) => {
                self.cache.ensure_dir().await?;
                resolve_base64(payload, entry).await
            }
            SourceKind::File(path) => Ok(resolve_path(path)),
        }
    }
}

/// Shorten inline payloads so they do not flood the logs
fn log_uri(uri: &str) -> &str {
    match classify(uri) {
        SourceKind::Base64(_) => "data:application/pdf;base64,…",
        _ => uri,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view_in(dir: &std::path::Path) -> PdfView {
        PdfView::new(ViewConfig::default().with_cache_dir(dir)).unwrap()
    }

    fn descriptor_source(descriptor: SourceDescriptor) -> Arc<Source> {
        Arc::new(Source::Descriptor(descriptor))
    }

    #[tokio::test]
    async fn test_initial_state_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let view = view_in(dir.path());

        assert_eq!(view.state(), ViewState::default());
        assert_eq!(view.phase(), TransferPhase::Idle);
        assert_eq!(view.frame(), Frame::Placeholder { progress: 0.0 });
    }

    #[tokio::test]
    async fn test_local_file_resolves_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let view = view_in(dir.path());

        view.set_source(descriptor_source(SourceDescriptor::new(
            "file:///sdcard/Download/a.pdf",
        )))
        .await;
        assert_eq!(view.settle().await, TransferPhase::Done);

        let state = view.state();
        assert!(state.downloaded);
        assert_eq!(state.path, PathBuf::from("/sdcard/Download/a.pdf"));
        assert_eq!(view.phase(), TransferPhase::Done);
    }

    #[tokio::test]
    async fn test_empty_uri_keeps_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let view = view_in(dir.path());

        view.set_source(descriptor_source(SourceDescriptor::default()))
            .await;
        assert_eq!(view.settle().await, TransferPhase::Failed);
        assert_eq!(view.state(), ViewState::default());
    }

    #[tokio::test]
    async fn test_frame_carries_props() {
        let dir = tempfile::tempdir().unwrap();
        let view = view_in(dir.path());
        view.set_props(ViewProps {
            page: 5,
            password: "secret".into(),
            ..ViewProps::default()
        });

        view.set_source(descriptor_source(SourceDescriptor::new("/docs/a.pdf")))
            .await;
        view.settle().await;

        match view.frame() {
            Frame::Document(request) => {
                assert_eq!(request.path, PathBuf::from("/docs/a.pdf"));
                assert_eq!(request.props.page, 5);
                assert_eq!(request.props.password, "secret");
            }
            other => panic!("expected document frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unmount_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let view = view_in(dir.path());

        view.set_source(descriptor_source(SourceDescriptor::new("/docs/a.pdf")))
            .await;
        view.settle().await;
        assert!(view.state().downloaded);

        view.unmount().await;
        assert_eq!(view.state(), ViewState::default());
        assert_eq!(view.phase(), TransferPhase::Idle);
    }

    #[test]
    fn test_log_uri_hides_payload() {
        assert_eq!(
            log_uri("data:application/pdf;base64,JVBERi0xLjQK"),
            "data:application/pdf;base64,…"
        );
        assert_eq!(log_uri("/docs/a.pdf"), "/docs/a.pdf");
    }
}
