//! pdf-view-fetch - resolve one PDF source into the local document cache
//!
//! Prints the resolved local path on success.

use anyhow::{bail, Context};
use clap::Parser;
use parking_lot::Mutex;
use pdf_view_source::source::DiskCache;
use pdf_view_source::{
    DirAssetBundle, PdfView, Source, SourceDescriptor, TransferPhase, ViewConfig, ViewListener,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "pdf-view-fetch", version, about)]
struct Args {
    /// URL, bundle-assets:// name, data: URI or file path
    uri: String,

    /// Always fetch, ignoring any cached copy
    #[arg(long)]
    no_cache: bool,

    /// Request method for network sources
    #[arg(long, default_value = "GET")]
    method: String,

    /// Extra request header, as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Cache directory (overrides PDF_VIEW_CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Directory holding bundle-assets:// documents
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Remove leftover partial downloads before resolving
    #[arg(long)]
    purge_stale: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Logs progress in 10% steps and remembers the last error
#[derive(Default)]
struct CliListener {
    last_decile: Mutex<Option<u32>>,
    error: Mutex<Option<String>>,
}

impl ViewListener for CliListener {
    fn on_load_progress(&self, fraction: f32) {
        let decile = (fraction * 10.0).floor() as u32;
        let mut last = self.last_decile.lock();
        if *last != Some(decile) {
            *last = Some(decile);
            tracing::info!("downloaded {}%", decile * 10);
        }
    }

    fn on_error(&self, message: &str) {
        *self.error.lock() = Some(message.to_string());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_view_source=info,pdf_view_fetch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ViewConfig::from_env();
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }

    if args.purge_stale {
        let cache = DiskCache::new(config.cache_dir.clone());
        let removed = cache.purge_stale_temps().await;
        tracing::info!(removed, dir = %cache.dir().display(), "purged stale downloads");
    }

    let listener = Arc::new(CliListener::default());
    let mut builder = PdfView::builder(config).listener(listener.clone());
    if let Some(root) = args.asset_root {
        builder = builder.assets(Arc::new(DirAssetBundle::new(root)));
    }
    let view = builder.build().context("failed to create view")?;

    let mut descriptor = SourceDescriptor::new(args.uri)
        .with_cache(!args.no_cache)
        .with_method(args.method);
    descriptor.headers.extend(args.headers);

    view.set_source(Arc::new(Source::Descriptor(descriptor))).await;

    match view.settle().await {
        TransferPhase::Done => {
            println!("{}", view.state().path.display());
            Ok(())
        }
        phase => {
            let message = listener
                .error
                .lock()
                .clone()
                .unwrap_or_else(|| "no pdf source".to_string());
            bail!("{} ({:?})", message, phase)
        }
    }
}
