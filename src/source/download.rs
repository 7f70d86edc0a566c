//! Network transfers into the document cache

use crate::config::ViewConfig;
use crate::error::{Error, Result};
use crate::source::cache::{remove_quietly, CacheEntry};
use crate::source::descriptor::SourceDescriptor;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the single resolution a view owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Idle,
    Fetching,
    Done,
    Cancelled,
    Failed,
}

/// Statuses whose body is accepted as the document
fn is_success_class(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED
    )
}

/// Fraction of `total` received so far, `None` when the total is unknown
pub fn progress_fraction(received: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(total) if total > 0 => Some((received as f64 / total as f64).clamp(0.0, 1.0) as f32),
        _ => None,
    }
}

/// HTTP downloader streaming bodies into cache temp files
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(config: &ViewConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Download `descriptor.uri` into `entry`.
    ///
    /// The body is streamed to the temp path and renamed onto the final path
    /// once a 200, 204 or 304 response completes. Every other outcome removes
    /// the temp file. `on_progress` sees each known fraction and always sees
    /// `1.0` before a successful return.
    pub async fn download<F>(
        &self,
        descriptor: &SourceDescriptor,
        entry: &CacheEntry,
        mut on_progress: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(f32) + Send,
    {
        let request = self.build_request(descriptor)?;

        let status = match self.transfer(request, &entry.temp_path, &mut on_progress).await {
            Ok(status) => status,
            Err(e) => {
                remove_quietly(&entry.temp_path).await;
                return Err(e);
            }
        };

        if !is_success_class(status) {
            remove_quietly(&entry.temp_path).await;
            return Err(Error::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Err(e) = tokio::fs::rename(&entry.temp_path, &entry.final_path).await {
            remove_quietly(&entry.temp_path).await;
            return Err(e.into());
        }

        Ok(entry.final_path.clone())
    }

    fn build_request(&self, descriptor: &SourceDescriptor) -> Result<reqwest::RequestBuilder> {
        let url = url::Url::parse(&descriptor.uri)?;

        let method_name = if descriptor.method.is_empty() {
            "GET"
        } else {
            descriptor.method.as_str()
        };
        let method =
            Method::from_bytes(method_name.as_bytes()).map_err(|_| Error::InvalidMethod {
                method: descriptor.method.clone(),
            })?;

        let mut headers = HeaderMap::with_capacity(descriptor.headers.len());
        for (name, value) in &descriptor.headers {
            let invalid = || Error::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        Ok(self.client.request(method, url).headers(headers))
    }

    async fn transfer<F>(
        &self,
        request: reqwest::RequestBuilder,
        temp_path: &Path,
        on_progress: &mut F,
    ) -> Result<StatusCode>
    where
        F: FnMut(f32) + Send,
    {
        let response = request.send().await?;
        let status = response.status();
        let total = response.content_length();

        let mut file = tokio::fs::File::create(temp_path).await?;
        let mut received: u64 = 0;
        let mut last_fraction = None;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;

            if let Some(fraction) = progress_fraction(received, total) {
                on_progress(fraction);
                last_fraction = Some(fraction);
            }
        }
        file.flush().await?;
        drop(file);

        if is_success_class(status) && last_fraction != Some(1.0) {
            on_progress(1.0);
        }

        Ok(status)
    }
}

/// Handle to the one in-flight resolution a view owns
pub struct ActiveTransfer {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<TransferPhase>,
    finished: watch::Receiver<Option<TransferPhase>>,
}

impl ActiveTransfer {
    /// Run `resolution` on its own task, publishing its phase once it ends
    pub(crate) fn spawn<F>(generation: u64, token: CancellationToken, resolution: F) -> Self
    where
        F: Future<Output = TransferPhase> + Send + 'static,
    {
        let (finished_tx, finished) = watch::channel(None);
        let task = tokio::spawn(async move {
            let phase = resolution.await;
            finished_tx.send_replace(Some(phase));
            phase
        });
        Self {
            generation,
            token,
            task,
            finished,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Request cancellation without waiting for cleanup
    pub fn signal(&self) {
        self.token.cancel();
    }

    /// Future resolving to the terminal phase, detached from this handle
    pub fn finished(&self) -> impl Future<Output = TransferPhase> + Send + 'static {
        let mut finished = self.finished.clone();
        let generation = self.generation;
        async move {
            let phase = finished
                .wait_for(Option::is_some)
                .await
                .map(|phase| *phase);
            match phase {
                Ok(Some(phase)) => phase,
                _ => {
                    tracing::warn!(generation, "resolution task ended without a phase");
                    TransferPhase::Failed
                }
            }
        }
    }

    /// Cancel and wait until the task has cleaned up its files
    pub async fn cancel(self) -> TransferPhase {
        self.token.cancel();
        self.join().await
    }

    /// Wait for the task to reach a terminal phase
    pub async fn join(self) -> TransferPhase {
        match self.task.await {
            Ok(phase) => phase,
            Err(e) => {
                tracing::warn!(error = %e, generation = self.generation, "resolution task ended abnormally");
                TransferPhase::Failed
            }
        }
    }
}
