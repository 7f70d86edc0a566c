//! Configuration for PDF views

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "PDF_VIEW_CACHE_DIR";

/// Environment variable overriding the request timeout, in seconds
pub const TIMEOUT_ENV: &str = "PDF_VIEW_TIMEOUT_SECS";

/// Resolution and network configuration shared by every view in a process
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Directory holding `{sha1}.pdf` and `{sha1}.pdf.tmp` files
    pub cache_dir: PathBuf,
    /// Connection establishment timeout (default: 30s)
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` lets large documents stream indefinitely
    pub request_timeout: Option<Duration>,
    /// User-Agent sent with network requests
    pub user_agent: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: None,
            user_agent: concat!("pdf-view-source/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ViewConfig {
    /// Default configuration with overrides from `PDF_VIEW_CACHE_DIR` and
    /// `PDF_VIEW_TIMEOUT_SECS`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.cache_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Some(Duration::from_secs(secs)),
                Ok(_) => config.request_timeout = None,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring {}", TIMEOUT_ENV),
            }
        }

        config
    }

    /// Override the cache directory
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pdf-view")
}

/// How the viewer fits pages into the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum FitPolicy {
    Width,
    Height,
    #[default]
    Both,
}

impl FitPolicy {
    /// Numeric code used by the native viewers
    pub fn code(self) -> u8 {
        match self {
            FitPolicy::Width => 0,
            FitPolicy::Height => 1,
            FitPolicy::Both => 2,
        }
    }
}

impl TryFrom<u8> for FitPolicy {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(FitPolicy::Width),
            1 => Ok(FitPolicy::Height),
            2 => Ok(FitPolicy::Both),
            other => Err(format!("unknown fit policy {}", other)),
        }
    }
}

impl From<FitPolicy> for u8 {
    fn from(policy: FitPolicy) -> Self {
        policy.code()
    }
}

/// Presentation props forwarded untouched to the native viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewProps {
    /// 1-based page shown first
    pub page: u32,
    pub password: String,
    pub scale: f32,
    pub horizontal: bool,
    /// Gap between pages, in points
    pub spacing: u32,
    pub fit_policy: FitPolicy,
    pub enable_antialiasing: bool,
}

impl Default for ViewProps {
    fn default() -> Self {
        Self {
            page: 1,
            password: String::new(),
            scale: 1.0,
            horizontal: false,
            spacing: 10,
            fit_policy: FitPolicy::Both,
            enable_antialiasing: true,
        }
    }
}
