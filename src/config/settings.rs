// * Runtime configuration for the pipeline and the HTTP shell
// * Defaults come from constants.rs; ServiceConfig can be overridden from the environment

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::config::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_MAX_PAGES, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL,
    INFERENCE_RETRY_BACKOFF_MS, INFERENCE_TIMEOUT_MS, PAGE_TIMEOUT_MS, REQUEST_TIMEOUT_SECS,
    SAMPLE_CHAR_CAP, SETTLE_DELAY_MS,
};

/// Knobs for one extraction pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Page bound used when a request does not name one
    pub default_max_pages: u32,
    /// Character cap of the markup excerpt sent for inference
    pub sample_char_cap: usize,
    /// Timeout applied to each inference attempt
    pub inference_timeout: Duration,
    /// Pause before the single inference retry
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_max_pages: DEFAULT_MAX_PAGES,
            sample_char_cap: SAMPLE_CHAR_CAP,
            inference_timeout: Duration::from_millis(INFERENCE_TIMEOUT_MS),
            retry_backoff: Duration::from_millis(INFERENCE_RETRY_BACKOFF_MS),
        }
    }
}

/// Browser-side timing used by the Chromium renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub page_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_millis(PAGE_TIMEOUT_MS),
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
        }
    }
}

/// Process-level configuration for the HTTP shell and CLI
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub ollama_url: String,
    pub ollama_model: String,
    pub request_timeout: Duration,
    pub pipeline: PipelineConfig,
    pub render: RenderConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            pipeline: PipelineConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Builds the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    ///
    /// Unparseable values are ignored with a warning and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let bind = lookup("REVIEW_HARVEST_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        if let Some(addr) = parse_or_warn::<SocketAddr>("REVIEW_HARVEST_BIND", &bind) {
            config.bind_addr = addr;
        }

        if let Some(url) = lookup("OLLAMA_URL").filter(|v| !v.trim().is_empty()) {
            config.ollama_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.trim().is_empty()) {
            config.ollama_model = model.trim().to_string();
        }

        if let Some(raw) = lookup("REVIEW_HARVEST_REQUEST_TIMEOUT_SECS") {
            if let Some(secs) = parse_or_warn::<u64>("REVIEW_HARVEST_REQUEST_TIMEOUT_SECS", &raw) {
                config.request_timeout = Duration::from_secs(secs.max(1));
            }
        }

        if let Some(raw) = lookup("REVIEW_HARVEST_MAX_PAGES") {
            match parse_or_warn::<u32>("REVIEW_HARVEST_MAX_PAGES", &raw) {
                Some(0) => warn!("REVIEW_HARVEST_MAX_PAGES must be positive, keeping default"),
                Some(pages) => config.pipeline.default_max_pages = pages,
                None => {}
            }
        }

        config
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
