// * Configuration Constants
// * Central location for all thresholds, timeouts and bounds of the extraction pipeline

// * Maximum characters of rendered markup sent to the inference provider
pub const SAMPLE_CHAR_CAP: usize = 2_000;

// * Ceiling on a single inference round-trip
pub const INFERENCE_TIMEOUT_MS: u64 = 30_000;

// * Pause before the single inference retry
pub const INFERENCE_RETRY_BACKOFF_MS: u64 = 500;

// * Page navigation timeout in milliseconds
pub const PAGE_TIMEOUT_MS: u64 = 30_000;

// * Wait for JavaScript-driven content to settle after navigation or click
pub const SETTLE_DELAY_MS: u64 = 2_000;

// * Pages visited when the caller gives no bound
pub const DEFAULT_MAX_PAGES: u32 = 5;

// * Whole-request ceiling for the HTTP shell (acts as pipeline cancellation)
pub const REQUEST_TIMEOUT_SECS: u64 = 180;

// * Inference provider defaults
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";

// * HTTP shell bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
