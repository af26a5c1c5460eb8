// * Operations
// * Structured logging, Prometheus metrics and the HTTP shell

pub mod server;
pub mod telemetry;

// * Re-exports for convenient access
pub use server::{handle_request, parse_query, start_server, AppState, ServerHandle};
pub use telemetry::{
    get_metrics_string, init_tracing, init_tracing_pretty, init_tracing_with_level,
    record_inference, record_page, record_request,
};
