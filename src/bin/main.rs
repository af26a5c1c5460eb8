use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use review_harvest::config::ServiceConfig;
use review_harvest::engine::{ChromiumRenderer, ExtractionRequest, ReviewPipeline};
use review_harvest::network::OllamaClient;
use review_harvest::ops::{server, telemetry};

#[derive(Parser)]
#[command(name = "review-harvest")]
#[command(about = "Adaptive product review extraction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Human-readable logs instead of JSON")]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the review API over HTTP
    Serve,

    /// Extract reviews from one product page and print them as JSON
    Extract {
        #[arg(short, long, help = "Product page URL")]
        url: String,

        #[arg(short, long, help = "Maximum number of review pages to visit")]
        max_pages: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.pretty {
        telemetry::init_tracing_pretty();
    } else {
        telemetry::init_tracing();
    }

    let config = ServiceConfig::from_env();
    let completer = match OllamaClient::new(&config.ollama_url, &config.ollama_model) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Could not build the inference client");
            return ExitCode::FAILURE;
        }
    };

    // * Inference is optional: without it every page goes through the fallback table
    match completer.probe().await {
        Ok(version) => info!(url = %config.ollama_url, version = %version, model = completer.model(), "Inference provider reachable"),
        Err(e) => warn!(url = %config.ollama_url, error = %e, "Inference provider unreachable, fallback selectors only"),
    }

    match cli.command {
        Commands::Serve => serve(config, completer).await,
        Commands::Extract { url, max_pages } => extract(config, completer, url, max_pages).await,
    }
}

async fn serve(config: ServiceConfig, completer: Arc<OllamaClient>) -> ExitCode {
    let state = Arc::new(server::AppState { config, completer });

    let handle = match server::start_server(state).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to bind the review API");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    if !handle.is_running() {
        warn!("Review API had already stopped");
    }
    info!("Shutdown requested");
    handle.shutdown();
    ExitCode::SUCCESS
}

async fn extract(
    config: ServiceConfig,
    completer: Arc<OllamaClient>,
    url: String,
    max_pages: Option<u32>,
) -> ExitCode {
    let request = ExtractionRequest { url, max_pages };
    if let Err(e) = request.validate(config.pipeline.default_max_pages) {
        error!(error = %e, "Rejected request");
        return ExitCode::FAILURE;
    }

    let renderer = match ChromiumRenderer::launch(config.render.clone()).await {
        Ok(renderer) => renderer,
        Err(e) => {
            error!(error = %e, "Browser launch failed");
            return ExitCode::FAILURE;
        }
    };

    let pipeline = ReviewPipeline::new(renderer, completer, config.pipeline.clone());
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    match pipeline.run_until(&request, interrupted).await {
        Ok(result) => {
            println!("{}", result.to_json_pretty());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Extraction failed");
            ExitCode::FAILURE
        }
    }
}
