use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saletrack::analytics::{AnalyticsStore, InMemoryAnalytics, TinybirdClient};
use saletrack::config::Config;
use saletrack::error::AppError;
use saletrack::handlers;
use saletrack::payments::StripeClient;
use saletrack::sales::spawn_sale_worker;
use saletrack::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "saletrack")]
#[command(about = "Attributes payments to tracked leads and records sale events")]
struct Cli {
    /// Print the resolved configuration (secrets redacted) and exit
    #[arg(long)]
    check_config: bool,

    /// JSON file of `{customerId: [lead, ...]}` to preload into the in-memory
    /// analytics store (dev mode without Tinybird only)
    #[arg(long)]
    seed_leads: Option<String>,
}

/// Loads a `{customerId: [lead, ...]}` file into the in-memory store.
fn seed_leads(store: &InMemoryAnalytics, path: &str) -> saletrack::error::Result<usize> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path, e)))?;
    store.load_leads_json(&raw)
}

fn build_analytics(config: &Config, http: &reqwest::Client, cli: &Cli) -> Arc<dyn AnalyticsStore> {
    if let Some(ref token) = config.tinybird_api_key {
        if cli.seed_leads.is_some() {
            tracing::warn!("--seed-leads ignored: Tinybird is configured");
        }
        return Arc::new(TinybirdClient::new(
            http.clone(),
            config.tinybird_api_url.clone(),
            token.clone(),
        ));
    }

    if !config.dev_mode {
        tracing::error!("TINYBIRD_API_KEY is required (or set SALETRACK_ENV=dev for an in-memory store)");
        std::process::exit(1);
    }

    tracing::warn!("TINYBIRD_API_KEY not set: using in-memory analytics store");
    let store = InMemoryAnalytics::new();
    if let Some(ref path) = cli.seed_leads {
        match seed_leads(&store, path) {
            Ok(count) => tracing::info!("Seeded {} lead events from {}", count, path),
            Err(e) => {
                tracing::error!("Failed to seed leads from {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }
    Arc::new(store)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saletrack=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if cli.check_config {
        println!("{}", config.redacted_summary());
        return;
    }

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set: Stripe webhooks will be rejected");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set: Stripe customer lookups will fail");
    }
    if config.track_api_keys.is_empty() {
        tracing::warn!("TRACK_API_KEYS not set: tracking endpoint will reject every request");
    }

    let http = reqwest::Client::new();
    let analytics = build_analytics(&config, &http, &cli);
    let customers = Arc::new(StripeClient::new(
        http.clone(),
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
    ));

    let (sale_queue, sale_worker) = spawn_sale_worker(analytics.clone(), config.sale_queue_capacity);

    let state = AppState {
        customers,
        analytics,
        sale_queue,
        stripe_webhook_secret: config.stripe_webhook_secret.clone(),
        customer_id_metadata_key: config.customer_id_metadata_key.clone(),
        stripe_sale_defaults: config.stripe_sale_defaults.clone(),
        track_api_keys: Arc::new(config.track_api_keys.clone()),
    };

    let app = Router::new()
        .merge(handlers::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Saletrack server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    // The router (and every queue handle in it) is gone now; let queued
    // sales finish before exiting.
    tracing::info!("Draining pending sale recordings...");
    if let Err(e) = sale_worker.await {
        tracing::error!("Sale worker terminated abnormally: {}", e);
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
