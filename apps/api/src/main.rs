use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::AppConfig;
use shared_database::{InMemoryStore, SchedulingStore, SupabaseStore};
use shared_utils::HmacTokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API");

    let config = AppConfig::from_env();
    info!(
        "Slot policy: {}, slot end enforced: {}",
        config.scheduling.slot_policy, config.scheduling.enforce_slot_end
    );

    let store: Arc<dyn SchedulingStore> = if config.is_configured() {
        info!("Using Supabase store at {}", config.supabase_url);
        Arc::new(SupabaseStore::new(&config))
    } else {
        warn!("Supabase is not configured, appointments are kept in memory");
        Arc::new(InMemoryStore::new())
    };
    let tokens = Arc::new(HmacTokenService::from_config(&config));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(&config, store, tokens)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(config.bind_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
