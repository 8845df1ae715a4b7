use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caseway_planner::{config::Config, controllers, middleware::rate_limit::rate_limit, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config.app.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    if origins.is_empty() {
        if config.is_production() {
            warn!("CORS_ORIGINS is empty; allowing any origin in production");
        }
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database = state.db.ping().await.is_ok();
    let redis = state.redis.ping().await.is_ok();
    if !database || !redis {
        warn!(database, redis, "Health check degraded");
    }
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "status": if database { "ok" } else { "degraded" }, "database": database, "redis": redis })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config);

    info!("Starting Caseway planner API ({})", config.app.environment);

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    let cors = cors(&config);
    let app_state = AppState::new(config).await?;

    let api = controllers::routes().layer(middleware::from_fn_with_state(app_state.clone(), rate_limit));

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
