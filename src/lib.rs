pub mod cache;
pub mod calendar;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub plans: Arc<calendar::PlanCatalog>,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let plans = calendar::PlanCatalog::load(&config.calendar.plan_catalog_path)?;
        if plans.get(config.calendar.default_year).is_none() {
            anyhow::bail!("default year {} is not in the plan catalog", config.calendar.default_year);
        }

        let db = database::Database::connect(&config.database).await?;
        tracing::info!("Database connected");
        db.run_migrations().await?;

        let redis = redis_client::RedisClient::connect(&config.redis.url).await?;
        tracing::info!("Redis connected");
        let cache = cache::CacheService::new(redis.clone(), config.redis.cache_ttl_secs);

        Ok(Arc::new(Self {
            db,
            redis,
            cache,
            config,
            plans: Arc::new(plans),
        }))
    }
}
