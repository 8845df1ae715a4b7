pub mod calendar;
pub mod personal_items;
pub mod plan_overrides;
pub mod timetable;

use axum::{
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::calendar::calendar_key;
use crate::cache::CacheService;
use crate::calendar::{DateRange, LayerSet};
use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(calendar::routes())
        .merge(personal_items::routes())
        .merge(plan_overrides::routes())
        .merge(timetable::routes())
}

/// `from`/`to` query parameters shared by the range endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeQuery {
    pub from: chrono::NaiveDate,
    pub to: chrono::NaiveDate,
}

impl RangeQuery {
    pub fn range(&self) -> Result<DateRange, ApiError> {
        Ok(DateRange::new(self.from, self.to)?)
    }
}

pub(crate) fn parse_layers(raw: Option<&str>) -> Result<LayerSet, ApiError> {
    match raw {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(LayerSet::default()),
    }
}

fn json_response(body: String, cache: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (HeaderName::from_static("x-cache"), cache),
        ],
        body,
    )
        .into_response()
}

/// The response cache, unless it is switched off.
pub(crate) fn response_cache(state: &AppState) -> Option<&CacheService> {
    state.config.features.enable_response_cache.then_some(&state.cache)
}

/// Serves a calendar read from the response cache, building and storing it
/// on a miss. `query` is serialized into the cache key, so it must only hold
/// normalized values.
pub(crate) async fn cached_json<Q, T, F, Fut>(
    cache: Option<&CacheService>,
    user_id: Uuid,
    view: &str,
    query: &Q,
    build: F,
) -> Result<Response, ApiError>
where
    Q: Serialize,
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let canonical = serde_urlencoded::to_string(query).map_err(|e| ApiError::Internal(e.to_string()))?;
    let key = calendar_key(user_id, view, &canonical);

    if let Some(cache) = cache {
        if let Some(body) = cache.get_calendar(&key).await {
            return Ok(json_response(body, "HIT"));
        }
    }

    let value = build().await?;
    let body = serde_json::to_string(&value).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Some(cache) = cache {
        cache.put_calendar(&key, &body).await;
    }
    Ok(json_response(body, "MISS"))
}

/// Forgets cached calendar responses after a write. A failure only means
/// stale reads until the entries expire.
pub(crate) async fn invalidate_calendar(state: &AppState, user_id: Uuid) {
    if let Err(e) = state.cache.invalidate_user_calendar(user_id).await {
        tracing::warn!("Failed to invalidate calendar cache for {}: {:?}", user_id, e);
    }
}
