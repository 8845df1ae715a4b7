use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::calendar::overrides::{state_of, OverrideFields, OverrideState};
use crate::calendar::{NormalizedEvent, YearKey};
use crate::controllers::invalidate_calendar;
use crate::error::{ApiError, ValidatedJson};
use crate::middleware::AuthUser;
use crate::services::CalendarService;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plan-overrides", put(save_override))
        .route("/plan-overrides/{id}", delete(revert_override))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveOverride {
    #[validate(length(min = 1, max = 300))]
    pub plan_event_id: String,
    pub year: Option<YearKey>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 200))]
    pub tutor: Option<String>,
    #[validate(length(max = 200))]
    pub venue: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RevertParams {
    pub year: Option<YearKey>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// Id to pass to `DELETE /plan-overrides/{id}` to revert.
    pub override_id: Option<Uuid>,
    pub event: NormalizedEvent,
}

#[derive(Debug, Serialize)]
pub struct RevertResponse {
    /// The plan event as it shows again, absent when the plan no longer has it.
    pub restored: Option<NormalizedEvent>,
}

// PUT /api/plan-overrides
async fn save_override(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<SaveOverride>,
) -> Result<Json<SaveResponse>, ApiError> {
    let year = req.year.unwrap_or(state.config.calendar.default_year);
    let fields = OverrideFields {
        title: req.title,
        tutor: req.tutor,
        venue: req.venue,
        notes: req.notes,
        is_cancelled: req.is_cancelled,
    };

    let event = CalendarService::new(&state.db, &state.plans)
        .save_override(user.user_id, year, &req.plan_event_id, &fields)
        .await?;

    invalidate_calendar(&state, user.user_id).await;
    let override_id = match state_of(&event) {
        OverrideState::Overridden { personal_item_id } => Some(personal_item_id),
        OverrideState::Original => None,
    };
    Ok(Json(SaveResponse { override_id, event }))
}

// DELETE /api/plan-overrides/{id}
async fn revert_override(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<RevertParams>, QueryRejection>,
) -> Result<Json<RevertResponse>, ApiError> {
    let Path(id) = id?;
    let Query(params) = params?;
    let year = params.year.unwrap_or(state.config.calendar.default_year);

    let restored = CalendarService::new(&state.db, &state.plans)
        .revert_override(user.user_id, year, id)
        .await?;

    invalidate_calendar(&state, user.user_id).await;
    Ok(Json(RevertResponse { restored }))
}
