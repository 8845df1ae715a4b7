use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{invalidate_calendar, RangeQuery};
use crate::error::{ApiError, ValidatedJson};
use crate::middleware::AuthUser;
use crate::models::{ItemScope, NewPersonalItem, PersonalItem, PersonalItemPatch, PersonalItemType, Priority};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/personal-items", get(list_items).post(create_item))
        .route("/personal-items/{id}", patch(update_item).delete(delete_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePersonalItem {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(rename = "type", default = "default_item_type")]
    pub item_type: PersonalItemType,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub priority: Priority,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

fn default_item_type() -> PersonalItemType {
    PersonalItemType::Task
}

/// PATCH body. For `end_at` and `notes` an absent key keeps the value and an
/// explicit `null` clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePersonalItem {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<PersonalItemType>,
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub is_all_day: Option<bool>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 2000))]
    pub notes: Option<Option<String>>,
    pub completed: Option<bool>,
}

/// Marks a key as present, keeping `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Only standalone items are edited here; overrides go through
/// `/plan-overrides`.
fn standalone(item: Option<PersonalItem>) -> Result<PersonalItem, ApiError> {
    item.filter(|i| !i.is_override()).ok_or(ApiError::NotFound("personal item"))
}

fn check_order(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), ApiError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(ApiError::InvalidInput("end_at must not be before start_at".to_string()))
        }
        _ => Ok(()),
    }
}

// GET /api/personal-items?from&to
async fn list_items(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<PersonalItem>>, ApiError> {
    let Query(params) = params?;
    let range = params.range()?;
    let items = PersonalItem::list_in_range(&state.db, user.user_id, &range, ItemScope::Standalone).await?;
    Ok(Json(items))
}

// POST /api/personal-items
async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreatePersonalItem>,
) -> Result<impl IntoResponse, ApiError> {
    check_order(Some(req.start_at), req.end_at)?;

    let item = PersonalItem::insert(
        &state.db,
        user.user_id,
        &NewPersonalItem {
            title: req.title.trim().to_string(),
            item_type: req.item_type,
            start_at: req.start_at,
            end_at: req.end_at,
            is_all_day: req.is_all_day,
            priority: req.priority,
            notes: req.notes,
            original_plan_id: None,
            tutor: None,
            venue: None,
            is_cancelled: false,
        },
    )
    .await?;

    invalidate_calendar(&state, user.user_id).await;
    Ok((StatusCode::CREATED, Json(item)))
}

// PATCH /api/personal-items/{id}
async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(req): ValidatedJson<UpdatePersonalItem>,
) -> Result<Json<PersonalItem>, ApiError> {
    let Path(id) = id?;
    let current = standalone(PersonalItem::find(&state.db, user.user_id, id).await?)?;
    let end_at = match req.end_at {
        Some(end_at) => end_at,
        None => current.end_at,
    };
    check_order(req.start_at.or(Some(current.start_at)), end_at)?;

    let patch = PersonalItemPatch {
        title: req.title.map(|t| t.trim().to_string()),
        item_type: req.item_type,
        start_at: req.start_at,
        end_at: req.end_at,
        is_all_day: req.is_all_day,
        priority: req.priority,
        notes: req.notes,
        completed: req.completed,
    };
    let item = PersonalItem::update(&state.db, user.user_id, id, &patch)
        .await?
        .ok_or(ApiError::NotFound("personal item"))?;

    invalidate_calendar(&state, user.user_id).await;
    Ok(Json(item))
}

// DELETE /api/personal-items/{id}
async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    if !PersonalItem::delete(&state.db, user.user_id, id, ItemScope::Standalone).await? {
        return Err(ApiError::NotFound("personal item"));
    }

    invalidate_calendar(&state, user.user_id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn create_body_defaults_and_validation() {
        let body: CreatePersonalItem =
            serde_json::from_str(r#"{"title":"Library","start_at":"2025-10-06T10:00:00Z"}"#).unwrap();
        assert_eq!(body.item_type, PersonalItemType::Task);
        assert_eq!(body.priority, Priority::Medium);
        assert!(!body.is_all_day);
        assert!(body.validate().is_ok());

        let empty: CreatePersonalItem =
            serde_json::from_str(r#"{"title":"","type":"study","start_at":"2025-10-06T10:00:00Z"}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    fn item(original_plan_id: Option<&str>) -> PersonalItem {
        let at = Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap();
        PersonalItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Library".to_string(),
            item_type: PersonalItemType::Study,
            start_at: at,
            end_at: None,
            is_all_day: false,
            priority: Priority::Medium,
            notes: Some("bring laptop".to_string()),
            completed: false,
            original_plan_id: original_plan_id.map(str::to_string),
            tutor: None,
            venue: None,
            is_cancelled: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn patch_only_reaches_standalone_items() {
        assert!(standalone(Some(item(None))).is_ok());

        let err = standalone(Some(item(Some("2025-10-06|topic|LAW1051|Tort Law: Negligence")))).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(matches!(standalone(None), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn patch_tells_null_from_absent() {
        let cleared: UpdatePersonalItem = serde_json::from_str(r#"{"notes":null,"end_at":null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));
        assert_eq!(cleared.end_at, Some(None));

        let untouched: UpdatePersonalItem = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert_eq!(untouched.notes, None);
        assert_eq!(untouched.end_at, None);

        let set: UpdatePersonalItem = serde_json::from_str(r#"{"notes":"read ch. 4"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("read ch. 4".to_string())));
        assert!(set.validate().is_ok());

        let long: UpdatePersonalItem =
            serde_json::from_str(&format!(r#"{{"notes":"{}"}}"#, "x".repeat(2001))).unwrap();
        assert!(long.validate().is_err());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 10, 6, 9, 0, 0).unwrap();
        assert!(check_order(Some(start), Some(end)).is_err());
        assert!(check_order(Some(end), Some(start)).is_ok());
        assert!(check_order(Some(start), None).is_ok());
    }
}
