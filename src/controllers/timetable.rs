use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::calendar::normalize::split_module_code;
use crate::controllers::{invalidate_calendar, RangeQuery};
use crate::error::{ApiError, ValidatedJson};
use crate::middleware::AuthUser;
use crate::models::{NewTimetableEvent, SessionType, TimetableEvent};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/timetable", get(list_timetable).post(import_timetable))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TimetableRow {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20))]
    pub module_code: Option<String>,
    pub session_type: Option<SessionType>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 200))]
    pub lecturer: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportTimetable {
    /// Drop the user's existing rows first.
    #[serde(default)]
    pub replace: bool,
    #[validate(length(min = 1, max = 1000), nested)]
    pub rows: Vec<TimetableRow>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub rows: Vec<TimetableEvent>,
}

impl TimetableRow {
    /// Session type and module code are settled here, once, so reads never
    /// have to guess from the title.
    fn into_new(self) -> Result<NewTimetableEvent, ApiError> {
        if self.end_time.is_some_and(|end| end < self.start_time) {
            return Err(ApiError::InvalidInput(format!("`{}` ends before it starts", self.title)));
        }
        let session_type = self.session_type.unwrap_or_else(|| SessionType::infer(&self.title));
        let module_code = self.module_code.or_else(|| split_module_code(&self.title).0);

        Ok(NewTimetableEvent {
            title: self.title,
            module_code,
            session_type,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            lecturer: self.lecturer,
        })
    }
}

// GET /api/timetable?from&to
async fn list_timetable(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<TimetableEvent>>, ApiError> {
    let Query(params) = params?;
    let range = params.range()?;
    Ok(Json(TimetableEvent::list_in_range(&state.db, user.user_id, &range).await?))
}

// POST /api/timetable
async fn import_timetable(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ImportTimetable>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = req
        .rows
        .into_iter()
        .map(TimetableRow::into_new)
        .collect::<Result<Vec<_>, _>>()?;

    let inserted = TimetableEvent::import(&state.db, user.user_id, &rows, req.replace).await?;
    info!(user = %user.user_id, replace = req.replace, "Imported {} timetable rows", inserted.len());

    invalidate_calendar(&state, user.user_id).await;
    Ok((StatusCode::CREATED, Json(ImportResponse { imported: inserted.len(), rows: inserted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(title: &str, session: Option<SessionType>) -> TimetableRow {
        TimetableRow {
            title: title.to_string(),
            module_code: None,
            session_type: session,
            start_time: Utc.with_ymd_and_hms(2025, 10, 7, 10, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2025, 10, 7, 11, 0, 0).unwrap()),
            location: None,
            lecturer: None,
        }
    }

    #[test]
    fn ingestion_settles_session_and_code() {
        let new = row("LAW1071 - Contract Seminar", None).into_new().unwrap();
        assert_eq!(new.session_type, SessionType::Seminar);
        assert_eq!(new.module_code.as_deref(), Some("LAW1071"));

        let explicit = row("Contract Seminar", Some(SessionType::Tutorial)).into_new().unwrap();
        assert_eq!(explicit.session_type, SessionType::Tutorial);
        assert_eq!(explicit.module_code, None);
    }

    #[test]
    fn rejects_rows_ending_before_they_start() {
        let mut bad = row("Tort Lecture", None);
        bad.end_time = Some(Utc.with_ymd_and_hms(2025, 10, 7, 9, 0, 0).unwrap());
        assert!(bad.into_new().is_err());
    }

    #[test]
    fn import_requires_rows() {
        let empty = ImportTimetable { replace: false, rows: Vec::new() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn import_validates_every_row() {
        let body: ImportTimetable = serde_json::from_str(
            r#"{"rows":[{"title":"LAW1051 - Tort Lecture","start_time":"2025-10-06T09:00:00Z","session_type":"lecture"}]}"#,
        )
        .unwrap();
        assert!(!body.replace);
        assert!(body.validate().is_ok());

        let nested = ImportTimetable { replace: true, rows: vec![row("", None)] };
        let errors = nested.validate().unwrap_err();
        assert!(errors.errors().contains_key("rows"));
    }
}
