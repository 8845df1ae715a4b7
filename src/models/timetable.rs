use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::calendar::DateRange;
use crate::database::Database;

/// Kind of teaching session a timetable row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Lecture,
    Seminar,
    Tutorial,
}

impl SessionType {
    /// Best guess from a free-text title. Rows imported with an explicit type
    /// never go through this.
    pub fn infer(title: &str) -> SessionType {
        let lower = title.to_lowercase();
        if lower.contains("lecture") {
            SessionType::Lecture
        } else if lower.contains("seminar") {
            SessionType::Seminar
        } else if lower.contains("tutorial") {
            SessionType::Tutorial
        } else {
            SessionType::Lecture
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TimetableEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub module_code: Option<String>,
    pub session_type: Option<SessionType>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub lecturer: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTimetableEvent {
    pub title: String,
    pub module_code: Option<String>,
    pub session_type: SessionType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub lecturer: Option<String>,
}

impl TimetableEvent {
    pub async fn list_in_range(
        db: &Database,
        user_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<TimetableEvent>, sqlx::Error> {
        let (from, to) = range.utc_bounds();
        sqlx::query_as::<_, TimetableEvent>(
            "SELECT * FROM timetable_events
             WHERE user_id = $1 AND start_time >= $2 AND start_time < $3
             ORDER BY start_time",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&db.pool)
        .await
    }

    /// Inserts a batch of rows in one transaction; either all land or none.
    /// With `replace` the user's existing rows are removed in the same
    /// transaction.
    pub async fn import(
        db: &Database,
        user_id: Uuid,
        rows: &[NewTimetableEvent],
        replace: bool,
    ) -> Result<Vec<TimetableEvent>, sqlx::Error> {
        let mut tx = db.pool.begin().await?;

        if replace {
            let removed = sqlx::query("DELETE FROM timetable_events WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            debug!("Replacing {} timetable rows for user {}", removed, user_id);
        }

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let event = sqlx::query_as::<_, TimetableEvent>(
                "INSERT INTO timetable_events
                    (user_id, title, module_code, session_type, start_time, end_time, location, lecturer)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING *",
            )
            .bind(user_id)
            .bind(&row.title)
            .bind(&row.module_code)
            .bind(row.session_type)
            .bind(row.start_time)
            .bind(row.end_time)
            .bind(&row.location)
            .bind(&row.lecturer)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(event);
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
