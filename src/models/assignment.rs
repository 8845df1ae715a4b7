use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::calendar::DateRange;
use crate::database::Database;

/// Coursework owned by a student. Read-only from the planner's side; it only
/// shows up on the calendar as a deadline.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub module_id: Option<Uuid>,
    pub module_code: Option<String>,
    pub due_date: NaiveDate,
    pub due_time: Option<NaiveTime>,
    pub status: String,
    pub submission_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub async fn list_due_in_range(
        db: &Database,
        user_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<Assignment>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(
            "SELECT id, user_id, title, module_id, module_code, due_date, due_time, status,
                    submission_url, created_at
             FROM assignments
             WHERE user_id = $1 AND due_date BETWEEN $2 AND $3
             ORDER BY due_date, due_time NULLS LAST",
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&db.pool)
        .await
    }
}
