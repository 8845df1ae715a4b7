use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::calendar::DateRange;
use crate::database::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "personal_item_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PersonalItemType {
    Study,
    Task,
    Appointment,
    Reminder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A row of `personal_items`. With `original_plan_id` set the row is an
/// override of a plan event rather than a standalone item.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PersonalItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub item_type: PersonalItemType,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    pub priority: Priority,
    pub notes: Option<String>,
    pub completed: bool,
    pub original_plan_id: Option<String>,
    pub tutor: Option<String>,
    pub venue: Option<String>,
    pub is_cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a row; ids and timestamps come from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPersonalItem {
    pub title: String,
    pub item_type: PersonalItemType,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    pub priority: Priority,
    pub notes: Option<String>,
    pub original_plan_id: Option<String>,
    pub tutor: Option<String>,
    pub venue: Option<String>,
    pub is_cancelled: bool,
}

/// Partial update of a standalone item. `None` leaves the column as it is;
/// for the nullable columns `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct PersonalItemPatch {
    pub title: Option<String>,
    pub item_type: Option<PersonalItemType>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<Option<DateTime<Utc>>>,
    pub is_all_day: Option<bool>,
    pub priority: Option<Priority>,
    pub notes: Option<Option<String>>,
    pub completed: Option<bool>,
}

/// Which side of `original_plan_id` a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemScope {
    Standalone,
    Overrides,
}

impl PersonalItem {
    pub fn is_override(&self) -> bool {
        self.original_plan_id.is_some()
    }

    pub async fn list_in_range(
        db: &Database,
        user_id: Uuid,
        range: &DateRange,
        scope: ItemScope,
    ) -> Result<Vec<PersonalItem>, sqlx::Error> {
        let (from, to) = range.utc_bounds();
        let filter = match scope {
            ItemScope::Standalone => "original_plan_id IS NULL",
            ItemScope::Overrides => "original_plan_id IS NOT NULL",
        };
        let sql = format!(
            "SELECT * FROM personal_items
             WHERE user_id = $1 AND start_at >= $2 AND start_at < $3 AND {filter}
             ORDER BY start_at, updated_at"
        );

        sqlx::query_as::<_, PersonalItem>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&db.pool)
            .await
    }

    pub async fn find(db: &Database, user_id: Uuid, id: Uuid) -> Result<Option<PersonalItem>, sqlx::Error> {
        sqlx::query_as::<_, PersonalItem>("SELECT * FROM personal_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&db.pool)
            .await
    }

    /// Most recently written override of a plan event, if any.
    pub async fn find_override(
        db: &Database,
        user_id: Uuid,
        plan_event_id: &str,
    ) -> Result<Option<PersonalItem>, sqlx::Error> {
        sqlx::query_as::<_, PersonalItem>(
            "SELECT * FROM personal_items
             WHERE user_id = $1 AND original_plan_id = $2
             ORDER BY updated_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(plan_event_id)
        .fetch_optional(&db.pool)
        .await
    }

    pub async fn insert(db: &Database, user_id: Uuid, item: &NewPersonalItem) -> Result<PersonalItem, sqlx::Error> {
        sqlx::query_as::<_, PersonalItem>(
            "INSERT INTO personal_items
                (user_id, title, type, start_at, end_at, is_all_day, priority, notes,
                 original_plan_id, tutor, venue, is_cancelled)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(user_id)
        .bind(&item.title)
        .bind(item.item_type)
        .bind(item.start_at)
        .bind(item.end_at)
        .bind(item.is_all_day)
        .bind(item.priority)
        .bind(&item.notes)
        .bind(&item.original_plan_id)
        .bind(&item.tutor)
        .bind(&item.venue)
        .bind(item.is_cancelled)
        .fetch_one(&db.pool)
        .await
    }

    /// Applies a patch to a standalone item. Overrides are only changed
    /// through [`PersonalItem::overwrite_override`], so they read as missing.
    pub async fn update(
        db: &Database,
        user_id: Uuid,
        id: Uuid,
        patch: &PersonalItemPatch,
    ) -> Result<Option<PersonalItem>, sqlx::Error> {
        sqlx::query_as::<_, PersonalItem>(
            "UPDATE personal_items SET
                title = COALESCE($3, title),
                type = COALESCE($4, type),
                start_at = COALESCE($5, start_at),
                end_at = CASE WHEN $6 THEN $7 ELSE end_at END,
                is_all_day = COALESCE($8, is_all_day),
                priority = COALESCE($9, priority),
                notes = CASE WHEN $10 THEN $11 ELSE notes END,
                completed = COALESCE($12, completed),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND original_plan_id IS NULL
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .bind(&patch.title)
        .bind(patch.item_type)
        .bind(patch.start_at)
        .bind(patch.end_at.is_some())
        .bind(patch.end_at.flatten())
        .bind(patch.is_all_day)
        .bind(patch.priority)
        .bind(patch.notes.is_some())
        .bind(patch.notes.clone().flatten())
        .bind(patch.completed)
        .fetch_optional(&db.pool)
        .await
    }

    /// Replaces every editable field of an existing override; blank fields
    /// are written as NULL.
    pub async fn overwrite_override(
        db: &Database,
        user_id: Uuid,
        id: Uuid,
        item: &NewPersonalItem,
    ) -> Result<Option<PersonalItem>, sqlx::Error> {
        sqlx::query_as::<_, PersonalItem>(
            "UPDATE personal_items SET
                title = $3, tutor = $4, venue = $5, notes = $6, is_cancelled = $7,
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND original_plan_id IS NOT NULL
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .bind(&item.title)
        .bind(&item.tutor)
        .bind(&item.venue)
        .bind(&item.notes)
        .bind(item.is_cancelled)
        .fetch_optional(&db.pool)
        .await
    }

    /// Deletes a row of the given scope. Returns whether anything was removed.
    pub async fn delete(db: &Database, user_id: Uuid, id: Uuid, scope: ItemScope) -> Result<bool, sqlx::Error> {
        let filter = match scope {
            ItemScope::Standalone => "original_plan_id IS NULL",
            ItemScope::Overrides => "original_plan_id IS NOT NULL",
        };
        let sql = format!("DELETE FROM personal_items WHERE id = $1 AND user_id = $2 AND {filter}");

        sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .execute(&db.pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
