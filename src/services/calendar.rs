//! calendar.rs
//!
//! Service layer between the HTTP handlers and the calendar core.
//!
//! 1.  **Reads**: the four per-user sources (overrides, personal items,
//!     assignments, timetable) are fetched concurrently, plan events are
//!     expanded for the same range, overrides are substituted into the plan
//!     and everything is merged into one ordered timeline.
//! 2.  **Override lifecycle**: saving inserts or overwrites the override row
//!     of a plan event; reverting deletes it.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::overrides::{self, OverrideFields};
use crate::calendar::{merge, AcademicYearPlan, DateRange, Normalize, NormalizedEvent, PlanCatalog, YearKey};
use crate::database::Database;
use crate::error::ApiError;
use crate::models::{Assignment, ItemScope, PersonalItem, TimetableEvent};

fn normalize_all<T: Normalize>(records: &[T]) -> Vec<NormalizedEvent> {
    records.iter().map(Normalize::normalize).collect()
}

pub struct CalendarService<'a> {
    db: &'a Database,
    plans: &'a PlanCatalog,
}

impl<'a> CalendarService<'a> {
    pub fn new(db: &'a Database, plans: &'a PlanCatalog) -> Self {
        Self { db, plans }
    }

    pub fn plan(&self, year: YearKey) -> Result<&'a AcademicYearPlan, ApiError> {
        self.plans.get(year).ok_or_else(|| ApiError::UnknownPlan(year.to_string()))
    }

    /// Every event the user can see in `range`, all layers included, ordered
    /// by date then start time.
    pub async fn load_events(
        &self,
        user_id: Uuid,
        range: &DateRange,
        year: YearKey,
    ) -> Result<Vec<NormalizedEvent>, ApiError> {
        let plan = self.plan(year)?;

        let (overrides, personal, assignments, timetable) = futures::try_join!(
            PersonalItem::list_in_range(self.db, user_id, range, ItemScope::Overrides),
            PersonalItem::list_in_range(self.db, user_id, range, ItemScope::Standalone),
            Assignment::list_due_in_range(self.db, user_id, range),
            TimetableEvent::list_in_range(self.db, user_id, range),
        )?;

        let plan_events = plan.events_in(range);
        let stale = overrides::orphaned(&plan_events, &overrides);
        if !stale.is_empty() {
            warn!(user = %user_id, count = stale.len(), "Overrides no longer match a plan event in range");
        }
        let plan_events = overrides::resolve(plan_events, &overrides);
        debug!(
            user = %user_id,
            plan = plan_events.len(),
            overrides = overrides.len(),
            personal = personal.len(),
            assignments = assignments.len(),
            timetable = timetable.len(),
            "Loaded calendar sources for {}..{}",
            range.start,
            range.end
        );

        Ok(merge([
            plan_events,
            normalize_all(&personal),
            normalize_all(&assignments),
            normalize_all(&timetable),
        ]))
    }

    /// Saves the user's customization of a plan event and returns the event
    /// as it now displays.
    pub async fn save_override(
        &self,
        user_id: Uuid,
        year: YearKey,
        plan_event_id: &str,
        fields: &OverrideFields,
    ) -> Result<NormalizedEvent, ApiError> {
        let plan_event = self
            .plan(year)?
            .find_event(plan_event_id)
            .ok_or_else(|| ApiError::UnknownPlanEvent(plan_event_id.to_string()))?;
        let row = overrides::new_override(&plan_event, fields);

        let item = match PersonalItem::find_override(self.db, user_id, plan_event_id).await? {
            Some(existing) => PersonalItem::overwrite_override(self.db, user_id, existing.id, &row)
                .await?
                .ok_or(ApiError::NotFound("override"))?,
            None => PersonalItem::insert(self.db, user_id, &row).await?,
        };

        info!(user = %user_id, plan_event = %plan_event_id, "Saved plan override {}", item.id);
        Ok(overrides::apply_override(plan_event, &item))
    }

    /// Deletes an override. Returns the plan event it customized when that
    /// event still exists in the plan. The plan is resolved before anything
    /// is written, so a bad `year` leaves the override in place.
    pub async fn revert_override(
        &self,
        user_id: Uuid,
        year: YearKey,
        override_id: Uuid,
    ) -> Result<Option<NormalizedEvent>, ApiError> {
        let plan = self.plan(year)?;
        let item = PersonalItem::find(self.db, user_id, override_id)
            .await?
            .filter(PersonalItem::is_override)
            .ok_or(ApiError::NotFound("override"))?;

        if !PersonalItem::delete(self.db, user_id, item.id, ItemScope::Overrides).await? {
            return Err(ApiError::NotFound("override"));
        }
        info!(user = %user_id, "Reverted plan override {}", item.id);

        Ok(item.original_plan_id.as_deref().and_then(|id| plan.find_event(id)))
    }
}
