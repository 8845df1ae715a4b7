//! Plan overrides: a student's customization of a plan event, stored as a
//! personal item whose `original_plan_id` points at the plan event.
//!
//! A plan event is either *original* or *overridden*. Saving a customization
//! moves it to overridden (insert, or update if one exists); reverting deletes
//! the personal item and the original comes back untouched. The plan event's
//! id, date, module, times and kind never change while overridden; only the
//! title, tutor, venue, notes and cancelled flag are taken from the override.
//!
//! Overrides are not reconciled when the plan itself moves an event: the
//! override keeps pointing at the old id and simply stops matching.

use chrono::NaiveTime;
use std::collections::HashMap;
use uuid::Uuid;

use crate::calendar::event::{EventMeta, NormalizedEvent};
use crate::models::{NewPersonalItem, PersonalItem, PersonalItemType, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideState {
    Original,
    Overridden { personal_item_id: Uuid },
}

pub fn state_of(event: &NormalizedEvent) -> OverrideState {
    match event.meta {
        EventMeta::PlanOverride { personal_item_id, .. } => OverrideState::Overridden { personal_item_id },
        _ => OverrideState::Original,
    }
}

/// Editable fields of an override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideFields {
    pub title: String,
    pub tutor: Option<String>,
    pub venue: Option<String>,
    pub notes: Option<String>,
    pub is_cancelled: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

impl OverrideFields {
    fn cleaned(&self) -> OverrideFields {
        OverrideFields {
            title: self.title.trim().to_string(),
            tutor: non_blank(&self.tutor),
            venue: non_blank(&self.venue),
            notes: non_blank(&self.notes),
            is_cancelled: self.is_cancelled,
        }
    }
}

/// Row for a customization of `plan_event`, anchored at its date and times.
/// Used both for the first save and to overwrite an existing override.
pub fn new_override(plan_event: &NormalizedEvent, fields: &OverrideFields) -> NewPersonalItem {
    let fields = fields.cleaned();
    let start = plan_event.start.unwrap_or(NaiveTime::MIN);

    NewPersonalItem {
        title: fields.title,
        item_type: PersonalItemType::Study,
        start_at: plan_event.date.and_time(start).and_utc(),
        end_at: plan_event.end.map(|end| plan_event.date.and_time(end).and_utc()),
        is_all_day: plan_event.start.is_none(),
        priority: Priority::default(),
        notes: fields.notes,
        original_plan_id: Some(plan_event.id.clone()),
        tutor: fields.tutor,
        venue: fields.venue,
        is_cancelled: fields.is_cancelled,
    }
}

/// Displays `item` in place of `plan_event`. Anything that is not a plan
/// event comes back unchanged.
pub fn apply_override(plan_event: NormalizedEvent, item: &PersonalItem) -> NormalizedEvent {
    let plan_event = revert(plan_event);
    let EventMeta::Plan { term, week } = plan_event.meta else {
        return plan_event;
    };

    let title = if item.title.trim().is_empty() {
        plan_event.title.clone()
    } else {
        item.title.clone()
    };

    NormalizedEvent {
        meta: EventMeta::PlanOverride {
            personal_item_id: item.id,
            original_title: plan_event.title.clone(),
            term,
            week,
            tutor: item.tutor.clone(),
            venue: item.venue.clone(),
            notes: item.notes.clone(),
            is_cancelled: item.is_cancelled,
        },
        title,
        ..plan_event
    }
}

/// Undoes [`apply_override`]: the original plan event as it was.
pub fn revert(event: NormalizedEvent) -> NormalizedEvent {
    match event.meta {
        EventMeta::PlanOverride { original_title, term, week, .. } => NormalizedEvent {
            title: original_title,
            meta: EventMeta::Plan { term, week },
            ..event
        },
        _ => event,
    }
}

/// Substitutes overrides into a list of plan events. When several overrides
/// point at the same plan event, the most recently updated one wins.
pub fn resolve(plan_events: Vec<NormalizedEvent>, overrides: &[PersonalItem]) -> Vec<NormalizedEvent> {
    let mut latest: HashMap<&str, &PersonalItem> = HashMap::new();
    for item in overrides {
        let Some(plan_id) = item.original_plan_id.as_deref() else {
            continue;
        };
        latest
            .entry(plan_id)
            .and_modify(|current| {
                if item.updated_at >= current.updated_at {
                    *current = item;
                }
            })
            .or_insert(item);
    }

    plan_events
        .into_iter()
        .map(|event| match latest.get(event.id.as_str()) {
            Some(item) => apply_override(event, item),
            None => event,
        })
        .collect()
}

/// Overrides whose plan event no longer exists in the plan.
pub fn orphaned<'a>(plan_events: &[NormalizedEvent], overrides: &'a [PersonalItem]) -> Vec<&'a PersonalItem> {
    overrides
        .iter()
        .filter(|item| match item.original_plan_id.as_deref() {
            Some(id) => !plan_events.iter().any(|e| e.id == id),
            None => false,
        })
        .collect()
}
