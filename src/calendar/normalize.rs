//! Conversion of every source record into a [`NormalizedEvent`].

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::calendar::event::{DateWindow, EventKind, EventMeta, NormalizedEvent};
use crate::calendar::plan::{ModulePlan, PlanAssessment};
use crate::calendar::term::{Term, TermPosition};
use crate::models::{Assignment, PersonalItem, SessionType, TimetableEvent};

/// `LAW1091 - UK Constitutional Law`: a 3-4 letter code, four digits, a dash
/// (ASCII or en dash) and the descriptive title.
static MODULE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{3,4}\d{4})\s*[-–]\s*(.+)$").expect("valid module title regex"));

/// Splits a leading module code off a title. Titles without one come back
/// unchanged.
pub fn split_module_code(title: &str) -> (Option<String>, String) {
    match MODULE_TITLE.captures(title) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
        None => (None, title.to_string()),
    }
}

/// A source record that maps onto exactly one calendar event.
pub trait Normalize {
    fn normalize(&self) -> NormalizedEvent;
}

fn clock(at: &DateTime<Utc>) -> NaiveTime {
    NaiveTime::from_hms_opt(at.hour(), at.minute(), 0).unwrap_or(NaiveTime::MIN)
}

impl Normalize for TimetableEvent {
    fn normalize(&self) -> NormalizedEvent {
        let (code, title) = split_module_code(&self.title);
        let session = self.session_type.unwrap_or_else(|| SessionType::infer(&self.title));

        NormalizedEvent {
            id: format!("timetable-{}", self.id),
            title,
            date: self.start_time.date_naive(),
            start: Some(clock(&self.start_time)),
            end: self.end_time.as_ref().map(clock),
            all_day: false,
            kind: EventKind::Topic,
            module_code: code.or_else(|| self.module_code.clone()),
            module: None,
            window: None,
            meta: EventMeta::Timetable {
                timetable_id: self.id,
                session,
                location: self.location.clone(),
                lecturer: self.lecturer.clone(),
            },
        }
    }
}

impl Normalize for PersonalItem {
    fn normalize(&self) -> NormalizedEvent {
        let (start, end) = if self.is_all_day {
            (None, None)
        } else {
            (Some(clock(&self.start_at)), self.end_at.as_ref().map(clock))
        };

        NormalizedEvent {
            id: format!("personal-{}", self.id),
            title: self.title.clone(),
            date: self.start_at.date_naive(),
            start,
            end,
            all_day: self.is_all_day,
            kind: EventKind::Other,
            module_code: None,
            module: None,
            window: None,
            meta: EventMeta::Personal {
                personal_item_id: self.id,
                item_type: self.item_type,
                priority: self.priority,
                completed: self.completed,
                notes: self.notes.clone(),
            },
        }
    }
}

impl Normalize for Assignment {
    fn normalize(&self) -> NormalizedEvent {
        let (code, title) = split_module_code(&self.title);

        NormalizedEvent {
            id: format!("assignment-{}", self.id),
            title,
            date: self.due_date,
            start: None,
            end: None,
            all_day: true,
            kind: EventKind::Assessment,
            module_code: code.or_else(|| self.module_code.clone()),
            module: None,
            window: None,
            meta: EventMeta::Assignment {
                assignment_id: self.id,
                module_id: self.module_id,
                status: self.status.clone(),
                due_time: self.due_time,
                submission_url: self.submission_url.clone(),
            },
        }
    }
}

/// Stable id of a plan event. Overrides point back at it, so it must not
/// change while the plan data stays the same.
pub fn plan_event_id(date: NaiveDate, kind: EventKind, module_code: Option<&str>, title: &str) -> String {
    format!("{}|{}|{}|{}", date, kind.as_str(), module_code.unwrap_or_default(), title)
}

fn plan_event(
    module: &ModulePlan,
    title: String,
    date: NaiveDate,
    kind: EventKind,
    window: Option<DateWindow>,
    meta: EventMeta,
) -> NormalizedEvent {
    NormalizedEvent {
        id: plan_event_id(date, kind, module.code.as_deref(), &title),
        title,
        date,
        start: None,
        end: None,
        all_day: true,
        kind,
        module_code: module.code.clone(),
        module: Some(module.title.clone()),
        window,
        meta,
    }
}

pub fn plan_topic(module: &ModulePlan, topic: &str, date: NaiveDate, term: Term, week: u8) -> NormalizedEvent {
    plan_event(
        module,
        format!("{}: {}", module.title, topic),
        date,
        EventKind::Topic,
        None,
        EventMeta::Plan { term: Some(term), week: Some(week) },
    )
}

pub fn plan_deadline(
    module: &ModulePlan,
    assessment: &PlanAssessment,
    due: NaiveDate,
    position: Option<TermPosition>,
) -> NormalizedEvent {
    plan_event(
        module,
        format!("{} {}", module.title, assessment.kind),
        due,
        EventKind::Assessment,
        None,
        EventMeta::Plan {
            term: position.as_ref().map(|p| p.term),
            week: position.as_ref().map(|p| p.week),
        },
    )
}

pub fn plan_exam_window(module: &ModulePlan, window: DateWindow) -> NormalizedEvent {
    plan_event(
        module,
        format!("{} • Exam window", module.title),
        window.start,
        EventKind::Exam,
        Some(window),
        EventMeta::Plan { term: None, week: None },
    )
}

/// How an event card is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationType {
    Lecture,
    Seminar,
    Tutorial,
    Deadline,
    Personal,
    Assessment,
    Other,
}

pub fn presentation_type(event: &NormalizedEvent) -> PresentationType {
    match &event.meta {
        EventMeta::Timetable { session, .. } => match session {
            SessionType::Lecture => PresentationType::Lecture,
            SessionType::Seminar => PresentationType::Seminar,
            SessionType::Tutorial => PresentationType::Tutorial,
        },
        EventMeta::Assignment { .. } => PresentationType::Deadline,
        EventMeta::Personal { .. } => PresentationType::Personal,
        _ => match event.kind {
            EventKind::Assessment | EventKind::Exam => PresentationType::Assessment,
            _ => PresentationType::Other,
        },
    }
}
