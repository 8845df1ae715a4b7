//! The single event shape every calendar source is normalized into.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::calendar::term::Term;
use crate::models::{PersonalItemType, Priority, SessionType};

/// Broad category of an event, independent of where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Topic,
    Assessment,
    Exam,
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Topic => "topic",
            EventKind::Assessment => "assessment",
            EventKind::Exam => "exam",
            EventKind::Other => "other",
        }
    }
}

/// Where an event was produced from. Exactly one per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Timetable,
    Personal,
    Assignment,
    Plan,
    PlanOverride,
}

impl Source {
    /// The visibility layer this source is toggled by.
    pub fn layer(&self) -> Layer {
        match self {
            Source::Timetable => Layer::Timetable,
            Source::Personal => Layer::Personal,
            Source::Assignment => Layer::Assignment,
            Source::Plan | Source::PlanOverride => Layer::Plan,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Timetable => "timetable",
            Source::Personal => "personal",
            Source::Assignment => "assignment",
            Source::Plan => "plan",
            Source::PlanOverride => "plan_override",
        }
    }
}

/// A source category the calendar view can show or hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Plan,
    Personal,
    Assignment,
    Timetable,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Plan, Layer::Personal, Layer::Assignment, Layer::Timetable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Plan => "plan",
            Layer::Personal => "personal",
            Layer::Assignment => "assignment",
            Layer::Timetable => "timetable",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layer `{0}`")]
pub struct UnknownLayer(pub String);

impl FromStr for Layer {
    type Err = UnknownLayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(Layer::Plan),
            "personal" => Ok(Layer::Personal),
            "assignment" | "assignments" => Ok(Layer::Assignment),
            "timetable" => Ok(Layer::Timetable),
            other => Err(UnknownLayer(other.to_string())),
        }
    }
}

/// Inclusive date span, used for exam windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Source-specific details. The tag doubles as the event's `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventMeta {
    Timetable {
        timetable_id: Uuid,
        session: SessionType,
        location: Option<String>,
        lecturer: Option<String>,
    },
    Personal {
        personal_item_id: Uuid,
        item_type: PersonalItemType,
        priority: Priority,
        completed: bool,
        notes: Option<String>,
    },
    Assignment {
        assignment_id: Uuid,
        module_id: Option<Uuid>,
        status: String,
        #[serde(with = "hhmm::option", default)]
        due_time: Option<NaiveTime>,
        submission_url: Option<String>,
    },
    Plan {
        term: Option<Term>,
        week: Option<u8>,
    },
    PlanOverride {
        personal_item_id: Uuid,
        original_title: String,
        term: Option<Term>,
        week: Option<u8>,
        tutor: Option<String>,
        venue: Option<String>,
        notes: Option<String>,
        is_cancelled: bool,
    },
}

impl EventMeta {
    pub fn source(&self) -> Source {
        match self {
            EventMeta::Timetable { .. } => Source::Timetable,
            EventMeta::Personal { .. } => Source::Personal,
            EventMeta::Assignment { .. } => Source::Assignment,
            EventMeta::Plan { .. } => Source::Plan,
            EventMeta::PlanOverride { .. } => Source::PlanOverride,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm::option", default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveTime>,
    #[serde(with = "hhmm::option", default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveTime>,
    pub all_day: bool,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<DateWindow>,
    pub meta: EventMeta,
}

impl NormalizedEvent {
    pub fn source(&self) -> Source {
        self.meta.source()
    }

    pub fn layer(&self) -> Layer {
        self.source().layer()
    }

    pub fn is_timed(&self) -> bool {
        self.start.is_some()
    }
}

/// `HH:mm` wire format for clock times.
pub mod hhmm {
    use chrono::NaiveTime;

    pub const FORMAT: &str = "%H:%M";

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s, FORMAT)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(time) => serializer.serialize_str(&super::format(time)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_event() -> NormalizedEvent {
        NormalizedEvent {
            id: "2025-10-06|topic|LAW1051|Tort Law: Introduction".to_string(),
            title: "Tort Law: Introduction".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 6).unwrap(),
            start: None,
            end: None,
            all_day: true,
            kind: EventKind::Topic,
            module_code: Some("LAW1051".to_string()),
            module: Some("Tort Law".to_string()),
            window: None,
            meta: EventMeta::Plan { term: Some(Term::Michaelmas), week: Some(1) },
        }
    }

    #[test]
    fn serializes_with_source_tag_and_iso_date() {
        let json = serde_json::to_value(plan_event()).unwrap();
        assert_eq!(json["date"], "2025-10-06");
        assert_eq!(json["allDay"], true);
        assert_eq!(json["moduleCode"], "LAW1051");
        assert_eq!(json["meta"]["source"], "plan");
        assert_eq!(json["meta"]["week"], 1);
        assert!(json.get("start").is_none());
    }

    #[test]
    fn timed_event_uses_hh_mm() {
        let mut event = plan_event();
        event.start = NaiveTime::from_hms_opt(9, 5, 30);
        event.end = NaiveTime::from_hms_opt(10, 0, 0);
        event.all_day = false;

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start"], "09:05");
        assert_eq!(json["end"], "10:00");

        let back: NormalizedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.start, NaiveTime::from_hms_opt(9, 5, 0));
    }

    #[test]
    fn override_belongs_to_plan_layer() {
        let mut event = plan_event();
        event.meta = EventMeta::PlanOverride {
            personal_item_id: Uuid::nil(),
            original_title: event.title.clone(),
            term: None,
            week: None,
            tutor: None,
            venue: None,
            notes: None,
            is_cancelled: true,
        };
        assert_eq!(event.source(), Source::PlanOverride);
        assert_eq!(event.layer(), Layer::Plan);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["meta"]["source"], "plan_override");
        assert_eq!(json["meta"]["isCancelled"], true);
    }

    #[test]
    fn layer_parsing() {
        assert_eq!("Timetable".parse::<Layer>(), Ok(Layer::Timetable));
        assert_eq!(" assignments ".parse::<Layer>(), Ok(Layer::Assignment));
        assert!("ics".parse::<Layer>().is_err());
    }
}
