//! The curriculum plan: term dates, modules, weekly topics and assessments
//! for each year of study, and their expansion into calendar events.

use chrono::{Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::calendar::event::{DateWindow, NormalizedEvent};
use crate::calendar::normalize;
use crate::calendar::range::DateRange;
use crate::calendar::term::{AcademicCalendar, Term};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read plan catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse plan catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("plan catalog contains {0} twice")]
    DuplicateYear(YearKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearKey {
    Foundation,
    Year1,
    Year2,
    Year3,
}

impl YearKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearKey::Foundation => "foundation",
            YearKey::Year1 => "year1",
            YearKey::Year2 => "year2",
            YearKey::Year3 => "year3",
        }
    }
}

impl fmt::Display for YearKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YearKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foundation" => Ok(YearKey::Foundation),
            "year1" => Ok(YearKey::Year1),
            "year2" => Ok(YearKey::Year2),
            "year3" => Ok(YearKey::Year3),
            other => Err(format!("unknown year `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermBlock {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Monday of each teaching week, in order.
    pub weeks: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermDates {
    pub induction: DateWindow,
    pub michaelmas: TermBlock,
    pub epiphany: TermBlock,
    pub easter: TermBlock,
    pub exams: DateWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Michaelmas,
    Epiphany,
    #[serde(rename = "Michaelmas+Epiphany")]
    Both,
}

impl Delivery {
    pub fn taught_in(&self, term: Term) -> bool {
        matches!(
            (self, term),
            (Delivery::Michaelmas | Delivery::Both, Term::Michaelmas)
                | (Delivery::Epiphany | Delivery::Both, Term::Epiphany)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicList {
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAssessment {
    #[serde(rename = "type")]
    pub kind: String,
    pub due: Option<NaiveDate>,
    pub window: Option<DateWindow>,
    pub weight: Option<u8>,
    pub word_count: Option<u32>,
}

impl PlanAssessment {
    pub fn is_exam(&self) -> bool {
        self.kind.eq_ignore_ascii_case("exam")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePlan {
    pub code: Option<String>,
    pub title: String,
    pub credits: u16,
    pub compulsory: bool,
    pub delivery: Delivery,
    /// Teaching day for the weekly topic. Falls back to a title lookup.
    pub weekday: Option<Weekday>,
    #[serde(default)]
    pub assessments: Vec<PlanAssessment>,
    pub notes: Option<String>,
    pub michaelmas: Option<TopicList>,
    pub epiphany: Option<TopicList>,
    /// Year-long topic list, indexed by week within each term.
    pub topics: Option<Vec<String>>,
}

/// Module families with a fixed teaching day when the plan does not say.
const MODULE_DAYS: [(&str, Weekday); 5] = [
    ("Tort", Weekday::Mon),
    ("Contract", Weekday::Tue),
    ("European Union", Weekday::Wed),
    ("UK Constitutional", Weekday::Thu),
    ("Introduction to English Law", Weekday::Fri),
];

impl ModulePlan {
    pub fn teaching_day(&self) -> Weekday {
        self.weekday.unwrap_or_else(|| {
            MODULE_DAYS
                .iter()
                .find(|(family, _)| self.title.contains(family))
                .map(|(_, day)| *day)
                .unwrap_or(Weekday::Mon)
        })
    }

    pub fn topic_for_week(&self, term: Term, week_idx: usize) -> Option<&str> {
        if let Some(topic) = self.topics.as_ref().and_then(|t| t.get(week_idx)) {
            return Some(topic.as_str());
        }
        let bucket = match term {
            Term::Michaelmas => self.michaelmas.as_ref(),
            Term::Epiphany => self.epiphany.as_ref(),
            Term::Easter => None,
        };
        bucket.and_then(|b| b.topics.get(week_idx)).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYearPlan {
    pub academic_year: String,
    pub year_key: YearKey,
    pub year_label: String,
    pub term_dates: TermDates,
    pub modules: Vec<ModulePlan>,
}

impl AcademicYearPlan {
    pub fn calendar(&self) -> AcademicCalendar<'_> {
        AcademicCalendar::new(&self.term_dates)
    }

    /// Plan events dated inside `range`. Everything is all-day; exam windows
    /// appear once, on their first day.
    pub fn events_in(&self, range: &DateRange) -> Vec<NormalizedEvent> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |event: NormalizedEvent| {
            if seen.insert(event.id.clone()) {
                out.push(event);
            }
        };

        for term in [Term::Michaelmas, Term::Epiphany] {
            let block = self.calendar().block(term);
            for (idx, monday) in block.weeks.iter().enumerate() {
                for module in self.modules.iter().filter(|m| m.delivery.taught_in(term)) {
                    let Some(topic) = module.topic_for_week(term, idx) else {
                        continue;
                    };
                    let offset = module.teaching_day().num_days_from_monday();
                    let day = *monday + Days::new(u64::from(offset));
                    if !range.contains(day) {
                        continue;
                    }
                    let week = u8::try_from(idx + 1).unwrap_or(u8::MAX);
                    push(normalize::plan_topic(module, topic, day, term, week));
                }
            }
        }

        for module in &self.modules {
            for assessment in &module.assessments {
                if let Some(due) = assessment.due {
                    if range.contains(due) {
                        let position = self.calendar().position(due);
                        push(normalize::plan_deadline(module, assessment, due, position));
                    }
                } else if let (true, Some(window)) = (assessment.is_exam(), assessment.window) {
                    if range.contains(window.start) {
                        push(normalize::plan_exam_window(module, window));
                    }
                }
            }
        }

        out
    }

    /// Looks a plan event up by its stable id. The id leads with the event's
    /// date, so only that day needs expanding.
    pub fn find_event(&self, id: &str) -> Option<NormalizedEvent> {
        let day = id.split('|').next().and_then(|d| NaiveDate::from_str(d).ok())?;
        self.events_in(&DateRange::single(day))
            .into_iter()
            .find(|e| e.id == id)
    }

    /// Whole academic year, induction through the end of exams.
    pub fn span(&self) -> DateRange {
        let start = self.term_dates.induction.start;
        let end = self.term_dates.exams.end.max(self.term_dates.easter.end);
        DateRange { start, end }
    }

    pub fn modules_in(&self, term: Term) -> impl Iterator<Item = &ModulePlan> {
        self.modules.iter().filter(move |m| m.delivery.taught_in(term))
    }
}

/// All plans the service knows about, one per year of study.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: HashMap<YearKey, AcademicYearPlan>,
}

impl PlanCatalog {
    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let list: Vec<AcademicYearPlan> = serde_json::from_str(raw)?;
        let mut plans = HashMap::with_capacity(list.len());
        for plan in list {
            let key = plan.year_key;
            if plans.insert(key, plan).is_some() {
                return Err(PlanError::DuplicateYear(key));
            }
        }
        Ok(Self { plans })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&raw)?;
        info!("Loaded {} academic year plans from {}", catalog.plans.len(), path.display());
        Ok(catalog)
    }

    pub fn get(&self, year: YearKey) -> Option<&AcademicYearPlan> {
        self.plans.get(&year)
    }

    pub fn years(&self) -> Vec<YearKey> {
        let mut years: Vec<_> = self.plans.keys().copied().collect();
        years.sort();
        years
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::calendar::event::{EventKind, EventMeta};

    pub(crate) fn sample_catalog() -> PlanCatalog {
        PlanCatalog::from_json(include_str!("../../data/plans/durham_llb_2025_26.json"))
            .expect("bundled plan catalog parses")
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn catalog_has_bundled_years() {
        let catalog = sample_catalog();
        assert_eq!(catalog.years(), vec![YearKey::Foundation, YearKey::Year1]);
        assert!(catalog.get(YearKey::Year3).is_none());
    }

    #[test]
    fn duplicate_years_are_rejected() {
        let raw = include_str!("../../data/plans/durham_llb_2025_26.json");
        let mut list: Vec<serde_json::Value> = serde_json::from_str(raw).unwrap();
        list.push(list[1].clone());
        let err = PlanCatalog::from_json(&serde_json::to_string(&list).unwrap()).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateYear(YearKey::Year1)));
    }

    #[test]
    fn topics_land_on_module_weekdays() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let week = DateRange::week_of(d(2025, 10, 6)).unwrap();
        let events = plan.events_in(&week);

        let topics: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Topic).collect();
        assert_eq!(topics.len(), 5);

        let tort = topics.iter().find(|e| e.module_code.as_deref() == Some("LAW1051")).unwrap();
        assert_eq!(tort.date, d(2025, 10, 6));
        assert_eq!(tort.title, "Tort Law: Introduction to Tort: Purpose and Boundaries");
        assert!(tort.all_day);
        assert_eq!(tort.meta, EventMeta::Plan { term: Some(Term::Michaelmas), week: Some(1) });

        // no explicit weekday, resolved through the module family table
        let constitutional = topics.iter().find(|e| e.module_code.as_deref() == Some("LAW1091")).unwrap();
        assert_eq!(constitutional.date, d(2025, 10, 9));

        let intro = topics.iter().find(|e| e.module_code.as_deref() == Some("LAW1121")).unwrap();
        assert_eq!(intro.date, d(2025, 10, 10));
    }

    #[test]
    fn exam_windows_are_emitted_once() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let events = plan.events_in(&DateRange::new(d(2026, 4, 1), d(2026, 7, 31)).unwrap());

        let exams: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Exam).collect();
        assert_eq!(exams.len(), plan.modules.len());
        for exam in exams {
            assert_eq!(exam.date, d(2026, 5, 1));
            let window = exam.window.unwrap();
            assert_eq!(window.end, d(2026, 6, 30));
            assert!(exam.title.ends_with("• Exam window"));
        }

        // window start outside the range: nothing, even though the window overlaps
        let june = plan.events_in(&DateRange::month(2026, 6).unwrap());
        assert!(june.iter().all(|e| e.kind != EventKind::Exam));
    }

    #[test]
    fn deadlines_carry_assessment_type() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let events = plan.events_in(&DateRange::single(d(2025, 11, 10)));

        let deadlines: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Assessment).collect();
        let titles: Vec<_> = deadlines.iter().map(|e| e.title.as_str()).collect();
        assert!(titles.contains(&"Tort Law Essay"));
        assert!(titles.contains(&"UK Constitutional Law Essay"));
    }

    #[test]
    fn year_long_topics_fall_back_per_term() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Foundation).unwrap();

        let michaelmas = plan.events_in(&DateRange::week_of(d(2025, 10, 13)).unwrap());
        let skills: Vec<_> = michaelmas.iter().filter(|e| e.kind == EventKind::Topic).collect();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].title, "Academic Skills and Legal Method: Reading Statutes");
        assert_eq!(skills[0].module_code, None);

        // delivered in Michaelmas only
        let epiphany = plan.events_in(&DateRange::week_of(d(2026, 1, 12)).unwrap());
        assert!(epiphany.iter().all(|e| e.kind != EventKind::Topic));
    }

    #[test]
    fn find_event_by_id() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let week = plan.events_in(&DateRange::week_of(d(2025, 10, 20)).unwrap());
        let target = &week[2];

        assert_eq!(plan.find_event(&target.id).as_ref(), Some(target));
        assert!(plan.find_event("2025-10-20|topic|LAW0000|Nope").is_none());
        assert!(plan.find_event("not-a-date").is_none());
    }
}
