//! Read models for the week, month and year screens.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::calendar::aggregate::{filter_layers, group_by_day, DayBucket, LayerSet};
use crate::calendar::event::{EventKind, NormalizedEvent};
use crate::calendar::plan::AcademicYearPlan;
use crate::calendar::range::{DateRange, RangeError};
use crate::calendar::term::{Term, TermPosition};

/// Titles shown inline on a month cell; the rest is summarized as overflow.
const MONTH_PREVIEW: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub position: Option<TermPosition>,
    pub days: Vec<DayBucket>,
}

impl WeekView {
    pub fn build(
        day: NaiveDate,
        events: &[NormalizedEvent],
        plan: Option<&AcademicYearPlan>,
        layers: &LayerSet,
    ) -> Result<Self, RangeError> {
        let range = DateRange::week_of(day)?;
        Ok(WeekView {
            week_start: range.start,
            week_end: range.end,
            position: plan.and_then(|p| p.calendar().position(range.start)),
            days: group_by_day(events, &range, layers),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub event_count: usize,
    pub has_exam: bool,
    pub has_assessment: bool,
    pub has_teaching: bool,
    pub preview: Vec<String>,
    pub overflow: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub grid: DateRange,
    /// Monday-first rows of seven days.
    pub weeks: Vec<Vec<MonthDay>>,
}

impl MonthView {
    /// Whole weeks covering the month, leading and trailing days included.
    pub fn grid_range(year: i32, month: u32) -> Result<DateRange, RangeError> {
        let month = DateRange::month(year, month)?;
        Ok(DateRange {
            start: DateRange::week_of(month.start)?.start,
            end: DateRange::week_of(month.end)?.end,
        })
    }

    pub fn build(year: i32, month: u32, events: &[NormalizedEvent], layers: &LayerSet) -> Result<Self, RangeError> {
        let grid = Self::grid_range(year, month)?;
        let visible = filter_layers(events, layers);

        let days: Vec<MonthDay> = grid
            .days()
            .map(|date| {
                let on_day: Vec<&NormalizedEvent> = visible.iter().copied().filter(|e| e.date == date).collect();
                MonthDay {
                    date,
                    in_month: date.month() == month && date.year() == year,
                    event_count: on_day.len(),
                    has_exam: on_day.iter().any(|e| e.kind == EventKind::Exam),
                    has_assessment: on_day.iter().any(|e| e.kind == EventKind::Assessment),
                    has_teaching: on_day.iter().any(|e| e.kind == EventKind::Topic),
                    preview: on_day.iter().take(MONTH_PREVIEW).map(|e| e.title.clone()).collect(),
                    overflow: on_day.len().saturating_sub(MONTH_PREVIEW),
                }
            })
            .collect();

        let label = NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default();

        Ok(MonthView {
            year,
            month,
            label,
            grid,
            weeks: days.chunks(7).map(<[MonthDay]>::to_vec).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekLabel {
    pub text: String,
    pub date: NaiveDate,
    /// Exams are rendered as danger badges.
    pub danger: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearWeek {
    pub week: u8,
    pub week_start: NaiveDate,
    pub is_reading_week: bool,
    pub labels: Vec<WeekLabel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub code: Option<String>,
    pub title: String,
    pub credits: u16,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermOverview {
    pub term: Term,
    pub label: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub modules: Vec<ModuleSummary>,
    pub weeks: Vec<YearWeek>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverview {
    pub academic_year: String,
    pub year_label: String,
    pub terms: Vec<TermOverview>,
}

fn week_label(event: &NormalizedEvent) -> WeekLabel {
    let text = match (&event.module_code, event.kind) {
        (Some(code), EventKind::Exam) => format!("{code} Exam"),
        (Some(code), _) => {
            let what = event
                .module
                .as_deref()
                .and_then(|module| event.title.strip_prefix(module))
                .unwrap_or(&event.title)
                .trim();
            format!("{code} {what}")
        }
        (None, _) => event.title.clone(),
    };
    WeekLabel { text, date: event.date, danger: event.kind == EventKind::Exam }
}

impl YearOverview {
    pub fn build(plan: &AcademicYearPlan) -> Self {
        let calendar = plan.calendar();
        let deadlines: Vec<NormalizedEvent> = plan
            .events_in(&plan.span())
            .into_iter()
            .filter(|e| matches!(e.kind, EventKind::Assessment | EventKind::Exam))
            .collect();

        let terms = [Term::Michaelmas, Term::Epiphany, Term::Easter]
            .into_iter()
            .map(|term| {
                let block = calendar.block(term);
                let modules = if term.has_teaching() {
                    plan.modules_in(term)
                        .map(|m| ModuleSummary { code: m.code.clone(), title: m.title.clone(), credits: m.credits })
                        .collect()
                } else {
                    Vec::new()
                };

                let weeks = block
                    .weeks
                    .iter()
                    .enumerate()
                    .map(|(idx, monday)| {
                        let week = u8::try_from(idx + 1).unwrap_or(u8::MAX);
                        let span = DateRange { start: *monday, end: monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX) };
                        YearWeek {
                            week,
                            week_start: *monday,
                            is_reading_week: calendar
                                .position(*monday)
                                .is_some_and(|p| p.term == term && p.is_reading_week),
                            labels: deadlines.iter().filter(|e| span.contains(e.date)).map(week_label).collect(),
                        }
                    })
                    .collect();

                TermOverview {
                    term,
                    label: term.label(),
                    start: block.start,
                    end: block.end,
                    modules,
                    weeks,
                }
            })
            .collect();

        YearOverview {
            academic_year: plan.academic_year.clone(),
            year_label: plan.year_label.clone(),
            terms,
        }
    }
}
