//! Term and teaching-week arithmetic over a plan's term dates.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::plan::{TermBlock, TermDates};

/// Teaching week that is set aside for independent reading.
const READING_WEEK: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Michaelmas,
    Epiphany,
    Easter,
}

impl Term {
    pub fn label(&self) -> &'static str {
        match self {
            Term::Michaelmas => "Michaelmas Term",
            Term::Epiphany => "Epiphany Term",
            Term::Easter => "Easter Term",
        }
    }

    /// Easter is revision and exams only.
    pub fn has_teaching(&self) -> bool {
        !matches!(self, Term::Easter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermPosition {
    pub term: Term,
    pub week: u8,
    pub week_start: NaiveDate,
    pub is_reading_week: bool,
    pub is_exam_period: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermProgress {
    pub term: Term,
    pub current_week: u8,
    pub total_weeks: u8,
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    TermStart,
    TermEnd,
    ExamPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub date: NaiveDate,
    pub title: String,
    pub kind: MilestoneKind,
}

pub struct AcademicCalendar<'a> {
    dates: &'a TermDates,
}

impl<'a> AcademicCalendar<'a> {
    pub fn new(dates: &'a TermDates) -> Self {
        Self { dates }
    }

    fn terms(&self) -> [(Term, &'a TermBlock); 3] {
        [
            (Term::Michaelmas, &self.dates.michaelmas),
            (Term::Epiphany, &self.dates.epiphany),
            (Term::Easter, &self.dates.easter),
        ]
    }

    pub fn block(&self, term: Term) -> &'a TermBlock {
        match term {
            Term::Michaelmas => &self.dates.michaelmas,
            Term::Epiphany => &self.dates.epiphany,
            Term::Easter => &self.dates.easter,
        }
    }

    /// Term whose start..=end window contains `day`.
    pub fn term_of(&self, day: NaiveDate) -> Option<Term> {
        self.terms()
            .into_iter()
            .find(|(_, block)| day >= block.start && day <= block.end)
            .map(|(term, _)| term)
    }

    /// Term and 1-based week number, counted from the plan's week Mondays.
    pub fn position(&self, day: NaiveDate) -> Option<TermPosition> {
        for (term, block) in self.terms() {
            for (idx, monday) in block.weeks.iter().enumerate() {
                if day >= *monday && day < *monday + Days::new(7) {
                    let week = u8::try_from(idx + 1).unwrap_or(u8::MAX);
                    return Some(TermPosition {
                        term,
                        week,
                        week_start: *monday,
                        is_reading_week: term.has_teaching() && week == READING_WEEK,
                        is_exam_period: self.is_exam_period(day),
                    });
                }
            }
        }
        None
    }

    pub fn is_exam_period(&self, day: NaiveDate) -> bool {
        day >= self.dates.exams.start && day <= self.dates.exams.end
    }

    pub fn progress(&self, day: NaiveDate) -> Option<TermProgress> {
        let term = self.term_of(day)?;
        let block = self.block(term);

        let total_days = (block.end - block.start).num_days().max(1) as f64;
        let elapsed = (day - block.start).num_days() as f64;
        let percentage = (elapsed / total_days * 100.0).clamp(0.0, 100.0).round() as u8;

        let current_week = self
            .position(day)
            .filter(|p| p.term == term)
            .map(|p| p.week)
            .unwrap_or(0);

        Some(TermProgress {
            term,
            current_week,
            total_weeks: u8::try_from(block.weeks.len()).unwrap_or(u8::MAX),
            percentage,
        })
    }

    /// Up to three upcoming term boundaries and the exam period start.
    pub fn milestones(&self, day: NaiveDate) -> Vec<Milestone> {
        let mut out = Vec::new();

        if let Some(term) = self.term_of(day) {
            let block = self.block(term);
            if day < block.end {
                out.push(Milestone {
                    date: block.end,
                    title: format!("{} ends", term.label()),
                    kind: MilestoneKind::TermEnd,
                });
            }
        }

        if day < self.dates.exams.start {
            out.push(Milestone {
                date: self.dates.exams.start,
                title: "Exam period begins".to_string(),
                kind: MilestoneKind::ExamPeriod,
            });
        }

        if let Some((term, block)) = self.terms().into_iter().find(|(_, block)| block.start > day) {
            out.push(Milestone {
                date: block.start,
                title: format!("{} begins", term.label()),
                kind: MilestoneKind::TermStart,
            });
        }

        out.sort_by_key(|m| m.date);
        out.truncate(3);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::plan::tests::sample_catalog;
    use crate::calendar::plan::YearKey;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_numbers_follow_plan_mondays() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let cal = AcademicCalendar::new(&plan.term_dates);

        let first = cal.position(d(2025, 10, 6)).unwrap();
        assert_eq!(first.term, Term::Michaelmas);
        assert_eq!(first.week, 1);

        let sunday = cal.position(d(2025, 10, 12)).unwrap();
        assert_eq!(sunday.week, 1);

        let reading = cal.position(d(2025, 11, 12)).unwrap();
        assert_eq!(reading.week, 6);
        assert!(reading.is_reading_week);

        let epiphany = cal.position(d(2026, 1, 20)).unwrap();
        assert_eq!(epiphany.term, Term::Epiphany);
        assert_eq!(epiphany.week, 2);

        assert!(cal.position(d(2025, 12, 25)).is_none());
    }

    #[test]
    fn exam_period_and_progress() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let cal = AcademicCalendar::new(&plan.term_dates);

        assert!(cal.is_exam_period(d(2026, 5, 12)));
        assert!(!cal.is_exam_period(d(2026, 3, 1)));

        let start = cal.progress(d(2025, 10, 6)).unwrap();
        assert_eq!(start.percentage, 0);
        assert_eq!(start.current_week, 1);
        assert_eq!(start.total_weeks, 10);

        let end = cal.progress(d(2025, 12, 12)).unwrap();
        assert_eq!(end.percentage, 100);

        assert!(cal.progress(d(2025, 12, 25)).is_none());
    }

    #[test]
    fn milestones_are_sorted_and_capped() {
        let catalog = sample_catalog();
        let plan = catalog.get(YearKey::Year1).unwrap();
        let cal = AcademicCalendar::new(&plan.term_dates);

        let upcoming = cal.milestones(d(2025, 11, 1));
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].kind, MilestoneKind::TermEnd);
        assert_eq!(upcoming[0].date, d(2025, 12, 12));
        assert_eq!(upcoming[1].title, "Epiphany Term begins");
        assert_eq!(upcoming[2].kind, MilestoneKind::ExamPeriod);
        assert!(upcoming.windows(2).all(|w| w[0].date <= w[1].date));
    }
}
