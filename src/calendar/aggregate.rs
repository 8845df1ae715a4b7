//! Merging, layer filtering and per-day grouping of normalized events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

use crate::calendar::event::{Layer, NormalizedEvent, Source, UnknownLayer};
use crate::calendar::range::DateRange;

/// Set of visible layers. Toggling only changes the set, never the events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSet(BTreeSet<Layer>);

impl Default for LayerSet {
    fn default() -> Self {
        Self::all()
    }
}

impl LayerSet {
    pub fn all() -> Self {
        LayerSet(Layer::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        LayerSet(BTreeSet::new())
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0.contains(&layer)
    }

    pub fn with(mut self, layer: Layer) -> Self {
        self.0.insert(layer);
        self
    }

    pub fn without(mut self, layer: Layer) -> Self {
        self.0.remove(&layer);
        self
    }

    pub fn toggle(self, layer: Layer) -> Self {
        if self.contains(layer) {
            self.without(layer)
        } else {
            self.with(layer)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        self.0.iter().copied()
    }

    /// Canonical comma list, e.g. `plan,personal`.
    pub fn to_query(&self) -> String {
        self.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(",")
    }
}

impl FromStr for LayerSet {
    type Err = UnknownLayer;

    /// Parses `plan,personal`. An empty string selects nothing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Layer::from_str)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(LayerSet)
    }
}

/// Events whose layer is enabled, in input order.
pub fn filter_layers<'a>(events: &'a [NormalizedEvent], layers: &LayerSet) -> Vec<&'a NormalizedEvent> {
    events.iter().filter(|e| layers.contains(e.layer())).collect()
}

/// Stable sort by start time. Untimed events sort before timed ones and keep
/// their relative order.
pub fn sort_by_start(events: &mut [NormalizedEvent]) {
    events.sort_by(|a, b| a.start.cmp(&b.start));
}

/// Combines event lists from several sources into one timeline ordered by
/// date, then start time. Repeats of the same `(source, id, date)` are dropped.
pub fn merge<I>(sources: I) -> Vec<NormalizedEvent>
where
    I: IntoIterator<Item = Vec<NormalizedEvent>>,
{
    let mut seen: HashSet<(Source, String, NaiveDate)> = HashSet::new();
    let mut merged: Vec<NormalizedEvent> = sources
        .into_iter()
        .flatten()
        .filter(|e| seen.insert((e.source(), e.id.clone(), e.date)))
        .collect();

    merged.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.start.cmp(&b.start)));
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub date: NaiveDate,
    pub all_day: Vec<NormalizedEvent>,
    pub timed: Vec<NormalizedEvent>,
}

impl DayBucket {
    pub fn empty(date: NaiveDate) -> Self {
        Self { date, all_day: Vec::new(), timed: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.all_day.len() + self.timed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One bucket per day of `range`, empty days included. Only events on
/// enabled layers are placed; timed events are sorted by start within a day.
pub fn group_by_day(events: &[NormalizedEvent], range: &DateRange, layers: &LayerSet) -> Vec<DayBucket> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = range.days().map(|d| (d, DayBucket::empty(d))).collect();

    for event in filter_layers(events, layers) {
        let Some(bucket) = days.get_mut(&event.date) else {
            continue;
        };
        if event.is_timed() {
            bucket.timed.push(event.clone());
        } else {
            bucket.all_day.push(event.clone());
        }
    }

    days.into_values()
        .map(|mut bucket| {
            sort_by_start(&mut bucket.timed);
            bucket
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::event::{EventKind, EventMeta};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    fn event(id: &str, day: u32, start: Option<(u32, u32)>, meta: EventMeta) -> NormalizedEvent {
        NormalizedEvent {
            id: id.to_string(),
            title: id.to_string(),
            date: d(day),
            start: start.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            end: None,
            all_day: start.is_none(),
            kind: EventKind::Other,
            module_code: None,
            module: None,
            window: None,
            meta,
        }
    }

    fn plan() -> EventMeta {
        EventMeta::Plan { term: None, week: None }
    }

    fn personal() -> EventMeta {
        EventMeta::Personal {
            personal_item_id: Uuid::nil(),
            item_type: crate::models::PersonalItemType::Task,
            priority: crate::models::Priority::Low,
            completed: false,
            notes: None,
        }
    }

    #[test]
    fn layer_set_parsing_and_toggling() {
        let layers: LayerSet = "plan, personal".parse().unwrap();
        assert!(layers.contains(Layer::Plan));
        assert!(!layers.contains(Layer::Timetable));
        assert_eq!(layers.to_query(), "plan,personal");
        assert_eq!("".parse::<LayerSet>().unwrap(), LayerSet::none());
        assert!("plan,ics".parse::<LayerSet>().is_err());

        let toggled = LayerSet::all().toggle(Layer::Personal);
        assert!(!toggled.contains(Layer::Personal));
        assert_eq!(toggled.toggle(Layer::Personal), LayerSet::all());
    }

    #[test]
    fn groups_every_day_and_sorts_timed_events() {
        let events = vec![
            event("late", 6, Some((15, 0)), personal()),
            event("topic", 6, None, plan()),
            event("early", 6, Some((9, 30)), personal()),
            event("next", 8, Some((11, 0)), personal()),
            event("outside", 20, None, plan()),
        ];
        let week = DateRange::week_of(d(6)).unwrap();
        let days = group_by_day(&events, &week, &LayerSet::all());

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, d(6));
        assert_eq!(days[0].all_day.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["topic"]);
        assert_eq!(days[0].timed.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["early", "late"]);
        assert!(days[1].is_empty());
        assert_eq!(days[2].len(), 1);
        assert_eq!(days.iter().map(DayBucket::len).sum::<usize>(), 4);
    }

    #[test]
    fn hidden_layers_are_left_out() {
        let events = vec![event("topic", 6, None, plan()), event("gym", 6, Some((7, 0)), personal())];
        let week = DateRange::week_of(d(6)).unwrap();

        let plan_only = group_by_day(&events, &week, &LayerSet::none().with(Layer::Plan));
        assert_eq!(plan_only[0].len(), 1);
        assert_eq!(plan_only[0].all_day[0].id, "topic");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn merge_dedupes_and_orders() {
        let merged = merge([
            vec![event("b", 7, Some((12, 0)), personal()), event("a", 6, None, plan())],
            vec![event("b", 7, Some((12, 0)), personal()), event("c", 7, Some((8, 0)), personal())],
            // same id, different source: kept
            vec![event("b", 7, None, plan())],
        ]);
        let order: Vec<_> = merged.iter().map(|e| (e.id.as_str(), e.source())).collect();
        assert_eq!(
            order,
            [
                ("a", Source::Plan),
                ("b", Source::Plan),
                ("c", Source::Personal),
                ("b", Source::Personal)
            ]
        );
    }
}
