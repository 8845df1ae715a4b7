//! Property tests over the calendar core: normalization, ordering, layer
//! toggling and plan overrides. Everything here is pure; no database.

use caseway_planner::calendar::aggregate::{group_by_day, merge, sort_by_start, LayerSet};
use caseway_planner::calendar::normalize::split_module_code;
use caseway_planner::calendar::overrides::{apply_override, new_override, resolve, revert, OverrideFields};
use caseway_planner::calendar::{DateRange, Layer, Normalize, NormalizedEvent, PlanCatalog, YearKey};
use caseway_planner::models::{PersonalItem, PersonalItemType, Priority};
use chrono::{Days, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

fn catalog() -> PlanCatalog {
    PlanCatalog::from_json(include_str!("../data/plans/durham_llb_2025_26.json")).expect("bundled catalog")
}

fn term_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 29).unwrap()
}

fn personal_item(day: u64, minute_of_day: u32, all_day: bool, title: String) -> PersonalItem {
    let date = term_start() + Days::new(day);
    let start = Utc.from_utc_datetime(&date.and_hms_opt(minute_of_day / 60, minute_of_day % 60, 0).unwrap());
    PersonalItem {
        id: Uuid::new_v4(),
        user_id: Uuid::nil(),
        title,
        item_type: PersonalItemType::Study,
        start_at: start,
        end_at: None,
        is_all_day: all_day,
        priority: Priority::Medium,
        notes: None,
        completed: false,
        original_plan_id: None,
        tutor: None,
        venue: None,
        is_cancelled: false,
        created_at: start,
        updated_at: start,
    }
}

prop_compose! {
    fn arb_item()(day in 0u64..60, minute in 0u32..1440, all_day in any::<bool>(), title in "[A-Za-z ]{1,30}") -> PersonalItem {
        personal_item(day, minute, all_day, title)
    }
}

fn arb_layers() -> impl Strategy<Value = LayerSet> {
    proptest::sample::subsequence(Layer::ALL.to_vec(), 0..=4)
        .prop_map(|layers| layers.into_iter().fold(LayerSet::none(), LayerSet::with))
}

/// Plan events of the first half of Michaelmas plus a few personal items.
fn mixed_events(items: &[PersonalItem]) -> Vec<NormalizedEvent> {
    let catalog = catalog();
    let plan = catalog.get(YearKey::Year1).unwrap();
    let range = DateRange::new(term_start(), term_start() + Days::new(59)).unwrap();
    merge([plan.events_in(&range), items.iter().map(Normalize::normalize).collect()])
}

#[test]
fn proptest_one_event_per_record() {
    proptest!(|(items in proptest::collection::vec(arb_item(), 0..40))| {
        let events: Vec<NormalizedEvent> = items.iter().map(Normalize::normalize).collect();
        prop_assert_eq!(events.len(), items.len());
        for (item, event) in items.iter().zip(&events) {
            prop_assert_eq!(event.date, item.start_at.date_naive());
            prop_assert_eq!(event.all_day, item.is_all_day);
            prop_assert_eq!(event.start.is_none(), item.is_all_day);
        }
    });
}

#[test]
fn proptest_sort_is_idempotent() {
    proptest!(|(items in proptest::collection::vec(arb_item(), 0..40))| {
        let mut once: Vec<NormalizedEvent> = items.iter().map(Normalize::normalize).collect();
        sort_by_start(&mut once);
        let mut twice = once.clone();
        sort_by_start(&mut twice);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.windows(2).all(|w| w[0].start <= w[1].start));
    });
}

#[test]
fn proptest_merge_is_ordered_and_unique() {
    proptest!(ProptestConfig::with_cases(32), |(items in proptest::collection::vec(arb_item(), 0..20))| {
        let events = mixed_events(&items);
        prop_assert!(events.windows(2).all(|w| (w[0].date, w[0].start) <= (w[1].date, w[1].start)));

        // feeding the same source twice changes nothing
        let doubled = merge([events.clone(), events.clone()]);
        prop_assert_eq!(doubled, events);
    });
}

#[test]
fn proptest_layer_toggle_is_pure() {
    proptest!(ProptestConfig::with_cases(32), |(
        items in proptest::collection::vec(arb_item(), 0..20),
        layers in arb_layers(),
        layer in proptest::sample::select(Layer::ALL.to_vec()),
    )| {
        let events = mixed_events(&items);
        let before = events.clone();
        let range = DateRange::new(term_start(), term_start() + Days::new(59)).unwrap();

        let shown = group_by_day(&events, &range, &layers);
        let restored = layers.clone().toggle(layer).toggle(layer);
        prop_assert_eq!(&restored, &layers);
        prop_assert_eq!(group_by_day(&events, &range, &restored), shown);
        prop_assert_eq!(events, before);
    });
}

#[test]
fn proptest_override_round_trip() {
    let catalog = catalog();
    let plan = catalog.get(YearKey::Year1).unwrap();
    let range = DateRange::new(term_start(), term_start() + Days::new(120)).unwrap();
    let plan_events = plan.events_in(&range);

    proptest!(|(
        idx in 0..plan_events.len(),
        title in "[A-Za-z ]{0,40}",
        tutor in proptest::option::of("[A-Za-z ]{1,20}"),
        cancelled in any::<bool>(),
    )| {
        let original = plan_events[idx].clone();
        let fields = OverrideFields { title, tutor, venue: None, notes: None, is_cancelled: cancelled };
        let row = new_override(&original, &fields);
        let mut item = personal_item(0, 0, true, row.title.clone());
        item.original_plan_id = row.original_plan_id.clone();
        item.tutor = row.tutor.clone();
        item.is_cancelled = row.is_cancelled;

        let shown = apply_override(original.clone(), &item);
        prop_assert_eq!(&shown.id, &original.id);
        prop_assert_eq!(shown.date, original.date);
        prop_assert_eq!(revert(shown), original.clone());

        let resolved = resolve(vec![original.clone()], std::slice::from_ref(&item));
        prop_assert_eq!(resolved.len(), 1);
        prop_assert_eq!(&resolved[0].id, &original.id);
    });
}

#[test]
fn module_codes_split_from_titles() {
    assert_eq!(
        split_module_code("LAW1091 - UK Constitutional Law"),
        (Some("LAW1091".to_string()), "UK Constitutional Law".to_string())
    );
    assert_eq!(split_module_code("General Seminar"), (None, "General Seminar".to_string()));
}

#[test]
fn plan_weeks_follow_catalog_mondays() {
    let catalog = catalog();
    let plan = catalog.get(YearKey::Year1).unwrap();
    let calendar = plan.calendar();
    for (idx, monday) in plan.term_dates.michaelmas.weeks.iter().enumerate() {
        let position = calendar.position(*monday + Days::new(3)).unwrap();
        assert_eq!(usize::from(position.week), idx + 1);
        assert_eq!(position.week_start, *monday);
    }
}
