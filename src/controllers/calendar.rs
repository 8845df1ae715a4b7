use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
    routing::get,
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calendar::aggregate::filter_layers;
use crate::calendar::normalize::{presentation_type, PresentationType};
use crate::calendar::term::{Milestone, Term, TermPosition, TermProgress};
use crate::calendar::views::{MonthView, WeekView, YearOverview};
use crate::calendar::{group_by_day, DateRange, NormalizedEvent, YearKey};
use crate::controllers::{cached_json, parse_layers, response_cache};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::CalendarService;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/calendar/events", get(list_events))
        .route("/calendar/days", get(list_days))
        .route("/calendar/week", get(week_view))
        .route("/calendar/month", get(month_view))
        .route("/calendar/year", get(year_view))
        .route("/calendar/term", get(term_summary))
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub year: Option<YearKey>,
    pub layers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeekParams {
    pub date: Option<NaiveDate>,
    pub year: Option<YearKey>,
    pub layers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthParams {
    pub year: i32,
    pub month: u32,
    pub plan: Option<YearKey>,
    pub layers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlanParams {
    pub date: Option<NaiveDate>,
    pub plan: Option<YearKey>,
}

/// Normalized request, used as the response cache key.
#[derive(Debug, Serialize)]
struct ViewKey {
    from: NaiveDate,
    to: NaiveDate,
    year: YearKey,
    layers: String,
}

#[derive(Debug, Serialize)]
struct PlanKey {
    plan: YearKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub year: YearKey,
    pub layers: String,
    pub count: usize,
    pub events: Vec<EventCard>,
}

/// An event plus the card style the client renders it with.
#[derive(Debug, Serialize)]
pub struct EventCard {
    #[serde(flatten)]
    pub event: NormalizedEvent,
    pub presentation: PresentationType,
}

impl From<&NormalizedEvent> for EventCard {
    fn from(event: &NormalizedEvent) -> Self {
        EventCard { presentation: presentation_type(event), event: event.clone() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSummary {
    pub date: NaiveDate,
    pub term: Option<Term>,
    pub position: Option<TermPosition>,
    pub progress: Option<TermProgress>,
    pub is_exam_period: bool,
    pub milestones: Vec<Milestone>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// GET /api/calendar/events
async fn list_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let range = DateRange::new(params.from, params.to)?;
    let layers = parse_layers(params.layers.as_deref())?;
    let year = params.year.unwrap_or(state.config.calendar.default_year);
    let key = ViewKey { from: range.start, to: range.end, year, layers: layers.to_query() };

    cached_json(response_cache(&state), user.user_id, "events", &key, || async {
        let events = CalendarService::new(&state.db, &state.plans)
            .load_events(user.user_id, &range, year)
            .await?;
        let visible: Vec<EventCard> = filter_layers(&events, &layers).into_iter().map(EventCard::from).collect();

        Ok::<_, ApiError>(EventsResponse {
            from: range.start,
            to: range.end,
            year,
            layers: layers.to_query(),
            count: visible.len(),
            events: visible,
        })
    })
    .await
}

// GET /api/calendar/days
async fn list_days(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let range = DateRange::new(params.from, params.to)?;
    let layers = parse_layers(params.layers.as_deref())?;
    let year = params.year.unwrap_or(state.config.calendar.default_year);
    let key = ViewKey { from: range.start, to: range.end, year, layers: layers.to_query() };

    cached_json(response_cache(&state), user.user_id, "days", &key, || async {
        let events = CalendarService::new(&state.db, &state.plans)
            .load_events(user.user_id, &range, year)
            .await?;
        Ok::<_, ApiError>(group_by_day(&events, &range, &layers))
    })
    .await
}

// GET /api/calendar/week
async fn week_view(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<WeekParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let range = DateRange::week_of(params.date.unwrap_or_else(today))?;
    let layers = parse_layers(params.layers.as_deref())?;
    let year = params.year.unwrap_or(state.config.calendar.default_year);
    let key = ViewKey { from: range.start, to: range.end, year, layers: layers.to_query() };

    cached_json(response_cache(&state), user.user_id, "week", &key, || async {
        let service = CalendarService::new(&state.db, &state.plans);
        let events = service.load_events(user.user_id, &range, year).await?;
        Ok::<_, ApiError>(WeekView::build(range.start, &events, Some(service.plan(year)?), &layers)?)
    })
    .await
}

// GET /api/calendar/month
async fn month_view(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<MonthParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let grid = MonthView::grid_range(params.year, params.month)?;
    let layers = parse_layers(params.layers.as_deref())?;
    let year = params.plan.unwrap_or(state.config.calendar.default_year);
    let key = ViewKey { from: grid.start, to: grid.end, year, layers: layers.to_query() };

    cached_json(response_cache(&state), user.user_id, "month", &key, || async {
        let events = CalendarService::new(&state.db, &state.plans)
            .load_events(user.user_id, &grid, year)
            .await?;
        Ok::<_, ApiError>(MonthView::build(params.year, params.month, &events, &layers)?)
    })
    .await
}

// GET /api/calendar/year
async fn year_view(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    params: Result<Query<PlanParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let year = params.plan.unwrap_or(state.config.calendar.default_year);

    cached_json(response_cache(&state), user.user_id, "year", &PlanKey { plan: year }, || async {
        let plan = CalendarService::new(&state.db, &state.plans).plan(year)?;
        Ok::<_, ApiError>(YearOverview::build(plan))
    })
    .await
}

// GET /api/calendar/term
async fn term_summary(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    params: Result<Query<PlanParams>, QueryRejection>,
) -> Result<axum::Json<TermSummary>, ApiError> {
    let Query(params) = params?;
    let year = params.plan.unwrap_or(state.config.calendar.default_year);
    let date = params.date.unwrap_or_else(today);
    let calendar = CalendarService::new(&state.db, &state.plans).plan(year)?.calendar();

    Ok(axum::Json(TermSummary {
        date,
        term: calendar.term_of(date),
        position: calendar.position(date),
        progress: calendar.progress(date),
        is_exam_period: calendar.is_exam_period(date),
        milestones: calendar.milestones(date),
    }))
}
