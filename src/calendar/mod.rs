//! Calendar core: normalization of every source into one event shape, plan
//! expansion, override resolution, aggregation and the screen read models.
//! Nothing in here touches the database or the network.

pub mod aggregate;
pub mod event;
pub mod normalize;
pub mod overrides;
pub mod plan;
pub mod range;
pub mod term;
pub mod views;

pub use aggregate::{group_by_day, merge, sort_by_start, DayBucket, LayerSet};
pub use event::{EventKind, EventMeta, Layer, NormalizedEvent, Source, UnknownLayer};
pub use normalize::Normalize;
pub use plan::{AcademicYearPlan, PlanCatalog, PlanError, YearKey};
pub use range::{DateRange, RangeError, MAX_RANGE_DAYS};
pub use term::{AcademicCalendar, Term};
