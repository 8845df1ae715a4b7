pub mod assignment;
pub mod personal_item;
pub mod timetable;

pub use assignment::Assignment;
pub use personal_item::{ItemScope, NewPersonalItem, PersonalItem, PersonalItemPatch, PersonalItemType, Priority};
pub use timetable::{NewTimetableEvent, SessionType, TimetableEvent};
