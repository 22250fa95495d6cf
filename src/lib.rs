//! Resolves which recurring day template is in effect on a calendar date.
//!
//! The `domain` layer is pure: [`RecurrenceRule`] decides whether a template
//! occurs on a date, [`DayTemplate`] owns a day's [`ActivityBlock`]s, and
//! [`WeekView`] arbitrates between candidates so each date resolves to at most
//! one template. `infrastructure` and `application` load templates from
//! storage and serve day and week queries through [`Planner`].

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::planner::{BlockDraft, BlockView, DaySchedule, Planner, TemplateDraft};
pub use domain::error::DomainError;
pub use domain::models::{ActivityBlock, DayTemplate, Note};
pub use domain::recurrence::{RecurrenceMode, RecurrenceRule};
pub use domain::week_view::{WeekResolution, WeekView};
pub use infrastructure::error::InfraError;
