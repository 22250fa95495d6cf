pub mod error;
pub mod models;
pub mod recurrence;
pub mod week_view;
