use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid time range {start}..{end}: expected 0 <= start < end < 1440")]
    InvalidRange { start: i32, end: i32 },
    #[error("unknown recurrence mode: {0}")]
    UnknownRecurrenceMode(String),
}
