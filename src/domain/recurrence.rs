use crate::domain::error::DomainError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    #[default]
    None,
    EveryNDays,
    EveryNWeeks,
}

impl RecurrenceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::EveryNDays => "every_n_days",
            Self::EveryNWeeks => "every_n_weeks",
        }
    }
}

impl fmt::Display for RecurrenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "every_n_days" => Ok(Self::EveryNDays),
            "every_n_weeks" => Ok(Self::EveryNWeeks),
            other => Err(DomainError::UnknownRecurrenceMode(other.to_string())),
        }
    }
}

/// How often, and until when, a day template repeats.
///
/// `start_date` overrides the owning template's creation date as the anchor.
/// `end_date` is an inclusive ceiling and `occurrence_limit` a count ceiling;
/// both are checked, so whichever is stricter wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawRecurrenceRule")]
pub struct RecurrenceRule {
    mode: RecurrenceMode,
    interval: i32,
    occurrence_limit: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

/// Wire shape of a rule; converted through `RecurrenceRule::new` so the
/// interval clamp also applies to deserialized values.
#[derive(Deserialize)]
struct RawRecurrenceRule {
    #[serde(default)]
    mode: RecurrenceMode,
    #[serde(default)]
    interval: i32,
    #[serde(default)]
    occurrence_limit: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl From<RawRecurrenceRule> for RecurrenceRule {
    fn from(raw: RawRecurrenceRule) -> Self {
        Self::new(
            raw.mode,
            raw.interval,
            raw.occurrence_limit,
            raw.start_date,
            raw.end_date,
        )
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::once()
    }
}

impl RecurrenceRule {
    pub fn new(
        mode: RecurrenceMode,
        interval: i32,
        occurrence_limit: i32,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            mode,
            interval: interval.max(1),
            occurrence_limit,
            start_date,
            end_date,
        }
    }

    pub fn once() -> Self {
        Self::new(RecurrenceMode::None, 1, 0, None, None)
    }

    pub fn every_n_days(interval: i32) -> Self {
        Self::new(RecurrenceMode::EveryNDays, interval, 0, None, None)
    }

    pub fn every_n_weeks(interval: i32) -> Self {
        Self::new(RecurrenceMode::EveryNWeeks, interval, 0, None, None)
    }

    pub fn with_occurrence_limit(mut self, occurrence_limit: i32) -> Self {
        self.occurrence_limit = occurrence_limit;
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn mode(&self) -> RecurrenceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RecurrenceMode) {
        self.mode = mode;
    }

    pub fn interval(&self) -> i32 {
        self.interval
    }

    pub fn set_interval(&mut self, interval: i32) {
        self.interval = interval.max(1);
    }

    pub fn occurrence_limit(&self) -> i32 {
        self.occurrence_limit
    }

    pub fn set_occurrence_limit(&mut self, occurrence_limit: i32) {
        self.occurrence_limit = occurrence_limit;
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn set_start_date(&mut self, start_date: Option<NaiveDate>) {
        self.start_date = start_date;
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn set_end_date(&mut self, end_date: Option<NaiveDate>) {
        self.end_date = end_date;
    }

    /// Returns whether a template created on `origin_date` occurs on `target_date`.
    ///
    /// A missing date on either side is simply a non-match.
    pub fn occurs_on(
        &self,
        origin_date: impl Into<Option<NaiveDate>>,
        target_date: impl Into<Option<NaiveDate>>,
    ) -> bool {
        let (Some(origin_date), Some(target_date)) = (origin_date.into(), target_date.into())
        else {
            return false;
        };

        let anchor = self.start_date.unwrap_or(origin_date);
        if target_date < anchor {
            return false;
        }
        if self.end_date.is_some_and(|end_date| target_date > end_date) {
            return false;
        }

        let days = (target_date - anchor).num_days();
        let interval = i64::from(self.interval);
        match self.mode {
            RecurrenceMode::None => target_date == anchor,
            RecurrenceMode::EveryNDays => {
                days % interval == 0 && self.within_limit(days / interval)
            }
            RecurrenceMode::EveryNWeeks => {
                if target_date.weekday() != anchor.weekday() {
                    return false;
                }
                let weeks = days / 7;
                weeks % interval == 0 && self.within_limit(weeks / interval)
            }
        }
    }

    fn within_limit(&self, occurrence_index: i64) -> bool {
        self.occurrence_limit <= 0 || occurrence_index < i64::from(self.occurrence_limit)
    }
}
