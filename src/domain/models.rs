use crate::domain::error::DomainError;
use crate::domain::recurrence::RecurrenceRule;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MINUTES_PER_DAY: i32 = 24 * 60;
pub const DEFAULT_BLOCK_COLOR: u32 = 0xFF21_96F3;
pub const DEFAULT_NOTE_TITLE: &str = "Note";
pub const DEFAULT_ACTIVE_HOURS: (i32, i32) = (8, 22);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub title: String,
    pub body: String,
}

impl Default for Note {
    fn default() -> Self {
        Self {
            title: DEFAULT_NOTE_TITLE.to_string(),
            body: String::new(),
        }
    }
}

impl Note {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\n{}", self.title, self.body)
    }
}

/// One time-ranged entry of a day template, in minutes since midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawActivityBlock")]
pub struct ActivityBlock {
    start_minute: i32,
    end_minute: i32,
    pub label: String,
    pub note: Note,
    pub color: u32,
    pub is_override: bool,
}

impl ActivityBlock {
    pub fn new(start_minute: i32, end_minute: i32, label: impl Into<String>) -> Result<Self, DomainError> {
        Self::with_details(
            start_minute,
            end_minute,
            label,
            Note::default(),
            DEFAULT_BLOCK_COLOR,
            false,
        )
    }

    pub fn with_details(
        start_minute: i32,
        end_minute: i32,
        label: impl Into<String>,
        note: Note,
        color: u32,
        is_override: bool,
    ) -> Result<Self, DomainError> {
        validate_range(start_minute, end_minute)?;
        Ok(Self {
            start_minute,
            end_minute,
            label: label.into(),
            note,
            color,
            is_override,
        })
    }

    pub fn start_minute(&self) -> i32 {
        self.start_minute
    }

    pub fn end_minute(&self) -> i32 {
        self.end_minute
    }

    pub fn set_start(&mut self, start_minute: i32) -> Result<(), DomainError> {
        validate_range(start_minute, self.end_minute)?;
        self.start_minute = start_minute;
        Ok(())
    }

    pub fn set_end(&mut self, end_minute: i32) -> Result<(), DomainError> {
        validate_range(self.start_minute, end_minute)?;
        self.end_minute = end_minute;
        Ok(())
    }

    pub fn duration_minutes(&self) -> i32 {
        self.end_minute - self.start_minute
    }

    pub fn overlaps(&self, other: &ActivityBlock) -> bool {
        self.start_minute < other.end_minute && other.start_minute < self.end_minute
    }

    /// Same start, end and label. Notes, colours and flags are not compared.
    pub fn is_same_entry(&self, other: &ActivityBlock) -> bool {
        self.start_minute == other.start_minute
            && self.end_minute == other.end_minute
            && self.label == other.label
    }
}

#[derive(Deserialize)]
struct RawActivityBlock {
    start_minute: i32,
    end_minute: i32,
    #[serde(default)]
    label: String,
    #[serde(default)]
    note: Note,
    #[serde(default = "default_block_color")]
    color: u32,
    #[serde(default)]
    is_override: bool,
}

fn default_block_color() -> u32 {
    DEFAULT_BLOCK_COLOR
}

impl TryFrom<RawActivityBlock> for ActivityBlock {
    type Error = DomainError;

    fn try_from(raw: RawActivityBlock) -> Result<Self, Self::Error> {
        Self::with_details(
            raw.start_minute,
            raw.end_minute,
            raw.label,
            raw.note,
            raw.color,
            raw.is_override,
        )
    }
}

impl fmt::Display for ActivityBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.label.is_empty() {
            write!(f, "{} ", self.label)?;
        }
        write!(
            f,
            "{}-{}",
            format_minute(self.start_minute),
            format_minute(self.end_minute)
        )?;
        if self.is_override {
            f.write_str(" (override)")?;
        }
        Ok(())
    }
}

/// A reusable description of one day's schedule and the rule deciding which
/// dates it applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayTemplate {
    id: Option<i64>,
    origin_date: NaiveDate,
    weekday: Weekday,
    active_start_hour: i32,
    active_end_hour: i32,
    is_temporary: bool,
    recurrence: RecurrenceRule,
    blocks: Vec<ActivityBlock>,
}

impl DayTemplate {
    pub fn new(origin_date: NaiveDate) -> Self {
        Self::with_rule(origin_date, false, RecurrenceRule::default())
    }

    pub fn with_rule(origin_date: NaiveDate, is_temporary: bool, recurrence: RecurrenceRule) -> Self {
        Self {
            id: None,
            origin_date,
            weekday: origin_date.weekday(),
            active_start_hour: DEFAULT_ACTIVE_HOURS.0,
            active_end_hour: DEFAULT_ACTIVE_HOURS.1,
            is_temporary,
            recurrence,
            blocks: Vec::new(),
        }
    }

    /// A one-off override that only applies on `origin_date`.
    pub fn temporary(origin_date: NaiveDate) -> Self {
        Self::with_rule(origin_date, true, RecurrenceRule::once())
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    pub fn origin_date(&self) -> NaiveDate {
        self.origin_date
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn active_hours(&self) -> (i32, i32) {
        (self.active_start_hour, self.active_end_hour)
    }

    pub fn set_active_hours(&mut self, start_hour: i32, end_hour: i32) -> bool {
        if start_hour < 0 || end_hour > 24 || start_hour >= end_hour {
            return false;
        }
        self.active_start_hour = start_hour;
        self.active_end_hour = end_hour;
        true
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }

    pub fn set_temporary(&mut self, is_temporary: bool) {
        self.is_temporary = is_temporary;
    }

    pub fn recurrence(&self) -> &RecurrenceRule {
        &self.recurrence
    }

    pub fn set_recurrence(&mut self, recurrence: RecurrenceRule) {
        self.recurrence = recurrence;
    }

    pub fn blocks(&self) -> &[ActivityBlock] {
        &self.blocks
    }

    pub fn add_block(&mut self, block: ActivityBlock) {
        self.blocks.push(block);
        self.blocks.sort_by_key(ActivityBlock::start_minute);
    }

    pub fn remove_block(&mut self, block: &ActivityBlock) -> bool {
        let Some(position) = self
            .blocks
            .iter()
            .position(|candidate| candidate.is_same_entry(block))
        else {
            return false;
        };
        self.blocks.remove(position);
        true
    }

    /// Temporary status short-circuits the recurrence rule on the origin date.
    pub fn appears_on(&self, target_date: NaiveDate) -> bool {
        if self.is_temporary && target_date == self.origin_date {
            return true;
        }
        self.recurrence.occurs_on(self.origin_date, target_date)
    }

    /// Regular blocks first, override blocks last, each in start order.
    pub fn paint_order(&self) -> Vec<&ActivityBlock> {
        let (overrides, regular): (Vec<&ActivityBlock>, Vec<&ActivityBlock>) =
            self.blocks.iter().partition(|block| block.is_override);
        regular.into_iter().chain(overrides).collect()
    }
}

pub fn format_minute(minute: i32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn validate_range(start_minute: i32, end_minute: i32) -> Result<(), DomainError> {
    let in_day = |minute: i32| (0..MINUTES_PER_DAY).contains(&minute);
    if !in_day(start_minute) || !in_day(end_minute) || start_minute >= end_minute {
        return Err(DomainError::InvalidRange {
            start: start_minute,
            end: end_minute,
        });
    }
    Ok(())
}
