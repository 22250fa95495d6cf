use crate::domain::models::{ActivityBlock, DayTemplate, Note};
use crate::domain::recurrence::{RecurrenceMode, RecurrenceRule};
use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Flat storage row for a day template; recurrence fields are inlined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateRecord {
    pub id: Option<i64>,
    pub origin_date: NaiveDate,
    pub is_temporary: bool,
    pub active_start_hour: i32,
    pub active_end_hour: i32,
    pub recurrence_mode: RecurrenceMode,
    pub interval: i32,
    pub occurrence_limit: i32,
    pub recurrence_start_date: Option<NaiveDate>,
    pub recurrence_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRecord {
    pub start_minute: i32,
    pub end_minute: i32,
    pub label: String,
    pub note_title: String,
    pub note_body: String,
    pub color: u32,
    pub is_override: bool,
}

/// A template row together with the block rows that reference it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredTemplate {
    pub template: TemplateRecord,
    pub blocks: Vec<BlockRecord>,
}

impl TemplateRecord {
    pub fn from_template(template: &DayTemplate) -> Self {
        let (active_start_hour, active_end_hour) = template.active_hours();
        let rule = template.recurrence();
        Self {
            id: template.id(),
            origin_date: template.origin_date(),
            is_temporary: template.is_temporary(),
            active_start_hour,
            active_end_hour,
            recurrence_mode: rule.mode(),
            interval: rule.interval(),
            occurrence_limit: rule.occurrence_limit(),
            recurrence_start_date: rule.start_date(),
            recurrence_end_date: rule.end_date(),
        }
    }

    pub fn recurrence_rule(&self) -> RecurrenceRule {
        RecurrenceRule::new(
            self.recurrence_mode,
            self.interval,
            self.occurrence_limit,
            self.recurrence_start_date,
            self.recurrence_end_date,
        )
    }
}

impl BlockRecord {
    pub fn from_block(block: &ActivityBlock) -> Self {
        Self {
            start_minute: block.start_minute(),
            end_minute: block.end_minute(),
            label: block.label.clone(),
            note_title: block.note.title.clone(),
            note_body: block.note.body.clone(),
            color: block.color,
            is_override: block.is_override,
        }
    }

    pub fn to_block(&self) -> Result<ActivityBlock, InfraError> {
        Ok(ActivityBlock::with_details(
            self.start_minute,
            self.end_minute,
            self.label.clone(),
            Note::new(self.note_title.clone(), self.note_body.clone()),
            self.color,
            self.is_override,
        )?)
    }
}

impl StoredTemplate {
    pub fn from_template(template: &DayTemplate) -> Self {
        Self {
            template: TemplateRecord::from_template(template),
            blocks: template.blocks().iter().map(BlockRecord::from_block).collect(),
        }
    }

    /// Assembles the domain template. Out-of-range active hours fall back to
    /// the defaults; an invalid block rejects the whole template.
    pub fn to_template(&self) -> Result<DayTemplate, InfraError> {
        let record = &self.template;
        let mut template =
            DayTemplate::with_rule(record.origin_date, record.is_temporary, record.recurrence_rule());
        template.set_id(record.id);
        if !template.set_active_hours(record.active_start_hour, record.active_end_hour) {
            tracing::warn!(
                template_id = ?record.id,
                start = record.active_start_hour,
                end = record.active_end_hour,
                "ignoring invalid active hours"
            );
        }
        for block in &self.blocks {
            template.add_block(block.to_block()?);
        }
        Ok(template)
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidRecord(format!("{field_name} must be YYYY-MM-DD, got '{value}': {error}"))
    })
}
