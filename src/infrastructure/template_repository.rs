use crate::infrastructure::error::InfraError;
use crate::infrastructure::records::{BlockRecord, StoredTemplate, TemplateRecord, format_date, parse_date};
use crate::infrastructure::storage::open_connection;
use rusqlite::{Connection, Row, params};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Rows returned by `TemplateRepository::list_all`. A row that cannot be
/// decoded lands in `rejected` instead of failing the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateListing {
    pub templates: Vec<StoredTemplate>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub template_id: i64,
    pub reason: String,
}

/// Storage collaborator for day templates. Implementations return rows in
/// insertion (id) order, which is the tie-break order of resolution.
pub trait TemplateRepository: Send + Sync {
    fn list_all(&self) -> Result<TemplateListing, InfraError>;
    /// Inserts when `template.id` is `None`, otherwise replaces that row and
    /// all of its blocks. Returns the row id.
    fn save(&self, stored: &StoredTemplate) -> Result<i64, InfraError>;
    fn remove(&self, template_id: i64) -> Result<bool, InfraError>;
    fn clear(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTemplateRepository {
    db_path: PathBuf,
}

impl SqliteTemplateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }
}

fn read_template_row(row: &Row<'_>) -> rusqlite::Result<RawTemplateRow> {
    Ok(RawTemplateRow {
        id: row.get(0)?,
        origin_date: row.get(1)?,
        is_temporary: row.get(2)?,
        active_start_hour: row.get(3)?,
        active_end_hour: row.get(4)?,
        recurrence_mode: row.get(5)?,
        interval: row.get(6)?,
        occurrence_limit: row.get(7)?,
        recurrence_start_date: row.get(8)?,
        recurrence_end_date: row.get(9)?,
    })
}

struct RawTemplateRow {
    id: i64,
    origin_date: String,
    is_temporary: bool,
    active_start_hour: i32,
    active_end_hour: i32,
    recurrence_mode: String,
    interval: i32,
    occurrence_limit: i32,
    recurrence_start_date: Option<String>,
    recurrence_end_date: Option<String>,
}

impl RawTemplateRow {
    fn into_record(self) -> Result<TemplateRecord, InfraError> {
        Ok(TemplateRecord {
            id: Some(self.id),
            origin_date: parse_date(&self.origin_date, "day_templates.origin_date")?,
            is_temporary: self.is_temporary,
            active_start_hour: self.active_start_hour,
            active_end_hour: self.active_end_hour,
            recurrence_mode: self.recurrence_mode.parse()?,
            interval: self.interval,
            occurrence_limit: self.occurrence_limit,
            recurrence_start_date: self
                .recurrence_start_date
                .as_deref()
                .map(|value| parse_date(value, "day_templates.recurrence_start_date"))
                .transpose()?,
            recurrence_end_date: self
                .recurrence_end_date
                .as_deref()
                .map(|value| parse_date(value, "day_templates.recurrence_end_date"))
                .transpose()?,
        })
    }
}

fn read_block_row(row: &Row<'_>) -> rusqlite::Result<RawBlockRow> {
    Ok(RawBlockRow {
        start_minute: row.get(1)?,
        end_minute: row.get(2)?,
        label: row.get(3)?,
        note_title: row.get(4)?,
        note_body: row.get(5)?,
        color: row.get(6)?,
        is_override: row.get(7)?,
    })
}

struct RawBlockRow {
    start_minute: i32,
    end_minute: i32,
    label: String,
    note_title: String,
    note_body: String,
    color: i64,
    is_override: bool,
}

impl RawBlockRow {
    fn into_record(self) -> Result<BlockRecord, InfraError> {
        let color = u32::try_from(self.color).map_err(|_| {
            InfraError::InvalidRecord(format!("activity_blocks.color out of range: {}", self.color))
        })?;
        Ok(BlockRecord {
            start_minute: self.start_minute,
            end_minute: self.end_minute,
            label: self.label,
            note_title: self.note_title,
            note_body: self.note_body,
            color,
            is_override: self.is_override,
        })
    }
}

fn insert_blocks(
    connection: &Connection,
    template_id: i64,
    blocks: &[BlockRecord],
) -> Result<(), InfraError> {
    let mut statement = connection.prepare(
        "INSERT INTO activity_blocks
           (template_id, start_minute, end_minute, label, note_title, note_body, color, is_override)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for block in blocks {
        statement.execute(params![
            template_id,
            block.start_minute,
            block.end_minute,
            block.label,
            block.note_title,
            block.note_body,
            i64::from(block.color),
            block.is_override,
        ])?;
    }
    Ok(())
}

impl TemplateRepository for SqliteTemplateRepository {
    fn list_all(&self) -> Result<TemplateListing, InfraError> {
        let connection = self.connect()?;

        let mut blocks_by_template: HashMap<i64, Vec<BlockRecord>> = HashMap::new();
        let mut broken_blocks: HashMap<i64, String> = HashMap::new();
        let mut statement = connection.prepare(
            "SELECT template_id, start_minute, end_minute, label, note_title, note_body, color, is_override
             FROM activity_blocks ORDER BY template_id, id",
        )?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, i64>(0)?, read_block_row(row))))?;
        for row in rows {
            let (template_id, raw) = row?;
            match raw.map_err(InfraError::from).and_then(RawBlockRow::into_record) {
                Ok(block) => blocks_by_template.entry(template_id).or_default().push(block),
                Err(error) => {
                    broken_blocks.entry(template_id).or_insert_with(|| error.to_string());
                }
            }
        }

        let mut statement = connection.prepare(
            "SELECT id, origin_date, is_temporary, active_start_hour, active_end_hour,
                    recurrence_mode, recurrence_interval, occurrence_limit,
                    recurrence_start_date, recurrence_end_date
             FROM day_templates ORDER BY id",
        )?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, i64>(0)?, read_template_row(row))))?;
        let mut listing = TemplateListing::default();
        for row in rows {
            let (template_id, raw) = row?;
            let decoded = raw.map_err(InfraError::from).and_then(RawTemplateRow::into_record);
            let blocks = blocks_by_template.remove(&template_id).unwrap_or_default();
            let reason = match (decoded, broken_blocks.remove(&template_id)) {
                (Ok(template), None) => {
                    listing.templates.push(StoredTemplate { template, blocks });
                    continue;
                }
                (Ok(_), Some(block_error)) => block_error,
                (Err(error), _) => error.to_string(),
            };
            tracing::warn!(template_id, %reason, "undecodable template row");
            listing.rejected.push(RejectedRow { template_id, reason });
        }
        Ok(listing)
    }

    fn save(&self, stored: &StoredTemplate) -> Result<i64, InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        let record = &stored.template;
        let start_date = record.recurrence_start_date.map(format_date);
        let end_date = record.recurrence_end_date.map(format_date);

        let template_id = match record.id {
            Some(id) => {
                let updated = transaction.execute(
                    "UPDATE day_templates SET
                       origin_date = ?2, is_temporary = ?3, active_start_hour = ?4,
                       active_end_hour = ?5, recurrence_mode = ?6, recurrence_interval = ?7,
                       occurrence_limit = ?8, recurrence_start_date = ?9, recurrence_end_date = ?10
                     WHERE id = ?1",
                    params![
                        id,
                        format_date(record.origin_date),
                        record.is_temporary,
                        record.active_start_hour,
                        record.active_end_hour,
                        record.recurrence_mode.as_str(),
                        record.interval,
                        record.occurrence_limit,
                        start_date,
                        end_date,
                    ],
                )?;
                if updated == 0 {
                    return Err(InfraError::InvalidRecord(format!("template not found: {id}")));
                }
                transaction.execute("DELETE FROM activity_blocks WHERE template_id = ?1", params![id])?;
                id
            }
            None => {
                transaction.execute(
                    "INSERT INTO day_templates
                       (origin_date, is_temporary, active_start_hour, active_end_hour,
                        recurrence_mode, recurrence_interval, occurrence_limit,
                        recurrence_start_date, recurrence_end_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        format_date(record.origin_date),
                        record.is_temporary,
                        record.active_start_hour,
                        record.active_end_hour,
                        record.recurrence_mode.as_str(),
                        record.interval,
                        record.occurrence_limit,
                        start_date,
                        end_date,
                    ],
                )?;
                transaction.last_insert_rowid()
            }
        };

        insert_blocks(&transaction, template_id, &stored.blocks)?;
        transaction.commit()?;
        Ok(template_id)
    }

    fn remove(&self, template_id: i64) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM day_templates WHERE id = ?1", params![template_id])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute_batch("DELETE FROM activity_blocks; DELETE FROM day_templates;")?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    last_id: i64,
    templates: BTreeMap<i64, StoredTemplate>,
}

#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    state: Mutex<InMemoryState>,
}

impl InMemoryTemplateRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("template store: {error}")))
    }
}

impl TemplateRepository for InMemoryTemplateRepository {
    fn list_all(&self) -> Result<TemplateListing, InfraError> {
        let state = self.lock()?;
        Ok(TemplateListing {
            templates: state.templates.values().cloned().collect(),
            rejected: Vec::new(),
        })
    }

    fn save(&self, stored: &StoredTemplate) -> Result<i64, InfraError> {
        let mut state = self.lock()?;
        let template_id = match stored.template.id {
            Some(id) if state.templates.contains_key(&id) => id,
            Some(id) => return Err(InfraError::InvalidRecord(format!("template not found: {id}"))),
            None => {
                state.last_id += 1;
                state.last_id
            }
        };
        let mut stored = stored.clone();
        stored.template.id = Some(template_id);
        state.templates.insert(template_id, stored);
        Ok(template_id)
    }

    fn remove(&self, template_id: i64) -> Result<bool, InfraError> {
        let mut state = self.lock()?;
        Ok(state.templates.remove(&template_id).is_some())
    }

    fn clear(&self) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        state.templates.clear();
        Ok(())
    }
}
