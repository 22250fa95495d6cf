use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::loader::{LoadReport, load_week_view, save_template};
use crate::domain::models::{ActivityBlock, DayTemplate, Note, format_minute};
use crate::domain::recurrence::RecurrenceRule;
use crate::domain::week_view::{DAYS_PER_WEEK, WeekView};
use crate::infrastructure::config::{AppConfig, save_palette};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::template_repository::{SqliteTemplateRepository, TemplateRepository};
use chrono::{Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const COMMAND_LOG: &str = "commands.log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockDraft {
    pub start_minute: i32,
    pub end_minute: i32,
    pub label: String,
    pub note_title: Option<String>,
    pub note_body: Option<String>,
    pub color: Option<u32>,
    pub is_override: bool,
}

impl BlockDraft {
    pub fn new(start_minute: i32, end_minute: i32, label: impl Into<String>) -> Self {
        Self {
            start_minute,
            end_minute,
            label: label.into(),
            note_title: None,
            note_body: None,
            color: None,
            is_override: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateDraft {
    pub origin_date: NaiveDate,
    pub is_temporary: bool,
    pub active_hours: Option<(i32, i32)>,
    pub recurrence: RecurrenceRule,
    pub blocks: Vec<BlockDraft>,
}

impl TemplateDraft {
    pub fn recurring(origin_date: NaiveDate, recurrence: RecurrenceRule) -> Self {
        Self {
            origin_date,
            is_temporary: false,
            active_hours: None,
            recurrence,
            blocks: Vec::new(),
        }
    }

    pub fn temporary(origin_date: NaiveDate) -> Self {
        Self {
            origin_date,
            is_temporary: true,
            active_hours: None,
            recurrence: RecurrenceRule::once(),
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: BlockDraft) -> Self {
        self.blocks.push(block);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockView {
    pub start_minute: i32,
    pub end_minute: i32,
    pub start: String,
    pub end: String,
    pub label: String,
    pub note_title: String,
    pub note_body: String,
    pub color: u32,
    pub is_override: bool,
}

impl BlockView {
    fn from_block(block: &ActivityBlock) -> Self {
        Self {
            start_minute: block.start_minute(),
            end_minute: block.end_minute(),
            start: format_minute(block.start_minute()),
            end: format_minute(block.end_minute()),
            label: block.label.clone(),
            note_title: block.note.title.clone(),
            note_body: block.note.body.clone(),
            color: block.color,
            is_override: block.is_override,
        }
    }
}

/// What the timeline shows for one date: the effective template, if any,
/// and its blocks in paint order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub weekday: String,
    pub template_id: Option<i64>,
    pub template_origin: Option<NaiveDate>,
    pub is_temporary: bool,
    pub active_start_hour: i32,
    pub active_end_hour: i32,
    pub blocks: Vec<BlockView>,
}

/// Application service over a storage collaborator.
///
/// Queries run against an immutable `WeekView` snapshot; every write goes to
/// storage and then rebuilds and swaps the snapshot.
pub struct Planner {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    config: RwLock<AppConfig>,
    repository: Arc<dyn TemplateRepository>,
    snapshot: RwLock<Arc<WeekView>>,
    log_guard: Mutex<()>,
}

impl Planner {
    /// Bootstraps `workspace_root` and opens its SQLite store.
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let repository = Arc::new(SqliteTemplateRepository::new(&bootstrap.database_path));
        Self::open(bootstrap, repository)
    }

    /// Uses `workspace_root` for config and logs but reads templates from
    /// the given repository.
    pub fn with_repository(
        workspace_root: &Path,
        repository: Arc<dyn TemplateRepository>,
    ) -> Result<Self, InfraError> {
        Self::open(bootstrap_workspace(workspace_root)?, repository)
    }

    fn open(
        bootstrap: BootstrapResult,
        repository: Arc<dyn TemplateRepository>,
    ) -> Result<Self, InfraError> {
        let (view, report) = load_week_view(repository.as_ref(), local_today())?;

        let planner = Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            config: RwLock::new(bootstrap.config),
            repository,
            snapshot: RwLock::new(Arc::new(view)),
            log_guard: Mutex::new(()),
        };
        planner.log_load_report("open", &report);
        Ok(planner)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(COMMAND_LOG);
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn log_load_report(&self, command: &str, report: &LoadReport) {
        self.log_info(
            command,
            &format!("loaded={} skipped={}", report.loaded, report.skipped.len()),
        );
        for skipped in &report.skipped {
            self.log_error(
                command,
                &format!(
                    "skipped template_id={:?}: {}",
                    skipped.template_id, skipped.reason
                ),
            );
        }
    }

    pub fn snapshot(&self) -> Result<Arc<WeekView>, InfraError> {
        let snapshot = self
            .snapshot
            .read()
            .map_err(|error| InfraError::LockPoisoned(format!("week snapshot: {error}")))?;
        Ok(Arc::clone(&*snapshot))
    }

    fn replace_snapshot(&self, view: WeekView) -> Result<(), InfraError> {
        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|error| InfraError::LockPoisoned(format!("week snapshot: {error}")))?;
        *snapshot = Arc::new(view);
        Ok(())
    }

    fn current_config(&self) -> Result<AppConfig, InfraError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|error| InfraError::LockPoisoned(format!("config: {error}")))
    }

    /// Rebuilds the snapshot from storage, keeping the current anchor week.
    pub fn reload(&self) -> Result<LoadReport, InfraError> {
        let anchor = self.snapshot()?.anchor_monday();
        let (view, report) = load_week_view(self.repository.as_ref(), anchor)?;
        self.replace_snapshot(view)?;
        self.log_load_report("reload", &report);
        Ok(report)
    }

    pub fn set_anchor(&self, any_date_in_week: NaiveDate) -> Result<NaiveDate, InfraError> {
        let mut view = WeekView::clone(&*self.snapshot()?);
        view.set_anchor(any_date_in_week);
        let anchor = view.anchor_monday();
        self.replace_snapshot(view)?;
        self.log_info("set_anchor", &format!("anchor_monday={anchor}"));
        Ok(anchor)
    }

    pub fn day_schedule(&self, date: NaiveDate) -> Result<DaySchedule, InfraError> {
        let view = self.snapshot()?;
        let config = self.current_config()?;
        Ok(build_day_schedule(date, view.resolve(date).as_deref(), &config))
    }

    /// Seven consecutive days from `start`, or from the anchor Monday.
    pub fn week_schedule(&self, start: Option<NaiveDate>) -> Result<Vec<DaySchedule>, InfraError> {
        let view = self.snapshot()?;
        let config = self.current_config()?;
        let start = start.unwrap_or_else(|| view.anchor_monday());
        let resolved = view.effective_templates_for_week(start);

        Ok(start
            .iter_days()
            .take(DAYS_PER_WEEK)
            .zip(resolved.iter())
            .map(|(date, template)| build_day_schedule(date, template.as_deref(), &config))
            .collect())
    }

    /// Stores a new template and returns its id. A temporary template always
    /// gets a one-off rule, and only one temporary template may exist per date.
    pub fn create_template(&self, draft: TemplateDraft) -> Result<i64, InfraError> {
        let config = self.current_config()?;
        if draft.is_temporary {
            let view = self.snapshot()?;
            let clash = view
                .candidates(draft.origin_date.weekday())
                .iter()
                .find(|existing| existing.is_temporary() && existing.origin_date() == draft.origin_date);
            if let Some(existing) = clash {
                let error = InfraError::InvalidRecord(format!(
                    "temporary template already exists for {} (template_id={:?})",
                    draft.origin_date,
                    existing.id()
                ));
                return Err(self.log_and_return("create_template", error));
            }
        }

        let template = match build_template(draft, &config) {
            Ok(template) => template,
            Err(error) => return Err(self.log_and_return("create_template", error)),
        };
        let template_id = match save_template(self.repository.as_ref(), &template) {
            Ok(template_id) => template_id,
            Err(error) => return Err(self.log_and_return("create_template", error)),
        };
        self.reload_after_write("create_template");
        self.log_info(
            "create_template",
            &format!(
                "created template_id={template_id} origin_date={} temporary={}",
                template.origin_date(),
                template.is_temporary()
            ),
        );
        Ok(template_id)
    }

    pub fn add_block(&self, template_id: i64, draft: BlockDraft) -> Result<DayTemplate, InfraError> {
        let config = self.current_config()?;
        let view = self.snapshot()?;
        let Some(existing) = view.templates().find(|template| template.id() == Some(template_id)) else {
            let error = InfraError::InvalidRecord(format!("template not found: {template_id}"));
            return Err(self.log_and_return("add_block", error));
        };

        let mut template = DayTemplate::clone(existing);
        let block = match build_block(draft, &config) {
            Ok(block) => block,
            Err(error) => return Err(self.log_and_return("add_block", error)),
        };
        let description = block.to_string();
        template.add_block(block);
        if let Err(error) = save_template(self.repository.as_ref(), &template) {
            return Err(self.log_and_return("add_block", error));
        }
        self.reload_after_write("add_block");
        self.log_info(
            "add_block",
            &format!("template_id={template_id} block={description}"),
        );
        Ok(template)
    }

    pub fn remove_template(&self, template_id: i64) -> Result<bool, InfraError> {
        let removed = match self.repository.remove(template_id) {
            Ok(removed) => removed,
            Err(error) => return Err(self.log_and_return("remove_template", error)),
        };
        if removed {
            self.reload_after_write("remove_template");
        }
        self.log_info(
            "remove_template",
            &format!("template_id={template_id} removed={removed}"),
        );
        Ok(removed)
    }

    pub fn palette(&self) -> Result<Vec<u32>, InfraError> {
        Ok(self.current_config()?.palette)
    }

    pub fn save_palette(&self, colors: &[u32]) -> Result<Vec<u32>, InfraError> {
        let updated = save_palette(&self.config_dir, colors)?;
        let palette = updated.palette.clone();
        let mut config = self
            .config
            .write()
            .map_err(|error| InfraError::LockPoisoned(format!("config: {error}")))?;
        *config = updated;
        self.log_info("save_palette", &format!("colors={}", palette.len()));
        Ok(palette)
    }

    fn log_and_return(&self, command: &str, error: InfraError) -> InfraError {
        self.log_error(command, &error.to_string());
        error
    }

    /// The write is already stored; a failed reload leaves the previous
    /// snapshot in place until the next successful reload.
    fn reload_after_write(&self, command: &str) {
        if let Err(error) = self.reload() {
            tracing::warn!(command, %error, "reload after write failed");
            self.log_error(command, &format!("stored, but reload failed: {error}"));
        }
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn build_block(draft: BlockDraft, config: &AppConfig) -> Result<ActivityBlock, InfraError> {
    let note = Note::new(
        draft
            .note_title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| config.default_note_title.clone()),
        draft.note_body.unwrap_or_default(),
    );
    Ok(ActivityBlock::with_details(
        draft.start_minute,
        draft.end_minute,
        draft.label,
        note,
        draft.color.unwrap_or(config.default_block_color),
        draft.is_override,
    )?)
}

fn build_template(draft: TemplateDraft, config: &AppConfig) -> Result<DayTemplate, InfraError> {
    let recurrence = if draft.is_temporary {
        RecurrenceRule::once()
    } else {
        draft.recurrence
    };
    let mut template = DayTemplate::with_rule(draft.origin_date, draft.is_temporary, recurrence);

    let (start_hour, end_hour) = draft.active_hours.unwrap_or((
        config.default_active_hours.start,
        config.default_active_hours.end,
    ));
    if !template.set_active_hours(start_hour, end_hour) {
        return Err(InfraError::InvalidRecord(format!(
            "active hours must satisfy 0 <= start < end <= 24, got {start_hour}..{end_hour}"
        )));
    }

    for block in draft.blocks {
        template.add_block(build_block(block, config)?);
    }
    Ok(template)
}

fn build_day_schedule(date: NaiveDate, template: Option<&DayTemplate>, config: &AppConfig) -> DaySchedule {
    let weekday = date.weekday().to_string();
    let Some(template) = template else {
        return DaySchedule {
            date,
            weekday,
            template_id: None,
            template_origin: None,
            is_temporary: false,
            active_start_hour: config.default_active_hours.start,
            active_end_hour: config.default_active_hours.end,
            blocks: Vec::new(),
        };
    };

    let (active_start_hour, active_end_hour) = template.active_hours();
    DaySchedule {
        date,
        weekday,
        template_id: template.id(),
        template_origin: Some(template.origin_date()),
        is_temporary: template.is_temporary(),
        active_start_hour,
        active_end_hour,
        blocks: template
            .paint_order()
            .into_iter()
            .map(BlockView::from_block)
            .collect(),
    }
}
