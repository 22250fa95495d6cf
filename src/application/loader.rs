use crate::domain::models::DayTemplate;
use crate::domain::week_view::WeekView;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::records::StoredTemplate;
use crate::infrastructure::template_repository::TemplateRepository;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTemplate {
    pub template_id: Option<i64>,
    pub reason: String,
}

/// Builds a fresh `WeekView` from every stored template.
///
/// A template whose stored row cannot be decoded, or whose blocks fail
/// validation, is left out and reported rather than failing the whole load.
pub fn load_week_view(
    repository: &dyn TemplateRepository,
    any_date_in_week: NaiveDate,
) -> Result<(WeekView, LoadReport), InfraError> {
    let mut view = WeekView::new(any_date_in_week);
    let mut report = LoadReport::default();

    let listing = repository.list_all()?;
    report.skipped.extend(listing.rejected.into_iter().map(|row| SkippedTemplate {
        template_id: Some(row.template_id),
        reason: row.reason,
    }));

    for stored in listing.templates {
        match stored.to_template() {
            Ok(template) => {
                view.add_template(Arc::new(template));
                report.loaded += 1;
            }
            Err(error) => {
                tracing::warn!(
                    template_id = ?stored.template.id,
                    %error,
                    "skipping invalid stored template"
                );
                report.skipped.push(SkippedTemplate {
                    template_id: stored.template.id,
                    reason: error.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        loaded = report.loaded,
        skipped = report.skipped.len(),
        anchor = %view.anchor_monday(),
        "week view loaded"
    );
    Ok((view, report))
}

/// Persists a template and returns the row id the repository assigned.
pub fn save_template(
    repository: &dyn TemplateRepository,
    template: &DayTemplate,
) -> Result<i64, InfraError> {
    repository.save(&StoredTemplate::from_template(template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ActivityBlock;
    use crate::domain::recurrence::RecurrenceRule;
    use crate::infrastructure::storage::{initialize_database, open_connection};
    use crate::infrastructure::template_repository::{InMemoryTemplateRepository, SqliteTemplateRepository};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn loaded_templates_resolve_on_their_dates() {
        let repository = InMemoryTemplateRepository::default();
        let mut weekly = DayTemplate::with_rule(date("2024-01-03"), false, RecurrenceRule::every_n_weeks(1));
        weekly.add_block(ActivityBlock::new(540, 630, "Lecture").expect("valid block"));
        let weekly_id = save_template(&repository, &weekly).expect("save weekly");
        let temporary_id = save_template(&repository, &DayTemplate::temporary(date("2024-01-10"))).expect("save temporary");

        let (view, report) = load_week_view(&repository, date("2024-01-04")).expect("load");
        assert_eq!(report.loaded, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(view.anchor_monday(), date("2024-01-01"));

        let resolved = view.resolve(date("2024-01-03")).expect("weekly");
        assert_eq!(resolved.id(), Some(weekly_id));
        assert_eq!(resolved.blocks()[0].label, "Lecture");
        assert_eq!(view.resolve(date("2024-01-10")).expect("temporary").id(), Some(temporary_id));
        assert!(view.resolve(date("2024-01-04")).is_none());
    }

    #[test]
    fn invalid_stored_template_is_skipped_and_reported() {
        let repository = InMemoryTemplateRepository::default();
        let mut template = DayTemplate::new(date("2024-01-01"));
        template.add_block(ActivityBlock::new(60, 120, "Run").expect("valid block"));
        let mut stored = StoredTemplate::from_template(&template);
        stored.blocks[0].end_minute = 30;
        let bad_id = repository.save(&stored).expect("save raw record");
        save_template(&repository, &DayTemplate::new(date("2024-01-02"))).expect("save valid");

        let (view, report) = load_week_view(&repository, date("2024-01-01")).expect("load");
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].template_id, Some(bad_id));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn undecodable_sqlite_row_is_reported_alongside_valid_templates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("weekplan.sqlite");
        initialize_database(&db_path).expect("schema");
        let repository = SqliteTemplateRepository::new(&db_path);
        let kept_id = save_template(&repository, &DayTemplate::new(date("2024-01-01"))).expect("save kept");
        let broken_id = save_template(&repository, &DayTemplate::new(date("2024-01-02"))).expect("save broken");
        open_connection(&db_path)
            .expect("connect")
            .execute(
                "UPDATE day_templates SET recurrence_mode = 'monthly' WHERE id = ?1",
                [broken_id],
            )
            .expect("corrupt row");

        let (view, report) = load_week_view(&repository, date("2024-01-01")).expect("load");
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].template_id, Some(broken_id));
        assert!(report.skipped[0].reason.contains("monthly"));
        assert_eq!(view.resolve(date("2024-01-01")).expect("kept").id(), Some(kept_id));
    }
}
