use crate::domain::models::DayTemplate;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::sync::Arc;

pub const DAYS_PER_WEEK: usize = 7;

pub type WeekResolution = [Option<Arc<DayTemplate>>; DAYS_PER_WEEK];

/// Weekday-keyed candidate pools plus the Monday the UI treats as "this week".
///
/// Templates are pooled by their own weekday, never by whether their origin
/// falls inside the anchor week, so rules anchored in any week resolve
/// against any queried date. Nothing is cached: every query walks the pool.
#[derive(Debug, Clone)]
pub struct WeekView {
    anchor_monday: NaiveDate,
    pools: [Vec<Arc<DayTemplate>>; DAYS_PER_WEEK],
}

impl WeekView {
    pub fn new(any_date_in_week: NaiveDate) -> Self {
        Self {
            anchor_monday: monday_of(any_date_in_week),
            pools: Default::default(),
        }
    }

    pub fn from_templates(
        any_date_in_week: NaiveDate,
        templates: impl IntoIterator<Item = Arc<DayTemplate>>,
    ) -> Self {
        let mut view = Self::new(any_date_in_week);
        for template in templates {
            view.add_template(template);
        }
        view
    }

    pub fn anchor_monday(&self) -> NaiveDate {
        self.anchor_monday
    }

    /// Re-points the displayed week; candidate pools are kept.
    pub fn set_anchor(&mut self, any_date_in_week: NaiveDate) {
        self.anchor_monday = monday_of(any_date_in_week);
    }

    pub fn add_template(&mut self, template: Arc<DayTemplate>) {
        self.pools[slot(template.weekday())].push(template);
    }

    /// Removes the given handle (by identity, not by value).
    pub fn remove_template(&mut self, template: &Arc<DayTemplate>) -> bool {
        let pool = &mut self.pools[slot(template.weekday())];
        let Some(position) = pool
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, template))
        else {
            return false;
        };
        pool.remove(position);
        true
    }

    pub fn candidates(&self, weekday: Weekday) -> &[Arc<DayTemplate>] {
        &self.pools[slot(weekday)]
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<DayTemplate>> {
        self.pools.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(Vec::is_empty)
    }

    /// Picks the single effective template for `target_date`.
    ///
    /// A temporary candidate outranks a recurring one. Among candidates of
    /// equal rank the first in pool order wins, so two temporary templates on
    /// one date should be prevented upstream.
    pub fn resolve(&self, target_date: NaiveDate) -> Option<Arc<DayTemplate>> {
        let mut best: Option<&Arc<DayTemplate>> = None;
        for candidate in self.candidates(target_date.weekday()) {
            if !candidate.appears_on(target_date) {
                continue;
            }
            match best {
                None => best = Some(candidate),
                Some(current) if !current.is_temporary() && candidate.is_temporary() => {
                    tracing::debug!(
                        date = %target_date,
                        replaced = %current.origin_date(),
                        temporary = %candidate.origin_date(),
                        "temporary template overrides recurring template"
                    );
                    best = Some(candidate);
                }
                Some(current) => {
                    tracing::debug!(
                        date = %target_date,
                        kept = %current.origin_date(),
                        skipped = %candidate.origin_date(),
                        "equal-rank template match, keeping first"
                    );
                }
            }
        }
        best.cloned()
    }

    /// Resolves the seven consecutive days starting at `start_of_week`, which
    /// need not be a Monday.
    pub fn effective_templates_for_week(&self, start_of_week: NaiveDate) -> WeekResolution {
        std::array::from_fn(|offset| {
            start_of_week
                .checked_add_days(Days::new(offset as u64))
                .and_then(|date| self.resolve(date))
        })
    }

    pub fn current_week(&self) -> WeekResolution {
        self.effective_templates_for_week(self.anchor_monday)
    }

    /// First date of the seven-day span on which `template` appears.
    pub fn first_appearance_in_week(
        &self,
        template: &DayTemplate,
        start_of_week: NaiveDate,
    ) -> Option<NaiveDate> {
        start_of_week
            .iter_days()
            .take(DAYS_PER_WEEK)
            .find(|date| template.appears_on(*date))
    }
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date.week(Weekday::Mon).first_day()
}

fn slot(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ActivityBlock;
    use crate::domain::recurrence::RecurrenceRule;
    use proptest::prelude::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn weekly(origin: &str) -> Arc<DayTemplate> {
        Arc::new(DayTemplate::with_rule(
            date(origin),
            false,
            RecurrenceRule::every_n_weeks(1),
        ))
    }

    fn temporary(origin: &str) -> Arc<DayTemplate> {
        Arc::new(DayTemplate::temporary(date(origin)))
    }

    #[test]
    fn new_normalises_anchor_to_monday() {
        let view = WeekView::new(date("2024-01-04"));
        assert_eq!(view.anchor_monday(), date("2024-01-01"));

        let view = WeekView::new(date("2024-01-07"));
        assert_eq!(view.anchor_monday(), date("2024-01-01"));
    }

    #[test]
    fn templates_are_pooled_by_weekday_outside_anchor_week() {
        let mut view = WeekView::new(date("2024-06-03"));
        view.add_template(weekly("2024-01-03"));
        view.add_template(weekly("2025-02-05"));

        assert_eq!(view.candidates(Weekday::Wed).len(), 2);
        assert!(view.candidates(Weekday::Mon).is_empty());
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn resolve_returns_none_for_empty_pool() {
        let view = WeekView::new(date("2024-01-01"));
        assert!(view.is_empty());
        assert!(view.resolve(date("2024-01-03")).is_none());
    }

    #[test]
    fn temporary_template_outranks_recurring_one() {
        let recurring = weekly("2024-01-03");
        let one_off = temporary("2024-01-03");
        let view = WeekView::from_templates(
            date("2024-01-01"),
            [Arc::clone(&recurring), Arc::clone(&one_off)],
        );

        let resolved = view.resolve(date("2024-01-03")).expect("template");
        assert!(Arc::ptr_eq(&resolved, &one_off));

        let next_week = view.resolve(date("2024-01-10")).expect("template");
        assert!(Arc::ptr_eq(&next_week, &recurring));
    }

    #[test]
    fn temporary_template_wins_regardless_of_insertion_order() {
        let recurring = weekly("2024-01-03");
        let one_off = temporary("2024-01-03");
        let view = WeekView::from_templates(
            date("2024-01-01"),
            [Arc::clone(&one_off), Arc::clone(&recurring)],
        );

        let resolved = view.resolve(date("2024-01-03")).expect("template");
        assert!(Arc::ptr_eq(&resolved, &one_off));
    }

    #[test]
    fn equal_rank_matches_keep_first_inserted() {
        let first = weekly("2024-01-01");
        let second = weekly("2024-01-08");
        let view = WeekView::from_templates(
            date("2024-01-01"),
            [Arc::clone(&first), Arc::clone(&second)],
        );

        let resolved = view.resolve(date("2024-01-15")).expect("template");
        assert!(Arc::ptr_eq(&resolved, &first));
    }

    #[test]
    fn remove_template_uses_identity() {
        let kept = weekly("2024-01-01");
        let removed = weekly("2024-01-01");
        let mut view = WeekView::from_templates(
            date("2024-01-01"),
            [Arc::clone(&kept), Arc::clone(&removed)],
        );

        assert!(view.remove_template(&removed));
        assert!(!view.remove_template(&removed));
        assert_eq!(view.len(), 1);
        assert!(Arc::ptr_eq(&view.resolve(date("2024-01-08")).expect("template"), &kept));
    }

    #[test]
    fn week_resolution_crosses_week_boundaries_without_moving_anchor() {
        let mut lecture = DayTemplate::with_rule(date("2024-01-03"), false, RecurrenceRule::every_n_weeks(1));
        lecture.add_block(ActivityBlock::new(540, 630, "Lecture").expect("valid block"));
        let view = WeekView::from_templates(date("2024-01-01"), [Arc::new(lecture), temporary("2024-01-13")]);

        let week = view.effective_templates_for_week(date("2024-01-11"));
        let matched: Vec<usize> = week
            .iter()
            .enumerate()
            .filter_map(|(offset, template)| template.as_ref().map(|_| offset))
            .collect();
        // 2024-01-13 (Sat) and 2024-01-17 (Wed)
        assert_eq!(matched, vec![2, 6]);
        assert_eq!(view.anchor_monday(), date("2024-01-01"));
    }

    #[test]
    fn set_anchor_keeps_pools() {
        let mut view = WeekView::from_templates(date("2024-01-01"), [weekly("2024-01-02")]);
        view.set_anchor(date("2024-03-14"));

        assert_eq!(view.anchor_monday(), date("2024-03-11"));
        let week = view.current_week();
        assert!(week[1].is_some());
        assert_eq!(week.iter().filter(|template| template.is_some()).count(), 1);
    }

    #[test]
    fn first_appearance_in_week_reports_matching_date() {
        let view = WeekView::new(date("2024-01-01"));
        let template = DayTemplate::with_rule(date("2024-01-03"), false, RecurrenceRule::every_n_weeks(2));

        assert_eq!(
            view.first_appearance_in_week(&template, date("2024-01-15")),
            Some(date("2024-01-17"))
        );
        assert_eq!(view.first_appearance_in_week(&template, date("2024-01-08")), None);
    }

    proptest! {
        #[test]
        fn temporary_candidate_always_wins_its_date(
            recurring_count in 0usize..4usize,
            temporary_position in 0usize..5usize,
            day_offset in 0u64..28u64
        ) {
            let target = date("2024-01-01") + Days::new(day_offset);
            let one_off = Arc::new(DayTemplate::temporary(target));
            let mut templates: Vec<Arc<DayTemplate>> = (0..recurring_count)
                .map(|_| Arc::new(DayTemplate::with_rule(target, false, RecurrenceRule::every_n_days(1))))
                .collect();
            templates.insert(temporary_position.min(templates.len()), Arc::clone(&one_off));
            let view = WeekView::from_templates(target, templates);

            let first = view.resolve(target).expect("template");
            prop_assert!(Arc::ptr_eq(&first, &one_off));
            let second = view.resolve(target).expect("template");
            prop_assert!(Arc::ptr_eq(&first, &second));
        }
    }
}
