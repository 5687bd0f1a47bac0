//! Client-side task view state.
//!
//! [`TaskViewState`] owns the latest task snapshot fetched from the
//! backend together with the current filter, search term and page, and
//! derives the page of tasks shown to the user plus whole-collection
//! statistics.
//!
//! Filter and search are not layered. A non-empty search term selects
//! from the entire collection and ignores the status filter; an empty
//! term falls back to the status filter alone.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, trace};

use crate::task::{Status, Task};

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    fn admits(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => task.status == Status::Active,
            StatusFilter::Completed => task.status == Status::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            other => Err(anyhow!(
                "unknown status filter '{other}' (expected all, active or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewCriteria {
    pub status_filter: StatusFilter,
    pub search_term: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub due_today: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let completed = tasks.iter().filter(|task| task.is_completed()).count();
        let due_today = tasks
            .iter()
            .filter(|task| task.due_date() == Some(today))
            .count();

        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
            due_today,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedView {
    pub visible_tasks: Vec<Task>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_filtered: usize,
    pub total_pages: usize,
    pub stats: TaskStats,
}

impl DerivedView {
    pub fn is_empty(&self) -> bool {
        self.total_filtered == 0
    }
}

#[derive(Debug, Clone)]
pub struct TaskViewState {
    tasks: Vec<Task>,
    criteria: ViewCriteria,
    today: NaiveDate,
    // Indices into `tasks` selected by the active predicate, in order.
    filtered: Vec<usize>,
    view: DerivedView,
}

impl Default for TaskViewState {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl TaskViewState {
    /// Empty state; `today` anchors the due-today statistic.
    pub fn new(today: NaiveDate) -> Self {
        let mut state = Self {
            tasks: Vec::new(),
            criteria: ViewCriteria::default(),
            today,
            filtered: Vec::new(),
            view: DerivedView {
                visible_tasks: Vec::new(),
                page_number: 1,
                page_size: PAGE_SIZE,
                total_filtered: 0,
                total_pages: 1,
                stats: TaskStats::default(),
            },
        };
        state.recompute();
        state
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn criteria(&self) -> &ViewCriteria {
        &self.criteria
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Moves the due-today anchor. Only statistics change; the page is kept.
    pub fn set_today(&mut self, today: NaiveDate) {
        if self.today != today {
            self.today = today;
            self.view.stats = TaskStats::compute(&self.tasks, today);
        }
    }

    /// Replaces the authoritative collection, keeping criteria and page.
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn load_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.recompute();
    }

    #[tracing::instrument(skip(self))]
    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.criteria.status_filter = filter;
        // A filter click re-derives from the filter alone.
        self.criteria.search_term.clear();
        self.view.page_number = 1;
        self.recompute();
    }

    #[tracing::instrument(skip(self))]
    pub fn set_search_term(&mut self, term: &str) {
        self.criteria.search_term = term.to_string();
        self.view.page_number = 1;
        self.recompute();
    }

    /// Moves to `page_number`, clamped into `[1, total_pages]`: an
    /// out-of-range request lands on the nearest valid page instead of
    /// being ignored, so page 10 of 3 shows page 3 and page 0 shows page 1.
    /// Returns whether the visible page changed.
    #[tracing::instrument(skip(self))]
    pub fn set_page(&mut self, page_number: usize) -> bool {
        let clamped = page_number.clamp(1, self.view.total_pages);
        if clamped != page_number {
            debug!(
                requested = page_number,
                clamped,
                total_pages = self.view.total_pages,
                "page request out of range"
            );
        }
        if clamped == self.view.page_number {
            return false;
        }

        self.view.page_number = clamped;
        self.slice_visible();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.view.page_number + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.view.page_number.saturating_sub(1))
    }

    pub fn derived_view(&self) -> &DerivedView {
        &self.view
    }

    fn recompute(&mut self) {
        let needle = self.criteria.search_term.to_lowercase();

        self.filtered = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| {
                if needle.is_empty() {
                    self.criteria.status_filter.admits(task)
                } else {
                    matches_search(task, &needle)
                }
            })
            .map(|(idx, _)| idx)
            .collect();

        let total_filtered = self.filtered.len();
        self.view.total_filtered = total_filtered;
        self.view.total_pages = total_filtered.div_ceil(PAGE_SIZE).max(1);
        self.view.page_number = self.view.page_number.clamp(1, self.view.total_pages);
        self.view.stats = TaskStats::compute(&self.tasks, self.today);
        self.slice_visible();

        debug!(
            filter = %self.criteria.status_filter,
            search = %self.criteria.search_term,
            total = self.tasks.len(),
            total_filtered,
            page = self.view.page_number,
            total_pages = self.view.total_pages,
            "recomputed task view"
        );
    }

    fn slice_visible(&mut self) {
        let start = (self.view.page_number - 1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.filtered.len());
        self.view.visible_tasks = self
            .filtered
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|&idx| self.tasks[idx].clone())
            .collect();
        trace!(start, end, "sliced visible tasks");
    }
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task.description_or_empty().to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{PAGE_SIZE, StatusFilter, TaskViewState};
    use crate::task::{Status, Task};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn numbered(count: usize) -> Vec<Task> {
        (1..=count)
            .map(|n| Task::new(format!("t-{n}"), format!("Task {n}")))
            .collect()
    }

    fn loaded(tasks: Vec<Task>) -> TaskViewState {
        let mut state = TaskViewState::new(today());
        state.load_snapshot(tasks);
        state
    }

    #[test]
    fn empty_snapshot_yields_single_empty_page() {
        let state = loaded(vec![]);
        let view = state.derived_view();

        assert!(view.is_empty());
        assert!(view.visible_tasks.is_empty());
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.page_number, 1);
        assert_eq!(view.stats.total, 0);
    }

    #[test]
    fn pages_partition_the_filtered_sequence() {
        for count in [0, 1, 9, 10, 11, 25, 30, 31] {
            let mut state = loaded(numbered(count));
            let total_pages = state.derived_view().total_pages;

            let mut seen = Vec::new();
            for page in 1..=total_pages {
                state.set_page(page);
                let view = state.derived_view();
                assert!(view.visible_tasks.len() <= PAGE_SIZE);
                seen.extend(view.visible_tasks.iter().map(|task| task.id.clone()));
            }

            assert_eq!(seen.len(), count);
            let expected: Vec<String> = (1..=count).map(|n| format!("t-{n}")).collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn page_requests_are_clamped_to_last_page() {
        let mut state = loaded(numbered(25));
        assert_eq!(state.derived_view().total_pages, 3);

        assert!(state.set_page(10));
        assert_eq!(state.derived_view().page_number, 3);
        assert_eq!(state.derived_view().visible_tasks.len(), 5);

        assert!(!state.set_page(10));
        assert_eq!(state.derived_view().page_number, 3);

        assert!(state.set_page(0));
        assert_eq!(state.derived_view().page_number, 1);
    }

    #[test]
    fn page_change_leaves_stats_untouched() {
        let mut tasks = numbered(15);
        tasks[3].status = Status::Completed;
        let mut state = loaded(tasks);
        let before = state.derived_view().stats;

        state.next_page();
        assert_eq!(state.derived_view().page_number, 2);
        assert_eq!(state.derived_view().stats, before);

        state.prev_page();
        assert_eq!(state.derived_view().page_number, 1);
        assert!(!state.prev_page());
    }

    #[test]
    fn changing_criteria_resets_to_first_page() {
        let mut state = loaded(numbered(25));
        state.set_page(3);

        state.set_status_filter(StatusFilter::Active);
        assert_eq!(state.derived_view().page_number, 1);

        state.set_page(2);
        state.set_search_term("task");
        assert_eq!(state.derived_view().page_number, 1);
    }

    #[test]
    fn reload_keeps_criteria_and_clamps_page() {
        let mut state = loaded(numbered(25));
        state.set_page(3);

        state.load_snapshot(numbered(25));
        assert_eq!(state.derived_view().page_number, 3);

        state.load_snapshot(numbered(12));
        assert_eq!(state.derived_view().page_number, 2);
        assert_eq!(state.derived_view().visible_tasks.len(), 2);
    }

    #[test]
    fn status_filter_twice_is_idempotent() {
        let mut tasks = numbered(14);
        tasks[0].status = Status::Completed;
        let mut state = loaded(tasks);

        state.set_status_filter(StatusFilter::All);
        let first = state.derived_view().clone();
        state.set_status_filter(StatusFilter::All);

        assert_eq!(&first, state.derived_view());
    }

    #[test]
    fn clearing_search_restores_status_filter_view() {
        let mut tasks = numbered(12);
        for task in tasks.iter_mut().take(5) {
            task.status = Status::Completed;
        }
        let mut state = loaded(tasks);

        state.set_status_filter(StatusFilter::Completed);
        let filtered = state.derived_view().clone();

        state.set_search_term("task 1");
        assert_ne!(&filtered, state.derived_view());

        state.set_search_term("");
        assert_eq!(&filtered, state.derived_view());
    }

    #[test]
    fn search_ignores_status_filter_and_filter_click_drops_search() {
        let mut report = Task::new("a", "Monthly Report");
        report.status = Status::Completed;
        let budget = Task::new("b", "Budget");
        let mut state = loaded(vec![report, budget]);

        state.set_status_filter(StatusFilter::Active);
        state.set_search_term("REPORT");
        let ids: Vec<&str> = state
            .derived_view()
            .visible_tasks
            .iter()
            .map(|task| task.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a"]);

        state.set_status_filter(StatusFilter::Active);
        assert_eq!(state.criteria().search_term, "");
        assert_eq!(state.derived_view().total_filtered, 1);
        assert_eq!(state.derived_view().visible_tasks[0].id, "b");
    }

    #[test]
    fn search_is_case_insensitive_substring_over_title_and_description() {
        let report = Task::new("a", "Monthly Report");
        let mut budget = Task::new("b", "Budget");
        budget.description = Some("no reports due".to_string());
        let mut other = Task::new("c", "Groceries");
        other.description = None;
        let mut state = loaded(vec![report, budget, other]);

        state.set_search_term("report");
        let ids: Vec<&str> = state
            .derived_view()
            .visible_tasks
            .iter()
            .map(|task| task.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let task = Task::new("a", "Отчёт за месяц");
        let mut state = loaded(vec![task]);

        state.set_search_term("ОТЧЁТ");
        assert_eq!(state.derived_view().total_filtered, 1);
    }

    #[test]
    fn active_filter_scenario_keeps_whole_collection_stats() {
        let mut tasks = numbered(12);
        for task in tasks.iter_mut().take(5) {
            task.status = Status::Completed;
        }
        tasks[6].due_date = Some("2026-10-18".to_string());
        tasks[9].due_date = Some("2026-10-18T09:30:00Z".to_string());
        tasks[10].due_date = Some((today() + Duration::days(1)).to_string());
        tasks[11].due_date = Some("not a date".to_string());
        let mut state = loaded(tasks);

        state.set_status_filter(StatusFilter::Active);
        let view = state.derived_view();

        assert_eq!(view.total_filtered, 7);
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.visible_tasks.len(), 7);
        assert_eq!(view.stats.total, 12);
        assert_eq!(view.stats.active, 7);
        assert_eq!(view.stats.completed, 5);
        assert_eq!(view.stats.due_today, 2);
    }

    #[test]
    fn due_today_is_independent_of_filter_and_search() {
        let mut tasks = numbered(6);
        tasks[0].due_date = Some("2026-10-18".to_string());
        tasks[1].due_date = Some("2026-10-18".to_string());
        tasks[1].status = Status::Completed;
        let mut state = loaded(tasks);
        let due_today = state.derived_view().stats.due_today;

        state.set_status_filter(StatusFilter::Completed);
        assert_eq!(state.derived_view().stats.due_today, due_today);

        state.set_search_term("nothing matches this");
        assert_eq!(state.derived_view().stats.due_today, due_today);
        assert_eq!(state.derived_view().total_filtered, 0);
    }

    #[test]
    fn filtering_preserves_server_order() {
        let mut tasks = vec![
            Task::new("z", "last alphabetically"),
            Task::new("a", "first alphabetically"),
            Task::new("m", "middle"),
        ];
        tasks[1].status = Status::Completed;
        let mut state = loaded(tasks);

        state.set_status_filter(StatusFilter::Active);
        let ids: Vec<&str> = state
            .derived_view()
            .visible_tasks
            .iter()
            .map(|task| task.id.as_str())
            .collect();
        assert_eq!(ids, vec!["z", "m"]);
    }

    #[test]
    fn loading_same_snapshot_twice_is_deterministic() {
        let mut tasks = numbered(23);
        tasks[4].status = Status::Completed;
        let mut state = loaded(tasks.clone());
        state.set_status_filter(StatusFilter::Active);
        state.set_page(2);

        state.load_snapshot(tasks.clone());
        let first = state.derived_view().clone();
        state.load_snapshot(tasks);

        assert_eq!(&first, state.derived_view());
    }

    #[test]
    fn moving_today_updates_due_today_only() {
        let mut tasks = numbered(3);
        tasks[0].due_date = Some("2026-10-19".to_string());
        let mut state = loaded(tasks);
        assert_eq!(state.derived_view().stats.due_today, 0);

        state.set_today(today() + Duration::days(1));
        assert_eq!(state.derived_view().stats.due_today, 1);
        assert_eq!(state.derived_view().total_filtered, 3);
    }

    #[test]
    fn status_filter_parses_from_text() {
        assert_eq!("Active".parse::<StatusFilter>().unwrap(), StatusFilter::Active);
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
