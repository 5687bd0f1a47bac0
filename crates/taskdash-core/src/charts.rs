use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::task::{Priority, Task};

pub const HISTOGRAM_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueBucket {
    pub date: NaiveDate,
    pub count: usize,
}

/// Tasks due on each of the seven days starting today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueHistogram {
    pub buckets: Vec<DueBucket>,
}

impl DueHistogram {
    pub fn max_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl PriorityBreakdown {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

pub fn due_histogram(tasks: &[Task], today: NaiveDate) -> DueHistogram {
    let buckets = (0..HISTOGRAM_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| DueBucket {
            date,
            count: tasks
                .iter()
                .filter(|task| task.due_date() == Some(date))
                .count(),
        })
        .collect();

    DueHistogram { buckets }
}

pub fn priority_breakdown(tasks: &[Task]) -> PriorityBreakdown {
    tasks
        .iter()
        .fold(PriorityBreakdown::default(), |mut acc, task| {
            match task.priority {
                Priority::Low => acc.low += 1,
                Priority::Medium => acc.medium += 1,
                Priority::High => acc.high += 1,
            }
            acc
        })
}
