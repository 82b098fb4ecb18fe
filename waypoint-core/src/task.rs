//! Persisted task records and the in-memory task book.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::milestone::Milestone;
use crate::planner::{Plan, PlanRequest, PlanSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Personal,
    Work,
    Health,
    Learning,
    Finance,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Personal,
        Category::Work,
        Category::Health,
        Category::Learning,
        Category::Finance,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Work => "Work",
            Category::Health => "Health",
            Category::Learning => "Learning",
            Category::Finance => "Finance",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{wanted}' (expected one of: {})", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub category: Category,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Where `milestones` came from.
    #[serde(default)]
    pub plan_source: PlanSource,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// (completed, total) milestones.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.milestones.iter().filter(|m| m.completed).count();
        (done, self.milestones.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("no task with id {0}")]
    TaskNotFound(u64),
    #[error("task {task} has no milestone {milestone}")]
    MilestoneNotFound { task: u64, milestone: u32 },
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBook {
    /// Bumped on every successful save.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskBook {
    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// Record a planned task. Returns the new id.
    pub fn add_task(
        &mut self,
        request: &PlanRequest,
        category: Category,
        plan: Plan,
        created_at: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id();
        self.tasks.push(Task {
            id,
            name: request.task_name.trim().to_string(),
            category,
            start_date: request.start_date,
            end_date: request.end_date,
            status: TaskStatus::Pending,
            milestones: plan.milestones,
            plan_source: plan.source,
            created_at,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Flip a milestone's `completed` flag, returning the new value.
    pub fn toggle_milestone(&mut self, task_id: u64, milestone_id: u32) -> Result<bool, BookError> {
        let task = self.get_mut(task_id).ok_or(BookError::TaskNotFound(task_id))?;
        let m = task
            .milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or(BookError::MilestoneNotFound {
                task: task_id,
                milestone: milestone_id,
            })?;
        m.completed = !m.completed;
        Ok(m.completed)
    }

    pub fn set_status(&mut self, task_id: u64, status: TaskStatus) -> Result<(), BookError> {
        let task = self.get_mut(task_id).ok_or(BookError::TaskNotFound(task_id))?;
        task.status = status;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Up to `n` most recently added tasks, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Task> {
        self.tasks.iter().rev().take(n)
    }

    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.count_status(TaskStatus::Completed);
        let in_progress = self.count_status(TaskStatus::InProgress);

        let mut by_category = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for t in &self.tasks {
            *by_category.entry(t.category).or_insert(0) += 1;
            *by_status.entry(t.status).or_insert(0) += 1;
        }

        TaskStats {
            total,
            completed,
            in_progress,
            pending: total - completed - in_progress,
            completion_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            estimated_days: self
                .tasks
                .iter()
                .flat_map(|t| &t.milestones)
                .map(|m| u64::from(m.estimated_days))
                .sum(),
            actual_days: self.tasks.iter().map(Task::duration_days).sum(),
            by_category,
            by_status,
        }
    }
}

/// Dashboard and analytics figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    /// Percent, 0.0..=100.0
    pub completion_rate: f64,
    /// Sum of milestone estimates across all tasks.
    pub estimated_days: u64,
    /// Sum of task date spans.
    pub actual_days: i64,
    pub by_category: BTreeMap<Category, usize>,
    pub by_status: BTreeMap<TaskStatus, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::fallback_milestones;
    use crate::reconcile::measure;

    fn fallback_plan(name: &str, days: i64) -> Plan {
        let milestones = fallback_milestones(name, Some(days));
        Plan {
            source: PlanSource::Fallback,
            reconciliation: measure(&milestones, days),
            milestones,
            fallback_reason: None,
            padded: 0,
        }
    }

    fn add(book: &mut TaskBook, name: &str, category: Category, days: i64) -> u64 {
        let start = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let req = PlanRequest::new(name, category.as_str(), start, start + chrono::Duration::days(days));
        let created = DateTime::parse_from_rfc3339("2026-01-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        book.add_task(&req, category, fallback_plan(name, days), created)
    }

    #[test]
    fn test_ids_are_max_plus_one() {
        let mut book = TaskBook::default();
        assert_eq!(add(&mut book, "One", Category::Work, 4), 1);
        assert_eq!(add(&mut book, "Two", Category::Work, 4), 2);
        book.tasks.remove(0);
        assert_eq!(add(&mut book, "Three", Category::Work, 4), 3);
    }

    #[test]
    fn test_toggle_milestone() {
        let mut book = TaskBook::default();
        let id = add(&mut book, "Garden", Category::Personal, 8);
        assert_eq!(book.toggle_milestone(id, 2), Ok(true));
        assert_eq!(book.get(id).unwrap().progress(), (1, 3));
        assert_eq!(book.toggle_milestone(id, 2), Ok(false));
        assert_eq!(
            book.toggle_milestone(id, 9),
            Err(BookError::MilestoneNotFound { task: id, milestone: 9 })
        );
        assert_eq!(book.toggle_milestone(42, 1), Err(BookError::TaskNotFound(42)));
    }

    #[test]
    fn test_stats() {
        let mut book = TaskBook::default();
        let a = add(&mut book, "Run 5k", Category::Health, 10);
        add(&mut book, "Budget", Category::Finance, 4);
        let c = add(&mut book, "Stretch", Category::Health, 6);
        book.set_status(a, TaskStatus::Completed).unwrap();
        book.set_status(c, TaskStatus::InProgress).unwrap();

        let s = book.stats();
        assert_eq!((s.total, s.completed, s.in_progress, s.pending), (3, 1, 1, 1));
        assert!((s.completion_rate - 33.333).abs() < 0.01);
        assert_eq!(s.estimated_days, 20);
        assert_eq!(s.actual_days, 20);
        assert_eq!(s.by_category.get(&Category::Health), Some(&2));
        assert_eq!(s.by_status.get(&TaskStatus::Pending), Some(&1));
    }

    #[test]
    fn test_empty_stats() {
        let s = TaskBook::default().stats();
        assert_eq!(s.total, 0);
        assert_eq!(s.completion_rate, 0.0);
    }

    #[test]
    fn test_recent_newest_first() {
        let mut book = TaskBook::default();
        for name in ["a1", "b2", "c3"] {
            add(&mut book, name, Category::Other, 3);
        }
        let names: Vec<&str> = book.recent(2).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c3", "b2"]);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("learning".parse::<Category>(), Ok(Category::Learning));
        assert!("chores".parse::<Category>().is_err());
    }

    #[test]
    fn test_task_serde_shape() {
        let mut book = TaskBook::default();
        add(&mut book, "Tax return", Category::Finance, 10);
        let json = serde_json::to_value(&book).unwrap();
        let task = &json["tasks"][0];
        assert_eq!(task["category"], "Finance");
        assert_eq!(task["status"], "pending");
        assert_eq!(task["plan_source"], "fallback");
        assert_eq!(task["start_date"], "2026-01-10");
        assert_eq!(task["milestones"][0]["priority"], "high");
    }
}
