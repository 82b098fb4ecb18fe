//! Milestone model: the only structured record the planning pipeline produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milestone priority. Serialized lowercase (`"high"`, `"medium"`, `"low"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" | "med" | "normal" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A named, time-boxed sub-step of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// 1-based position in the plan.
    pub id: u32,
    pub name: String,

    /// Always >= 1.
    pub estimated_days: u32,

    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,

    /// Names of earlier milestones. Informational only.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Milestone {
    pub fn new(id: u32, name: impl Into<String>, estimated_days: u32, task_name: &str) -> Self {
        let name = name.into();
        let estimated_days = estimated_days.max(1);
        Self {
            id,
            description: describe(&name, task_name, estimated_days),
            name,
            estimated_days,
            priority: Priority::Medium,
            completed: false,
            dependencies: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Rewrite the generated description after `estimated_days` changed.
    pub fn refresh_description(&mut self, task_name: &str) {
        self.description = describe(&self.name, task_name, self.estimated_days);
    }
}

/// Default milestone summary: "<name> for "<task>" (N days)".
pub fn describe(name: &str, task_name: &str, days: u32) -> String {
    let task_name = task_name.trim();
    if task_name.is_empty() {
        format!("{name} ({})", days_label(days))
    } else {
        format!("{name} for \"{task_name}\" ({})", days_label(days))
    }
}

/// "1 day" / "N days"
pub fn days_label(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

/// Sum of `estimated_days` as a signed total.
pub fn total_days(milestones: &[Milestone]) -> i64 {
    milestones.iter().map(|m| i64::from(m.estimated_days)).sum()
}

/// Clamp a signed day count into the valid milestone range.
pub(crate) fn clamp_days(days: i64) -> u32 {
    u32::try_from(days.max(1)).unwrap_or(u32::MAX)
}
