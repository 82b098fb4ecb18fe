//! Productivity insights over the task book.

use tracing::{debug, warn};

use crate::model::TextModel;
use crate::planner::{PlanSource, Planner};
use crate::task::{Task, TaskBook, TaskStatus};

pub const EMPTY_BOOK_INSIGHT: &str = "Start creating tasks to get personalized insights!";

pub const FALLBACK_INSIGHTS: [&str; 5] = [
    "You're building great productivity habits!",
    "Consider breaking down large tasks into smaller milestones.",
    "Try scheduling your most important tasks during your peak hours.",
    "Track your progress regularly to stay motivated.",
    "Review and adjust your task estimates based on actual completion times.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insights {
    pub source: PlanSource,
    pub items: Vec<String>,
}

impl Insights {
    fn fallback() -> Self {
        Self {
            source: PlanSource::Fallback,
            items: FALLBACK_INSIGHTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn categories(tasks: &[&Task]) -> String {
    tasks
        .iter()
        .map(|t| t.category.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_insights_prompt(book: &TaskBook) -> String {
    let (completed, active): (Vec<&Task>, Vec<&Task>) = book
        .tasks
        .iter()
        .partition(|t| t.status == TaskStatus::Completed);

    let mut p = String::new();
    p.push_str("You are a productivity coach reviewing a user's task list. ");
    p.push_str("Give 3-5 concise, actionable and encouraging insights.\n\n");
    p.push_str(&format!("Completed tasks: {}\n", completed.len()));
    p.push_str(&format!("Active tasks: {}\n", active.len()));
    p.push_str(&format!("Completed categories: [{}]\n", categories(&completed)));
    p.push_str(&format!("Active categories: [{}]\n\n", categories(&active)));
    p.push_str("Cover productivity patterns, category preferences, time management, ");
    p.push_str("areas for improvement and personal recommendations.\n");
    p.push_str("Reply with a JSON array of strings only, e.g. [\"Insight 1\", \"Insight 2\"].\n");
    p
}

/// Extract the outermost JSON array of strings from model text.
pub fn parse_insights(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    let values: Vec<serde_json::Value> = serde_json::from_str(&text[start..=end]).ok()?;
    let items: Vec<String> = values
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

impl<M: TextModel> Planner<M> {
    pub fn generate_insights(&self, book: &TaskBook) -> Insights {
        if book.tasks.is_empty() {
            return Insights {
                source: PlanSource::Fallback,
                items: vec![EMPTY_BOOK_INSIGHT.to_string()],
            };
        }

        let Some(model) = self.model.as_ref() else {
            return Insights::fallback();
        };

        match model.generate(&build_insights_prompt(book)) {
            Ok(text) => match parse_insights(&text) {
                Some(items) => {
                    debug!(count = items.len(), "generate_insights: parsed");
                    Insights {
                        source: PlanSource::Ai,
                        items,
                    }
                }
                None => {
                    warn!("generate_insights: unparseable reply, using fallback");
                    Insights::fallback()
                }
            },
            Err(e) => {
                warn!(error = %e, "generate_insights: model call failed, using fallback");
                Insights::fallback()
            }
        }
    }
}
