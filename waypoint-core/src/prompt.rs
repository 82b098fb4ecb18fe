//! Prompt construction for milestone generation.

use crate::MAX_MILESTONES;
use crate::MIN_MILESTONES;

/// Worked decompositions shown to the model: (total, [(name, days)]).
/// Each splits into five milestones weighted toward the implementation step.
const WORKED_EXAMPLES: &[(i64, [(&str, i64); 5])] = &[
    (
        10,
        [
            ("Research and outline", 1),
            ("Set up tools and materials", 2),
            ("Core implementation", 4),
            ("Testing and refinement", 2),
            ("Final review", 1),
        ],
    ),
    (
        30,
        [
            ("Research and outline", 3),
            ("Set up tools and materials", 6),
            ("Core implementation", 12),
            ("Testing and refinement", 6),
            ("Final review", 3),
        ],
    ),
    (
        108,
        [
            ("Research and outline", 11),
            ("Set up tools and materials", 22),
            ("Core implementation", 43),
            ("Testing and refinement", 21),
            ("Final review", 11),
        ],
    ),
];

/// Build the instruction text sent to the model.
///
/// `duration_days` is passed through as given; an inverted date range shows up
/// here as zero or negative.
pub fn build_milestone_prompt(
    task_name: &str,
    category: &str,
    duration_days: i64,
    additional_context: &str,
) -> String {
    let context = if additional_context.trim().is_empty() {
        "None provided"
    } else {
        additional_context.trim()
    };

    let mut p = String::new();
    p.push_str("You are an expert project planner. Break the task below into milestones.\n\n");
    p.push_str(&format!("Task: \"{}\"\n", task_name.trim()));
    p.push_str(&format!("Category: {}\n", category.trim()));
    p.push_str(&format!("Total duration: {duration_days} days\n"));
    p.push_str(&format!("Additional context: {context}\n\n"));

    p.push_str("Rules:\n");
    p.push_str(&format!(
        "- Produce between {MIN_MILESTONES} and {MAX_MILESTONES} milestones.\n"
    ));
    p.push_str(&format!(
        "- The day allocations MUST add up to exactly {duration_days} days.\n"
    ));
    p.push_str("- Give more days to the implementation work than to planning or review.\n");
    p.push_str("- Reply with one milestone per line and nothing else, formatted as:\n");
    p.push_str("  <number>. <milestone name> - <days> days\n\n");

    p.push_str("Examples:\n");
    for (total, steps) in WORKED_EXAMPLES {
        p.push_str(&format!("For {total} days:\n"));
        for (i, (name, days)) in steps.iter().enumerate() {
            p.push_str(&format!("{}. {} - {} days\n", i + 1, name, days));
        }
        p.push('\n');
    }

    p.push_str(&format!(
        "Now write the milestones for \"{}\" ({duration_days} days in total).\n",
        task_name.trim()
    ));
    p
}
