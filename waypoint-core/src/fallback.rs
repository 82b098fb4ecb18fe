//! Deterministic milestone sets used when the model is unavailable or useless.

use crate::milestone::{clamp_days, Milestone, Priority};

/// Fixed roles, in order, with their priority.
const ROLES: [(&str, Priority); 3] = [
    ("Research and Planning", Priority::High),
    ("Implementation", Priority::High),
    ("Review and Finalize", Priority::Medium),
];

/// Day split when no duration is known.
const LEGACY_DAYS: [i64; 3] = [2, 5, 3];

/// Three milestones for `task_name`.
///
/// With a duration `d` the split is `d/4`, `d/2` and the remainder (floor
/// division), so the total matches `d` whenever no part hits the 1-day floor.
/// Without one the split is 2/5/3.
pub fn fallback_milestones(task_name: &str, duration_days: Option<i64>) -> Vec<Milestone> {
    let split = match duration_days {
        Some(d) => {
            let quarter = d.div_euclid(4);
            let half = d.div_euclid(2);
            [quarter, half, d - quarter - half]
        }
        None => LEGACY_DAYS,
    };

    let mut out: Vec<Milestone> = Vec::with_capacity(ROLES.len());
    for (i, ((name, priority), days)) in ROLES.iter().zip(split).enumerate() {
        let days = clamp_days(days);
        let dependencies = out.last().map(|prev| vec![prev.name.clone()]).unwrap_or_default();
        let m = Milestone::new(i as u32 + 1, *name, days, task_name)
            .with_priority(*priority)
            .with_description(role_description(i, task_name, days))
            .with_dependencies(dependencies);
        out.push(m);
    }
    out
}

fn role_description(role: usize, task_name: &str, days: u32) -> String {
    let task = if task_name.trim().is_empty() {
        "the task".to_string()
    } else {
        format!("\"{}\"", task_name.trim())
    };
    let span = crate::milestone::days_label(days);
    match role {
        0 => format!("Research requirements and plan the approach for {task} ({span})"),
        1 => format!("Carry out the main work for {task} ({span})"),
        _ => format!("Review, polish and wrap up {task} ({span})"),
    }
}
