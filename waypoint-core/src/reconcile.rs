//! Duration reconciler: make milestone days add up to the requested span.

use serde::{Deserialize, Serialize};

use crate::milestone::{clamp_days, total_days, Milestone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Add the whole residual to the last milestone, floored at 1 day.
    #[default]
    AbsorbIntoLast,
    /// Scale every milestone by target/sum, truncating, floored at 1 day.
    Proportional,
}

/// What reconciliation did. `diverged` is set when the 1-day floor kept the
/// total away from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub target: i64,
    pub parsed_total: i64,
    pub total: i64,
    pub diverged: bool,
}

impl Reconciliation {
    pub fn residual(&self) -> i64 {
        self.target - self.parsed_total
    }
}

pub fn reconcile(
    milestones: &mut [Milestone],
    target: i64,
    task_name: &str,
    policy: ReconcilePolicy,
) -> Reconciliation {
    let parsed_total = total_days(milestones);

    if parsed_total != target && !milestones.is_empty() {
        match policy {
            ReconcilePolicy::AbsorbIntoLast => {
                absorb_into_last(milestones, target - parsed_total, task_name)
            }
            ReconcilePolicy::Proportional => {
                scale(milestones, target, parsed_total, task_name)
            }
        }
    }

    let total = total_days(milestones);
    Reconciliation {
        target,
        parsed_total,
        total,
        diverged: total != target,
    }
}

/// Report how far `milestones` are from `target` without changing them.
pub fn measure(milestones: &[Milestone], target: i64) -> Reconciliation {
    let total = total_days(milestones);
    Reconciliation {
        target,
        parsed_total: total,
        total,
        diverged: total != target,
    }
}

fn absorb_into_last(milestones: &mut [Milestone], residual: i64, task_name: &str) {
    if let Some(last) = milestones.last_mut() {
        last.estimated_days = clamp_days(i64::from(last.estimated_days) + residual);
        last.refresh_description(task_name);
    }
}

fn scale(milestones: &mut [Milestone], target: i64, parsed_total: i64, task_name: &str) {
    // parsed_total >= len >= 1, every milestone carries at least one day.
    let factor = target as f64 / parsed_total as f64;
    for m in milestones.iter_mut() {
        let scaled = (f64::from(m.estimated_days) * factor) as i64;
        let days = clamp_days(scaled);
        if days != m.estimated_days {
            m.estimated_days = days;
            m.refresh_description(task_name);
        }
    }
}
