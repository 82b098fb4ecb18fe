//! waypoint-core: milestone planning pipeline and task storage for Waypoint

pub mod fallback;
pub mod insights;
pub mod milestone;
pub mod model;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod reconcile;
pub mod store;
pub mod task;

/// Fewest milestones a plan may hold.
pub const MIN_MILESTONES: usize = 3;
/// Most milestones a plan may hold.
pub const MAX_MILESTONES: usize = 5;

pub use fallback::fallback_milestones;
pub use insights::{build_insights_prompt, parse_insights, Insights};
pub use milestone::{Milestone, Priority};
pub use model::{ModelError, TextModel};
pub use parser::{parse, parse_json, parse_response, Candidate, ParseMode, ParsePolicy};
pub use planner::{
    FallbackReason, Plan, PlanRequest, PlanSource, Planner, PlannerOptions, RequestError,
};
pub use prompt::build_milestone_prompt;
pub use reconcile::{reconcile, ReconcilePolicy, Reconciliation};
pub use store::{JsonFileStore, StoreError, TaskStore};
pub use task::{BookError, Category, Task, TaskBook, TaskStats, TaskStatus};
