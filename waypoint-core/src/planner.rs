//! Planner facade: prompt -> model -> parse -> pad/truncate -> reconcile,
//! with the deterministic generator behind every failure.
//!
//! `generate_milestones` never fails. What it does report is where the plan
//! came from ([`PlanSource`]) and, for fallback plans, why
//! ([`FallbackReason`]), so callers can tell an AI plan from a template.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fallback::fallback_milestones;
use crate::milestone::Milestone;
use crate::model::{ModelError, TextModel};
use crate::parser::{parse_response, Candidate, ParsePolicy};
use crate::prompt::build_milestone_prompt;
use crate::reconcile::{measure, reconcile, ReconcilePolicy, Reconciliation};
use crate::{MAX_MILESTONES, MIN_MILESTONES};

/// Inputs for one milestone-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub task_name: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub additional_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("task name is empty")]
    EmptyName,
    #[error("end date {end} must be after start date {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

impl PlanRequest {
    pub fn new(
        task_name: impl Into<String>,
        category: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            category: category.into(),
            start_date,
            end_date,
            additional_context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = context.into();
        self
    }

    /// Signed span; zero or negative for inverted ranges.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Boundary check for callers. The planner itself accepts any range.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.task_name.trim().is_empty() {
            return Err(RequestError::EmptyName);
        }
        if self.end_date <= self.start_date {
            return Err(RequestError::InvertedRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }
}

/// Provenance of a milestone sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Ai,
    #[default]
    Fallback,
}

/// Why the deterministic generator was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    ConfigurationMissing,
    BackendUnavailable(String),
    QuotaExceeded(String),
    EmptyResponse,
    UnparseableResponse,
}

impl FallbackReason {
    pub fn user_message(&self) -> String {
        const TEMPLATE: &str = "using a standard milestone template";
        match self {
            FallbackReason::ConfigurationMissing => {
                format!("No model API key is configured; {TEMPLATE}.")
            }
            FallbackReason::BackendUnavailable(e) => {
                format!("Could not get milestones from the AI model ({e}); {TEMPLATE}.")
            }
            FallbackReason::QuotaExceeded(_) => format!(
                "The AI model quota is exhausted. Try again later or upgrade your plan; {TEMPLATE} for now."
            ),
            FallbackReason::EmptyResponse => {
                format!("The AI model returned an empty reply; {TEMPLATE}.")
            }
            FallbackReason::UnparseableResponse => {
                format!("The AI reply contained no usable milestones; {TEMPLATE}.")
            }
        }
    }
}

impl From<ModelError> for FallbackReason {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::QuotaExceeded(msg) => FallbackReason::QuotaExceeded(msg),
            ModelError::Unavailable(msg) => FallbackReason::BackendUnavailable(msg),
        }
    }
}

/// Result of a planning request. Always holds 3..=5 milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub source: PlanSource,
    pub milestones: Vec<Milestone>,
    pub fallback_reason: Option<FallbackReason>,

    /// Fallback milestones appended to a short AI plan.
    pub padded: usize,
    pub reconciliation: Reconciliation,
}

impl Plan {
    pub fn is_ai(&self) -> bool {
        self.source == PlanSource::Ai
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannerOptions {
    pub parse_policy: ParsePolicy,
    pub reconcile: ReconcilePolicy,
}

pub struct Planner<M> {
    pub(crate) model: Option<M>,
    options: PlannerOptions,
}

impl<M: TextModel> Planner<M> {
    /// `None` means no credential: every request takes the fallback path.
    pub fn new(model: Option<M>) -> Self {
        Self {
            model,
            options: PlannerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PlannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn generate_milestones(&self, request: &PlanRequest) -> Plan {
        let duration = request.duration_days();
        debug!(task = %request.task_name, duration, "generate_milestones: called");

        let Some(model) = self.model.as_ref() else {
            return fallback_plan(request, FallbackReason::ConfigurationMissing);
        };

        let prompt = build_milestone_prompt(
            &request.task_name,
            &request.category,
            duration,
            &request.additional_context,
        );

        let text = match model.generate(&prompt) {
            Ok(text) => text,
            Err(e) => return fallback_plan(request, e.into()),
        };
        if text.trim().is_empty() {
            return fallback_plan(request, FallbackReason::EmptyResponse);
        }

        let candidates = parse_response(&text, &self.options.parse_policy);
        if candidates.is_empty() {
            return fallback_plan(request, FallbackReason::UnparseableResponse);
        }
        debug!(count = candidates.len(), "generate_milestones: parsed candidates");

        let mut milestones: Vec<Milestone> = candidates
            .into_iter()
            .map(|c| candidate_to_milestone(c, &request.task_name))
            .collect();

        let padded = pad_to_minimum(&mut milestones, &request.task_name, duration);
        milestones.truncate(MAX_MILESTONES);
        for (i, m) in milestones.iter_mut().enumerate() {
            m.id = i as u32 + 1;
        }

        let reconciliation = reconcile(
            &mut milestones,
            duration,
            &request.task_name,
            self.options.reconcile,
        );
        if reconciliation.diverged {
            warn!(
                target_days = reconciliation.target,
                total = reconciliation.total,
                "generate_milestones: 1-day floor kept total off target"
            );
        }

        Plan {
            source: PlanSource::Ai,
            milestones,
            fallback_reason: None,
            padded,
            reconciliation,
        }
    }
}

fn fallback_plan(request: &PlanRequest, reason: FallbackReason) -> Plan {
    let duration = request.duration_days();
    warn!(task = %request.task_name, ?reason, "generate_milestones: using fallback milestones");

    let milestones = fallback_milestones(&request.task_name, Some(duration));
    Plan {
        source: PlanSource::Fallback,
        reconciliation: measure(&milestones, duration),
        milestones,
        fallback_reason: Some(reason),
        padded: 0,
    }
}

fn candidate_to_milestone(c: Candidate, task_name: &str) -> Milestone {
    let mut m = Milestone::new(c.ordinal, c.name, c.estimated_days, task_name)
        .with_priority(c.priority.unwrap_or_default())
        .with_dependencies(c.dependencies);
    if let Some(description) = c.description {
        m = m.with_description(description);
    }
    m
}

/// Append fallback roles (skipping names already present) up to the minimum.
fn pad_to_minimum(milestones: &mut Vec<Milestone>, task_name: &str, duration: i64) -> usize {
    let mut added = 0;
    for extra in fallback_milestones(task_name, Some(duration)) {
        if milestones.len() >= MIN_MILESTONES {
            break;
        }
        if milestones.iter().any(|m| m.name.eq_ignore_ascii_case(&extra.name)) {
            continue;
        }
        let previous = milestones.last().map(|m| m.name.clone());
        milestones.push(extra.with_dependencies(previous.into_iter().collect()));
        added += 1;
    }
    if added > 0 {
        debug!(added, "pad_to_minimum: padded short plan");
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milestone::total_days;
    use std::cell::RefCell;

    struct Scripted {
        reply: Result<String, ModelError>,
        prompts: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn err(e: ModelError) -> Self {
            Self {
                reply: Err(e),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextModel for Scripted {
        fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(days: i64) -> PlanRequest {
        let start = date(2026, 3, 1);
        PlanRequest::new("Launch blog", "Personal", start, start + chrono::Duration::days(days))
    }

    #[test]
    fn test_ai_plan_reconciled_to_target() {
        let model = Scripted::ok(
            "1. Pick a platform - 1 day\n2. Write first posts - 4 days\n3. Design theme - 2 days\n4. Publish - 1 day",
        );
        let planner = Planner::new(Some(model));
        let plan = planner.generate_milestones(&request(10));

        assert_eq!(plan.source, PlanSource::Ai);
        assert_eq!(plan.fallback_reason, None);
        assert_eq!(plan.milestones.len(), 4);
        assert_eq!(total_days(&plan.milestones), 10);
        assert_eq!(plan.milestones[3].estimated_days, 3);
        assert_eq!(plan.milestones[0].estimated_days, 1);
        assert_eq!(plan.padded, 0);
    }

    #[test]
    fn test_prompt_carries_request() {
        let model = Scripted::ok("1. Something useful - 2 days");
        let planner = Planner::new(Some(&model));
        planner.generate_milestones(&request(14).with_context("weekends only"));
        let prompts = model.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Launch blog"));
        assert!(prompts[0].contains("14 days"));
        assert!(prompts[0].contains("weekends only"));
    }

    #[test]
    fn test_short_ai_plan_padded() {
        let model = Scripted::ok("1. Implementation - 3 days\n2. Outline posts - 2 days");
        let plan = Planner::new(Some(model)).generate_milestones(&request(10));

        assert_eq!(plan.source, PlanSource::Ai);
        assert_eq!(plan.padded, 1);
        let names: Vec<&str> = plan.milestones.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Implementation", "Outline posts", "Research and Planning"]);
        assert_eq!(plan.milestones[2].id, 3);
        assert_eq!(plan.milestones[2].dependencies, vec!["Outline posts".to_string()]);
        assert_eq!(total_days(&plan.milestones), 10);
    }

    #[test]
    fn test_long_ai_plan_truncated_then_reconciled() {
        let text = (1..=8)
            .map(|i| format!("{i}. Phase number {i} - 2 days"))
            .collect::<Vec<_>>()
            .join("\n");
        let plan = Planner::new(Some(Scripted::ok(&text))).generate_milestones(&request(12));
        assert_eq!(plan.milestones.len(), 5);
        assert_eq!(plan.milestones[4].name, "Phase number 5");
        assert_eq!(total_days(&plan.milestones), 12);
    }

    #[test]
    fn test_clamp_divergence_is_reported() {
        let model = Scripted::ok("1. Alpha - 1 day\n2. Bravo - 1 day\n3. Charlie - 1 day");
        let plan = Planner::new(Some(model)).generate_milestones(&request(1));
        assert_eq!(plan.source, PlanSource::Ai);
        assert_eq!(total_days(&plan.milestones), 3);
        assert!(plan.reconciliation.diverged);
        assert_eq!(plan.reconciliation.residual(), -2);
    }

    #[test]
    fn test_no_model_uses_fallback() {
        let planner: Planner<Scripted> = Planner::new(None);
        let plan = planner.generate_milestones(&request(10));
        assert_eq!(plan.source, PlanSource::Fallback);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::ConfigurationMissing));
        assert_eq!(total_days(&plan.milestones), 10);
    }

    #[test]
    fn test_quota_error_classified() {
        let model = Scripted::err(ModelError::QuotaExceeded("429".into()));
        let plan = Planner::new(Some(model)).generate_milestones(&request(10));
        assert_eq!(plan.source, PlanSource::Fallback);
        let reason = plan.fallback_reason.unwrap();
        assert!(matches!(reason, FallbackReason::QuotaExceeded(_)));
        assert!(reason.user_message().contains("Try again later"));
    }

    #[test]
    fn test_backend_error_falls_back() {
        let model = Scripted::err(ModelError::Unavailable("connection refused".into()));
        let plan = Planner::new(Some(model)).generate_milestones(&request(8));
        assert!(matches!(
            plan.fallback_reason,
            Some(FallbackReason::BackendUnavailable(_))
        ));
        assert_eq!(plan.milestones.len(), 3);
    }

    #[test]
    fn test_empty_and_unparseable_replies() {
        let plan = Planner::new(Some(Scripted::ok("  \n"))).generate_milestones(&request(8));
        assert_eq!(plan.fallback_reason, Some(FallbackReason::EmptyResponse));

        let plan = Planner::new(Some(Scripted::ok("I cannot help with that.")))
            .generate_milestones(&request(8));
        assert_eq!(plan.fallback_reason, Some(FallbackReason::UnparseableResponse));
        assert_eq!(plan.source, PlanSource::Fallback);
    }

    #[test]
    fn test_validate_boundary() {
        assert!(request(5).validate().is_ok());
        assert_eq!(
            request(0).validate(),
            Err(RequestError::InvertedRange {
                start: date(2026, 3, 1),
                end: date(2026, 3, 1)
            })
        );
        let mut r = request(5);
        r.task_name = "   ".into();
        assert_eq!(r.validate(), Err(RequestError::EmptyName));
    }

    #[test]
    fn test_inverted_range_still_yields_plan() {
        let plan = Planner::new(Some(Scripted::ok("1. Alpha - 2 days\n2. Bravo - 2 days\n3. Charlie - 2 days")))
            .generate_milestones(&request(-4));
        assert_eq!(plan.milestones.len(), 3);
        assert!(plan.milestones.iter().all(|m| m.estimated_days >= 1));
        assert!(plan.reconciliation.diverged);
    }
}
