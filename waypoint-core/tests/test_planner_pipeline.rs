use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use waypoint_core::{
    fallback_milestones, parse, Category, JsonFileStore, ModelError, ParsePolicy, PlanRequest,
    PlanSource, Planner, TaskStatus, TaskStore, TextModel,
};

/// Replays a canned reply, or fails the way a backend would.
struct Canned(Result<String, ModelError>);

impl TextModel for Canned {
    fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        self.0.clone()
    }
}

struct Offline;

impl TextModel for Offline {
    fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Unavailable("dns lookup failed".to_string()))
    }
}

fn request(name: &str, days: i64) -> PlanRequest {
    let start = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
    PlanRequest::new(name, "Learning", start, start + Duration::days(days))
}

fn total(days: &[u32]) -> i64 {
    days.iter().map(|d| i64::from(*d)).sum()
}

/// Typical model reply: chatter, an echoed field block, then the list.
const CHATTY_REPLY: &str = "\
Sure! Here is a plan for your task.

Task Details:
1. Category: Learning
2. Start Date: Jan 1
3. Category

1. Research and gather materials - 2 days
2. **Work through the exercises** - 6 days
3. Build a small project: a CLI todo app - 5 days
4. Review and reflect - 1 day

Total: 14 days
";

#[test]
fn test_chatty_reply_end_to_end() {
    let planner = Planner::new(Some(Canned(Ok(CHATTY_REPLY.to_string()))));
    let plan = planner.generate_milestones(&request("Learn Rust", 14));

    assert_eq!(plan.source, PlanSource::Ai);
    let names: Vec<&str> = plan.milestones.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Research and gather materials",
            "Work through the exercises",
            "Build a small project",
            "Review and reflect",
        ]
    );
    let days: Vec<u32> = plan.milestones.iter().map(|m| m.estimated_days).collect();
    assert_eq!(days, vec![2, 6, 5, 1]);
    assert_eq!(total(&days), 14);
    assert!(!plan.reconciliation.diverged);
}

#[test]
fn test_prompted_line_shapes() {
    let policy = ParsePolicy::default();
    let cs = parse("1. Research and gather materials - 2 days", &policy);
    assert_eq!(cs[0].name, "Research and gather materials");
    assert_eq!(cs[0].estimated_days, 2);
    assert!(parse("3. Category", &policy).is_empty());
    assert!(parse("2. Start Date: Jan 1", &policy).is_empty());
}

#[test]
fn test_model_failure_never_escapes() {
    let plan = Planner::new(Some(Offline)).generate_milestones(&request("Learn Go", 10));
    assert_eq!(plan.source, PlanSource::Fallback);
    let days: Vec<u32> = plan.milestones.iter().map(|m| m.estimated_days).collect();
    assert_eq!(days, vec![2, 5, 3]);
}

#[test]
fn test_plan_persists_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("tasks.json"));

    let req = request("Learn Rust", 14);
    let plan = Planner::new(Some(Canned(Ok(CHATTY_REPLY.to_string())))).generate_milestones(&req);

    let mut book = store.load().unwrap();
    let created = Utc.with_ymd_and_hms(2026, 4, 1, 8, 30, 0).unwrap();
    let id = book.add_task(&req, Category::Learning, plan, created);
    store.save(&mut book).unwrap();

    let mut reloaded = store.load().unwrap();
    assert_eq!(reloaded, book);
    let task = reloaded.get(id).unwrap();
    assert_eq!(task.plan_source, PlanSource::Ai);
    assert_eq!(task.milestones.len(), 4);

    assert_eq!(reloaded.toggle_milestone(id, 1), Ok(true));
    reloaded.set_status(id, TaskStatus::InProgress).unwrap();
    store.save(&mut reloaded).unwrap();

    let again = store.load().unwrap();
    assert!(again.get(id).unwrap().milestones[0].completed);
    assert_eq!(again.get(id).unwrap().status, TaskStatus::InProgress);
    assert_eq!(again.revision, 2);
}

fn reply_strategy() -> impl Strategy<Value = Result<String, ModelError>> {
    let line = ("[A-Za-z ]{0,24}", 0u32..40);
    prop_oneof![
        prop::collection::vec(line, 0..9).prop_map(|lines| {
            Ok::<String, ModelError>(lines
                .iter()
                .enumerate()
                .map(|(i, (name, days))| format!("{}. {} - {} days", i + 1, name, days))
                .collect::<Vec<_>>()
                .join("\n"))
        }),
        "[ -~\n]{0,200}".prop_map(Ok::<String, ModelError>),
        Just(Err(ModelError::QuotaExceeded("429".to_string()))),
        Just(Err(ModelError::Unavailable("timeout".to_string()))),
    ]
}

proptest! {
    #[test]
    fn prop_plan_length_and_floor(reply in reply_strategy(), days in -30i64..400) {
        let plan = Planner::new(Some(Canned(reply))).generate_milestones(&request("Anything", days));
        prop_assert!((3..=5).contains(&plan.milestones.len()));
        prop_assert!(plan.milestones.iter().all(|m| m.estimated_days >= 1));
        let ids: Vec<u32> = plan.milestones.iter().map(|m| m.id).collect();
        let expected: Vec<u32> = (1..=plan.milestones.len() as u32).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn prop_ai_total_matches_target(days in 30i64..400, parts in prop::collection::vec(1u32..6, 3..=5)) {
        let text = parts
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}. Milestone step {} - {} days", i + 1, i + 1, d))
            .collect::<Vec<_>>()
            .join("\n");
        let plan = Planner::new(Some(Canned(Ok(text)))).generate_milestones(&request("Anything", days));
        prop_assert_eq!(plan.source, PlanSource::Ai);
        let sum: i64 = plan.milestones.iter().map(|m| i64::from(m.estimated_days)).sum();
        prop_assert_eq!(sum, days);
    }

    #[test]
    fn prop_fallback_deterministic(days in -10i64..500) {
        prop_assert_eq!(
            fallback_milestones("Same", Some(days)),
            fallback_milestones("Same", Some(days))
        );
    }
}
