//! Response parser: free-form model text -> milestone candidates.
//!
//! Expected line shape (what the prompt asks for):
//!   1. Research and gather materials - 2 days
//!
//! Models drift from the requested shape, so the policy (which lines count,
//! which vocabulary is noise) is explicit data in [`ParsePolicy`] and each
//! rule is its own predicate. The parser never reorders, merges or pads; that
//! is the planner's job.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::milestone::Priority;

/// Trailing "- N day(s)" (hyphen, en dash or em dash), optionally followed by
/// a parenthetical or closing punctuation and nothing else.
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+[-\u{2013}\u{2014}]\s*(?P<days>\d+)\s*days?\b\s*(?:\([^)]*\))?[\s.,;:!*_`]*$")
        .expect("duration pattern")
});

/// Bullet / numeral / "Step 3:" prefixes stripped in lenient mode.
static LENIENT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+>#\u{2022}]+\s*)*(?:(?i:step|milestone|phase)\s*\d+\s*[.):-]\s*|\d+\s*[.):-]\s*)?")
        .expect("lenient prefix pattern")
});

/// Lines whose first word is one of these are never milestones.
pub const DEFAULT_DENY_WORDS: &[&str] = &["example", "total", "requirement", "format", "note"];

/// Field labels that mark a line as form data when they precede a colon.
pub const DEFAULT_FIELD_LABELS: &[&str] = &["category", "duration", "date", "context"];

/// Names that are echoed prompt fields rather than milestones.
pub const DEFAULT_RESERVED_LABELS: &[&str] = &[
    "category",
    "total duration",
    "start date",
    "end date",
    "additional context",
    "task details",
    "requirements",
    "examples",
];

const MIN_NAME_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Only `"<digits>."` lines are candidates.
    #[default]
    Ordinal,
    /// Any surviving line, with bullets and numerals stripped.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicy {
    pub mode: ParseMode,
    pub deny_words: Vec<String>,
    pub field_labels: Vec<String>,
    pub reserved_labels: Vec<String>,
}

impl Default for ParsePolicy {
    fn default() -> Self {
        Self {
            mode: ParseMode::Ordinal,
            deny_words: to_owned(DEFAULT_DENY_WORDS),
            field_labels: to_owned(DEFAULT_FIELD_LABELS),
            reserved_labels: to_owned(DEFAULT_RESERVED_LABELS),
        }
    }
}

impl ParsePolicy {
    pub fn lenient() -> Self {
        Self {
            mode: ParseMode::Lenient,
            ..Self::default()
        }
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// One accepted milestone line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 1-based, in discovery order.
    pub ordinal: u32,
    pub name: String,
    pub estimated_days: u32,
    pub priority: Option<Priority>,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
}

impl Candidate {
    fn new(ordinal: u32, name: String, estimated_days: u32) -> Self {
        Self {
            ordinal,
            name,
            estimated_days,
            priority: None,
            description: None,
            dependencies: Vec::new(),
        }
    }
}

/// Parse model text, trying the JSON payload shape first and then lines.
pub fn parse_response(text: &str, policy: &ParsePolicy) -> Vec<Candidate> {
    match parse_json(text, policy) {
        Some(found) if !found.is_empty() => {
            debug!(count = found.len(), "parse_response: json payload");
            found
        }
        _ => parse(text, policy),
    }
}

/// Line parser.
pub fn parse(text: &str, policy: &ParsePolicy) -> Vec<Candidate> {
    let mut out = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || is_formatting_marker(line) {
            continue;
        }

        let body = match policy.mode {
            ParseMode::Ordinal => match strip_ordinal(line) {
                Some(rest) => rest,
                None => continue,
            },
            ParseMode::Lenient => strip_lenient_prefix(line),
        };

        if is_denied_line(body, policy) {
            debug!(line, "parse: denied line");
            continue;
        }

        let (without_days, days) = split_duration(body);

        if has_reserved_label_colon(without_days, policy) {
            debug!(line, "parse: reserved label");
            continue;
        }

        let name = clean_name(without_days);
        if !is_acceptable_name(&name, policy) {
            debug!(line, "parse: rejected name");
            continue;
        }

        let ordinal = out.len() as u32 + 1;
        out.push(Candidate::new(ordinal, name, days));
    }

    out
}

/// Lines made only of punctuation: rules, fences, table borders.
pub fn is_formatting_marker(line: &str) -> bool {
    !line.chars().any(char::is_alphanumeric)
}

/// If `line` begins with `"<digits>."`, return the text after it.
pub fn strip_ordinal(line: &str) -> Option<&str> {
    let line =
        line.trim_start_matches(|c: char| c == '*' || c == '#' || c == '>' || c.is_whitespace());
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    // "1.5 weeks" is a number, not an ordinal.
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim())
}

fn strip_lenient_prefix(line: &str) -> &str {
    match LENIENT_PREFIX_RE.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line,
    }
}

/// Deny-list check on the text after the ordinal.
///
/// Deny words only count as a label: the whole text before a colon, or the
/// whole line once the duration is gone. "Total: 10 days" is denied,
/// "Total body workout - 3 days" is not.
pub fn is_denied_line(body: &str, policy: &ParsePolicy) -> bool {
    let lower = body
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    let (label, has_colon) = match lower.split_once(':') {
        Some((label, _)) => (label, true),
        None => (split_duration(&lower).0, false),
    };
    let label = label.trim_end_matches(|c: char| !c.is_alphanumeric()).trim();

    if policy
        .deny_words
        .iter()
        .any(|w| label == w.as_str() || label.strip_suffix('s') == Some(w.as_str()))
    {
        return true;
    }

    if has_colon {
        let last = label.split_whitespace().last().unwrap_or("");
        return policy.field_labels.iter().any(|f| last == f.as_str());
    }
    false
}

/// Split off a trailing "- N days". Missing or zero durations become 1.
pub fn split_duration(body: &str) -> (&str, u32) {
    match DURATION_RE.captures(body) {
        Some(caps) => {
            let start = caps.get(0).map(|m| m.start()).unwrap_or(body.len());
            let days = caps["days"].parse::<u32>().unwrap_or(1).max(1);
            (&body[..start], days)
        }
        None => (body, 1),
    }
}

fn has_reserved_label_colon(text: &str, policy: &ParsePolicy) -> bool {
    let lower = text.to_lowercase();
    policy
        .reserved_labels
        .iter()
        .any(|label| lower.contains(&format!("{label}:")))
}

/// Keep text before the first colon and drop markdown emphasis.
fn clean_name(text: &str) -> String {
    let head = match text.split_once(':') {
        Some((head, _)) => head,
        None => text,
    };
    head.trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

/// Length and reserved-label checks on a cleaned name.
pub fn is_acceptable_name(name: &str, policy: &ParsePolicy) -> bool {
    if name.chars().count() < MIN_NAME_CHARS {
        return false;
    }
    let lower = name.trim().to_lowercase();
    !policy.reserved_labels.iter().any(|label| lower == *label)
}

#[derive(Debug, Deserialize)]
struct JsonPlan {
    #[serde(default)]
    milestones: Vec<JsonMilestone>,
}

#[derive(Debug, Deserialize)]
struct JsonMilestone {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "estimated_days", alias = "days")]
    duration: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Structured variant: `{"milestones": [{"name", "duration", ...}]}` embedded
/// anywhere in the text. `None` when there is no decodable object.
pub fn parse_json(text: &str, policy: &ParsePolicy) -> Option<Vec<Candidate>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let plan: JsonPlan = match serde_json::from_str(&text[start..=end]) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "parse_json: not a milestone payload");
            return None;
        }
    };

    let mut out = Vec::new();
    for m in plan.milestones {
        let Some(raw_name) = m.name else { continue };
        if has_reserved_label_colon(&raw_name, policy) {
            continue;
        }
        let name = clean_name(&raw_name);
        if !is_acceptable_name(&name, policy) {
            continue;
        }

        let days = m.duration.as_ref().and_then(json_days).unwrap_or(1);
        let mut c = Candidate::new(out.len() as u32 + 1, name, days);
        c.priority = m.priority.and_then(|p| p.parse().ok());
        c.description = m.description.filter(|d| !d.trim().is_empty());
        c.dependencies = m.dependencies;
        out.push(c);
    }

    Some(out)
}

fn json_days(v: &serde_json::Value) -> Option<u32> {
    let n = match v {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().trim_end_matches('s').trim_end_matches("day").trim().parse().ok()?,
        _ => return None,
    };
    Some(n.max(1.0).min(f64::from(u32::MAX)) as u32)
}
