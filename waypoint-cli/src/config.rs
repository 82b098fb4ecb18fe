use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use waypoint_core::{ParsePolicy, PlannerOptions, ReconcilePolicy};

use crate::state::ensure_waypoint_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// "gemini" or "openai"
    pub provider: String,
    pub model: String,
    /// Provider default when unset.
    pub base_url: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    pub reconcile: ReconcilePolicy,
    pub lenient_parsing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Relative paths resolve under the waypoint home.
    pub path: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            temperature: 0.4,
        }
    }
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            reconcile: ReconcilePolicy::AbsorbIntoLast,
            lenient_parsing: false,
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: "tasks.json".to_string(),
        }
    }
}

impl PlannerSection {
    pub fn options(&self) -> PlannerOptions {
        PlannerOptions {
            parse_policy: if self.lenient_parsing {
                ParsePolicy::lenient()
            } else {
                ParsePolicy::default()
            },
            reconcile: self.reconcile,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_waypoint_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

/// Gemini model ids are addressed as `models/<id>`; keep the bare id.
pub fn normalize_model(model: &str) -> String {
    model.trim().strip_prefix("models/").unwrap_or(model.trim()).to_string()
}
