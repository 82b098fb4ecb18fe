use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$WAYPOINT_HOME`, or `~/.waypoint`.
pub fn waypoint_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("WAYPOINT_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".waypoint"))
}

pub fn ensure_waypoint_home() -> Result<PathBuf> {
    let dir = waypoint_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Resolve the task file; relative paths live under the waypoint home.
pub fn tasks_path(configured: &str) -> Result<PathBuf> {
    let p = PathBuf::from(configured);
    if p.is_absolute() {
        return Ok(p);
    }
    Ok(ensure_waypoint_home()?.join(p))
}
