//! Resolution of the openclaw home, config file and workspace root.

use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Caller-supplied location overrides. Empty strings count as unset.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub openclaw_home: Option<String>,
    pub config: Option<String>,
    pub workspace_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub workspace_root: PathBuf,
}

/// Default openclaw home (`~/.openclaw`).
pub fn default_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".openclaw"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve all locations. No existence checks are made here.
pub fn resolve_paths(overrides: &PathOverrides) -> Result<ResolvedPaths> {
    let home = match non_empty(&overrides.openclaw_home) {
        Some(h) => expand_tilde(h),
        None => default_home()?,
    };
    let config_path = non_empty(&overrides.config)
        .map(expand_tilde)
        .unwrap_or_else(|| home.join("openclaw.json"));
    let workspace_root = non_empty(&overrides.workspace_root)
        .map(expand_tilde)
        .unwrap_or_else(|| home.join("workspace"));

    tracing::debug!(
        config = %config_path.display(),
        workspace = %workspace_root.display(),
        "Resolved paths"
    );

    Ok(ResolvedPaths {
        home,
        config_path,
        workspace_root,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}
