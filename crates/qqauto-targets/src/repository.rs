//! In-memory operations over the ordered target list.
//!
//! Every id-based lookup is a linear scan where the first match in list
//! order wins.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use qqauto_types::{AGENT_ONLY, Target};

/// Flat projection of a target for `list`.
///
/// Fields other than `enabled` are echoed as stored; a missing one shows
/// as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub id: Value,
    pub enabled: bool,
    pub route: Value,
    pub cron: Value,
    #[serde(rename = "executionMode")]
    pub execution_mode: Value,
}

fn or_empty(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or_else(|| Value::String(String::new()))
}

pub fn list_targets(targets: &[Target]) -> Vec<TargetSummary> {
    targets
        .iter()
        .map(|t| TargetSummary {
            id: or_empty(t.get("id")),
            enabled: t.is_enabled(),
            route: or_empty(t.get("route")),
            cron: or_empty(t.cron_expr()),
            execution_mode: or_empty(t.get("executionMode")),
        })
        .collect()
}

pub fn find_target<'a>(targets: &'a [Target], id: &str) -> Option<&'a Target> {
    targets.iter().find(|t| t.id() == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        }
    }
}

impl fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace the first target with the same id, or append.
pub fn upsert_target(targets: &mut Vec<Target>, target: Target) -> UpsertAction {
    let id = target.id();
    if let Some(slot) = targets.iter_mut().find(|t| t.id() == id) {
        tracing::info!(%id, "Replacing target");
        *slot = target;
        return UpsertAction::Updated;
    }
    tracing::info!(%id, "Appending target");
    targets.push(target);
    UpsertAction::Created
}

/// Set `enabled = false` on the first match. Other fields are untouched.
pub fn disable_target(targets: &mut [Target], id: &str) -> bool {
    match targets.iter_mut().find(|t| t.id() == id) {
        Some(target) => {
            target.set_enabled(false);
            tracing::info!(id, "Disabled target");
            true
        }
        None => false,
    }
}

pub fn remove_target(targets: &mut Vec<Target>, id: &str) -> bool {
    match targets.iter().position(|t| t.id() == id) {
        Some(index) => {
            targets.remove(index);
            tracing::info!(id, "Removed target");
            true
        }
        None => false,
    }
}

/// Force every target to `agent-only` and drop legacy `delivery` blocks.
/// Returns the number of corrections made.
pub fn migrate_agent_only(targets: &mut [Target]) -> usize {
    let mut changed = 0;
    for target in targets.iter_mut() {
        if !target.is_agent_only() {
            target.set_execution_mode(AGENT_ONLY);
            changed += 1;
        }
        if target.take_delivery().is_some() {
            changed += 1;
        }
    }
    tracing::info!(changed, "Migrated targets to agent-only");
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditIssueKind {
    #[serde(rename = "executionMode_not_agent_only")]
    ExecutionModeNotAgentOnly,
    #[serde(rename = "delivery_present")]
    DeliveryPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditIssue {
    pub id: String,
    pub issue: AuditIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub ok: bool,
    pub issues: Vec<AuditIssue>,
}

pub fn audit_targets(targets: &[Target]) -> AuditReport {
    let mut issues = Vec::new();
    for target in targets {
        if !target.is_agent_only() {
            issues.push(AuditIssue {
                id: target.id(),
                issue: AuditIssueKind::ExecutionModeNotAgentOnly,
            });
        }
        if target.has_delivery() {
            issues.push(AuditIssue {
                id: target.id(),
                issue: AuditIssueKind::DeliveryPresent,
            });
        }
    }
    if !issues.is_empty() {
        tracing::warn!(count = issues.len(), "Audit found policy issues");
    }
    AuditReport {
        ok: issues.is_empty(),
        issues,
    }
}
