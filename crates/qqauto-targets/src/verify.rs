//! Cross-check of one target against the runtime evidence on disk.
//!
//! The scheduler writes per-route files under
//! `<workspace>/qq_sessions/<route>/meta/`:
//!
//! - `automation-latest.json`: one JSON object describing the last run
//! - `automation-state.ndjson`: append-only event log (existence only)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use qqauto_types::Target;

pub const SESSIONS_DIR: &str = "qq_sessions";
pub const META_DIR: &str = "meta";
pub const LATEST_FILE: &str = "automation-latest.json";
pub const STATE_LOG_FILE: &str = "automation-state.ndjson";

/// Keys `automation-latest.json` must carry.
pub const REQUIRED_LATEST_FIELDS: [&str; 5] =
    ["triggered", "produced", "skipped", "sent_by_channel", "trace"];

/// Keys copied into the report preview, in output order.
pub const PREVIEW_FIELDS: [&str; 7] = [
    "ts",
    "target_id",
    "triggered",
    "produced",
    "skipped",
    "sent_by_channel",
    "trace",
];

/// Which target to verify. `id` takes priority over `route`; with neither,
/// the first target is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetQuery<'a> {
    pub id: Option<&'a str>,
    pub route: Option<&'a str>,
}

impl TargetQuery<'_> {
    pub fn select<'t>(&self, targets: &'t [Target]) -> Option<&'t Target> {
        match (self.id, self.route) {
            (Some(id), _) => targets.iter().find(|t| t.id() == id),
            (None, Some(route)) => targets.iter().find(|t| t.route() == route),
            (None, None) => targets.first(),
        }
    }
}

/// Meta directory for `route`: the literal route as a path segment when that
/// directory exists, otherwise the variant with `:` replaced by `__`.
pub fn route_meta_dir(workspace_root: &Path, route: &str) -> PathBuf {
    let sessions = workspace_root.join(SESSIONS_DIR);
    let direct = sessions.join(route).join(META_DIR);
    if direct.exists() {
        return direct;
    }
    sessions.join(route.replace(':', "__")).join(META_DIR)
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VerifyReport {
    Found(TargetVerification),
    NotFound(TargetNotFound),
}

impl VerifyReport {
    pub fn is_found(&self) -> bool {
        matches!(self, VerifyReport::Found(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetNotFound {
    pub ok: bool,
    pub error: &'static str,
    pub target_id: String,
    pub route: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetVerification {
    pub ok: bool,
    pub target: TargetView,
    pub checks: VerifyChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_error: Option<String>,
    /// Populated only when the latest file parsed and has every required key.
    pub latest_preview: Map<String, Value>,
}

/// The selected target's identity fields as stored, `null` when missing.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    pub id: Value,
    pub enabled: Value,
    pub route: Value,
    #[serde(rename = "executionMode")]
    pub execution_mode: Value,
    pub schedule_kind: Value,
    pub schedule: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyChecks {
    pub agent_only: bool,
    pub no_delivery: bool,
    pub meta_dir: String,
    pub meta_dir_exists: bool,
    pub automation_latest_exists: bool,
    pub automation_latest_parsed: bool,
    pub latest_fields_ok: bool,
    pub automation_state_ndjson_exists: bool,
}

#[derive(Debug, Default)]
struct LatestEvidence {
    exists: bool,
    parsed: bool,
    fields_ok: bool,
    preview: Map<String, Value>,
    error: Option<String>,
}

fn read_latest(path: &Path) -> LatestEvidence {
    let mut evidence = LatestEvidence {
        exists: path.exists(),
        ..Default::default()
    };
    if !evidence.exists {
        return evidence;
    }

    let payload = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
    let payload = match payload {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Unreadable automation-latest.json: {e}");
            evidence.error = Some(e);
            return evidence;
        }
    };
    evidence.parsed = true;

    let Some(fields) = payload.as_object() else {
        evidence.error = Some("automation-latest.json is not a JSON object".to_string());
        return evidence;
    };
    evidence.fields_ok = REQUIRED_LATEST_FIELDS
        .iter()
        .all(|key| fields.contains_key(*key));
    if evidence.fields_ok {
        evidence.preview = PREVIEW_FIELDS
            .iter()
            .map(|key| {
                (
                    key.to_string(),
                    fields.get(*key).cloned().unwrap_or(Value::Null),
                )
            })
            .collect();
    }
    evidence
}

/// Select a target and report its policy checks and runtime evidence.
///
/// Never fails: a missing target or unreadable evidence shows up in the
/// report instead.
pub fn verify_target(
    targets: &[Target],
    workspace_root: &Path,
    query: TargetQuery<'_>,
) -> VerifyReport {
    let Some(selected) = query.select(targets) else {
        return VerifyReport::NotFound(TargetNotFound {
            ok: false,
            error: "target_not_found",
            target_id: query.id.unwrap_or_default().to_string(),
            route: query.route.unwrap_or_default().to_string(),
        });
    };

    let schedule = selected.schedule().cloned().unwrap_or_default();
    let field = |key: &str| selected.get(key).cloned().unwrap_or(Value::Null);
    let meta = route_meta_dir(workspace_root, &selected.route());
    let latest = read_latest(&meta.join(LATEST_FILE));
    let ndjson_exists = meta.join(STATE_LOG_FILE).exists();

    tracing::debug!(
        id = %selected.id(),
        meta = %meta.display(),
        latest_exists = latest.exists,
        latest_fields_ok = latest.fields_ok,
        "Verified target"
    );

    VerifyReport::Found(TargetVerification {
        ok: true,
        target: TargetView {
            id: field("id"),
            enabled: field("enabled"),
            route: field("route"),
            execution_mode: field("executionMode"),
            schedule_kind: schedule.get("kind").cloned().unwrap_or(Value::Null),
            schedule,
        },
        checks: VerifyChecks {
            agent_only: selected.is_agent_only(),
            no_delivery: !selected.has_delivery(),
            meta_dir: meta.display().to_string(),
            meta_dir_exists: meta.is_dir(),
            automation_latest_exists: latest.exists,
            automation_latest_parsed: latest.parsed,
            latest_fields_ok: latest.fields_ok,
            automation_state_ndjson_exists: ndjson_exists,
        },
        latest_error: latest.error,
        latest_preview: latest.preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{TargetSpec, build_target};
    use serde_json::json;

    fn targets() -> Vec<Target> {
        vec![
            build_target(&TargetSpec::new("user:1", "0 9 * * *", "a")).unwrap(),
            build_target(&TargetSpec::new("group:2", "0 10 * * *", "b")).unwrap(),
        ]
    }

    fn meta_dir(ws: &Path, segment: &str) -> PathBuf {
        let dir = ws.join(SESSIONS_DIR).join(segment).join(META_DIR);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn found(report: VerifyReport) -> TargetVerification {
        match report {
            VerifyReport::Found(v) => v,
            VerifyReport::NotFound(n) => panic!("target not found: {n:?}"),
        }
    }

    #[test]
    fn test_selection_priority() {
        let targets = targets();
        let by_id = TargetQuery { id: Some("group-2"), route: Some("user:1") };
        assert_eq!(by_id.select(&targets).unwrap().id(), "group-2");

        let by_route = TargetQuery { id: None, route: Some("user:1") };
        assert_eq!(by_route.select(&targets).unwrap().id(), "user-1");

        assert_eq!(TargetQuery::default().select(&targets).unwrap().id(), "user-1");
        assert!(TargetQuery::default().select(&[]).is_none());

        let missing = TargetQuery { id: Some("nope"), route: Some("user:1") };
        assert!(missing.select(&targets).is_none());
    }

    #[test]
    fn test_not_found_report() {
        let ws = tempfile::tempdir().unwrap();
        let report = verify_target(
            &targets(),
            ws.path(),
            TargetQuery { id: Some("X"), route: None },
        );
        assert!(!report.is_found());
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "ok": false, "error": "target_not_found", "target_id": "X", "route": "" })
        );
    }

    #[test]
    fn test_meta_dir_prefers_literal_route() {
        let ws = tempfile::tempdir().unwrap();
        let sanitized = ws.path().join(SESSIONS_DIR).join("user__1").join(META_DIR);
        assert_eq!(route_meta_dir(ws.path(), "user:1"), sanitized);

        let literal = meta_dir(ws.path(), "user:1");
        assert_eq!(route_meta_dir(ws.path(), "user:1"), literal);
    }

    #[test]
    fn test_no_evidence() {
        let ws = tempfile::tempdir().unwrap();
        let v = found(verify_target(&targets(), ws.path(), TargetQuery::default()));
        assert!(v.checks.agent_only);
        assert!(v.checks.no_delivery);
        assert!(!v.checks.meta_dir_exists);
        assert!(!v.checks.automation_latest_exists);
        assert!(!v.checks.latest_fields_ok);
        assert!(!v.checks.automation_state_ndjson_exists);
        assert!(v.latest_preview.is_empty());
        assert_eq!(v.target.schedule_kind, "cron");
    }

    #[test]
    fn test_complete_evidence() {
        let ws = tempfile::tempdir().unwrap();
        let dir = meta_dir(ws.path(), "user__1");
        fs::write(
            dir.join(LATEST_FILE),
            json!({
                "ts": "2026-01-01T09:00:00+08:00",
                "triggered": true,
                "produced": true,
                "skipped": false,
                "sent_by_channel": "qq",
                "trace": ["tick"],
                "extra": 1
            })
            .to_string(),
        )
        .unwrap();
        fs::write(dir.join(STATE_LOG_FILE), "{}\n").unwrap();

        let v = found(verify_target(
            &targets(),
            ws.path(),
            TargetQuery { id: None, route: Some("user:1") },
        ));
        assert!(v.checks.meta_dir_exists);
        assert!(v.checks.automation_latest_exists);
        assert!(v.checks.automation_latest_parsed);
        assert!(v.checks.latest_fields_ok);
        assert!(v.checks.automation_state_ndjson_exists);
        assert!(v.latest_error.is_none());
        let keys: Vec<&str> = v.latest_preview.keys().map(String::as_str).collect();
        assert_eq!(keys, PREVIEW_FIELDS);
        assert_eq!(v.latest_preview["target_id"], Value::Null);
        assert_eq!(v.latest_preview["sent_by_channel"], "qq");
    }

    #[test]
    fn test_missing_required_field() {
        let ws = tempfile::tempdir().unwrap();
        let dir = meta_dir(ws.path(), "user__1");
        fs::write(
            dir.join(LATEST_FILE),
            r#"{"triggered": 1, "produced": 1, "skipped": 0, "sent_by_channel": {}}"#,
        )
        .unwrap();

        let v = found(verify_target(&targets(), ws.path(), TargetQuery::default()));
        assert!(v.checks.automation_latest_exists);
        assert!(v.checks.automation_latest_parsed);
        assert!(!v.checks.latest_fields_ok);
        assert!(v.latest_preview.is_empty());
    }

    #[test]
    fn test_unparseable_evidence_is_reported() {
        let ws = tempfile::tempdir().unwrap();
        let dir = meta_dir(ws.path(), "user__1");
        fs::write(dir.join(LATEST_FILE), "{ truncated").unwrap();

        let v = found(verify_target(&targets(), ws.path(), TargetQuery::default()));
        assert!(v.checks.automation_latest_exists);
        assert!(!v.checks.automation_latest_parsed);
        assert!(!v.checks.latest_fields_ok);
        assert!(v.latest_error.is_some());
    }

    #[test]
    fn test_policy_checks_reflect_legacy_target() {
        let ws = tempfile::tempdir().unwrap();
        let legacy = json!({
            "id": "old",
            "route": "guild:5",
            "executionMode": "direct",
            "delivery": { "to": "guild:5" }
        });
        let legacy = Target::from_map(legacy.as_object().unwrap().clone());
        let v = found(verify_target(&[legacy], ws.path(), TargetQuery::default()));
        assert!(!v.checks.agent_only);
        assert!(!v.checks.no_delivery);
        assert!(v.target.schedule_kind.is_null());
        assert!(v.target.enabled.is_null());

        let out = serde_json::to_value(&v).unwrap();
        assert_eq!(out["target"]["schedule"], json!({}));
        assert_eq!(out["target"]["executionMode"], "direct");
        assert!(out.get("latest_error").is_none());
    }

    #[test]
    fn test_numeric_id_selected_by_string_form() {
        let ws = tempfile::tempdir().unwrap();
        let t = Target::from_map(json!({ "id": 7, "route": "user:7" }).as_object().unwrap().clone());
        let v = found(verify_target(
            &[t],
            ws.path(),
            TargetQuery { id: Some("7"), route: None },
        ));
        assert_eq!(v.target.id, json!(7));
        assert!(v.checks.meta_dir.ends_with("user__7/meta"));
    }
}
