//! Target construction from operator input.

use serde_json::{Map, Value, json};

use qqauto_types::{AGENT_ONLY, JOB_TYPE_CRON_AGENT_TURN, ROUTE_KINDS, SCHEDULE_KIND_CRON, Target};

use crate::{Result, TargetError};

pub const DEFAULT_TZ: &str = "Asia/Shanghai";
pub const DEFAULT_THINKING: &str = "low";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

// Smart heuristics defaults, in minutes except for `maxChars`.
pub const DEFAULT_MIN_SILENCE_MINUTES: u32 = 30;
pub const DEFAULT_ACTIVE_CONVERSATION_MINUTES: u32 = 25;
pub const DEFAULT_RANDOM_INTERVAL_MIN_MINUTES: u32 = 30;
pub const DEFAULT_RANDOM_INTERVAL_MAX_MINUTES: u32 = 60;
pub const DEFAULT_MAX_CHARS: u32 = 36;

/// Operator-supplied fields for one target.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    /// Explicit id. Derived from the route when `None`.
    pub id: Option<String>,
    /// `user:<id>`, `group:<id>` or `guild:<id>`.
    pub route: String,
    /// Five-field cron expression, passed through unvalidated.
    pub cron: String,
    /// IANA timezone the cron expression is evaluated in.
    pub tz: String,
    /// Instruction sent to the agent on each trigger.
    pub message: String,
    /// Effort hint label for the agent turn.
    pub thinking: String,
    pub timeout_seconds: u64,
    pub enabled: bool,
    /// Quiet time required in the conversation before a proactive turn.
    pub min_silence_minutes: u32,
    /// Window in which recent traffic counts as an active conversation.
    pub active_conversation_minutes: u32,
    pub random_interval_min_minutes: u32,
    pub random_interval_max_minutes: u32,
    /// Length cap for the generated message.
    pub max_chars: u32,
}

impl TargetSpec {
    /// Required fields only; everything else at its default.
    pub fn new(route: impl Into<String>, cron: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            route: route.into(),
            cron: cron.into(),
            tz: DEFAULT_TZ.to_string(),
            message: message.into(),
            thinking: DEFAULT_THINKING.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            enabled: true,
            min_silence_minutes: DEFAULT_MIN_SILENCE_MINUTES,
            active_conversation_minutes: DEFAULT_ACTIVE_CONVERSATION_MINUTES,
            random_interval_min_minutes: DEFAULT_RANDOM_INTERVAL_MIN_MINUTES,
            random_interval_max_minutes: DEFAULT_RANDOM_INTERVAL_MAX_MINUTES,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// Accept only `user:`, `group:` and `guild:` routes.
pub fn validate_route(route: &str) -> Result<()> {
    let known = ROUTE_KINDS.iter().any(|kind| {
        route
            .strip_prefix(kind)
            .is_some_and(|rest| rest.starts_with(':'))
    });
    if known {
        Ok(())
    } else {
        Err(TargetError::InvalidRoute(route.to_string()))
    }
}

pub fn validate_random_interval(min: u32, max: u32) -> Result<()> {
    if max < min {
        return Err(TargetError::InvalidRandomInterval { min, max });
    }
    Ok(())
}

/// `user:12345` → `user-12345`.
pub fn route_to_default_id(route: &str) -> String {
    route.replace(':', "-")
}

/// Build a target record. The execution mode is always `agent-only`.
pub fn build_target(spec: &TargetSpec) -> Result<Target> {
    validate_random_interval(
        spec.random_interval_min_minutes,
        spec.random_interval_max_minutes,
    )?;
    validate_route(&spec.route)?;

    let id = match spec.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => route_to_default_id(&spec.route),
    };

    let job = json!({
        "type": JOB_TYPE_CRON_AGENT_TURN,
        "schedule": { "kind": SCHEDULE_KIND_CRON, "expr": spec.cron, "tz": spec.tz },
        "message": spec.message,
        "thinking": spec.thinking,
        "timeoutSeconds": spec.timeout_seconds,
        "smart": {
            "enabled": true,
            "minSilenceMinutes": spec.min_silence_minutes,
            "activeConversationMinutes": spec.active_conversation_minutes,
            "randomIntervalMinMinutes": spec.random_interval_min_minutes,
            "randomIntervalMaxMinutes": spec.random_interval_max_minutes,
            "maxChars": spec.max_chars
        }
    });

    let mut fields = Map::new();
    fields.insert("id".to_string(), Value::String(id));
    fields.insert("enabled".to_string(), Value::Bool(spec.enabled));
    fields.insert("route".to_string(), Value::String(spec.route.clone()));
    fields.insert("executionMode".to_string(), Value::String(AGENT_ONLY.to_string()));
    fields.insert("job".to_string(), job);
    Ok(Target::from_map(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_route() {
        for ok in ["user:1", "group:abc", "guild:9:chan", "user:"] {
            assert!(validate_route(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "user", "users:1", "channel:1", "User:1", " user:1", "dm:1"] {
            assert!(
                matches!(validate_route(bad), Err(TargetError::InvalidRoute(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_id_from_route() {
        assert_eq!(route_to_default_id("user:12345"), "user-12345");
        assert_eq!(route_to_default_id("guild:1:2"), "guild-1-2");
    }

    #[test]
    fn test_build_target_shape() {
        let spec = TargetSpec::new("user:12345", "*/30 9-22 * * 1-5", "ping");
        let target = build_target(&spec).unwrap();
        assert_eq!(target.id(), "user-12345");
        assert!(target.is_agent_only());

        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "user-12345",
                "enabled": true,
                "route": "user:12345",
                "executionMode": "agent-only",
                "job": {
                    "type": "cron-agent-turn",
                    "schedule": { "kind": "cron", "expr": "*/30 9-22 * * 1-5", "tz": "Asia/Shanghai" },
                    "message": "ping",
                    "thinking": "low",
                    "timeoutSeconds": 600,
                    "smart": {
                        "enabled": true,
                        "minSilenceMinutes": 30,
                        "activeConversationMinutes": 25,
                        "randomIntervalMinMinutes": 30,
                        "randomIntervalMaxMinutes": 60,
                        "maxChars": 36
                    }
                }
            })
        );
    }

    #[test]
    fn test_explicit_id_wins() {
        let mut spec = TargetSpec::new("group:42", "0 9 * * *", "hi");
        spec.id = Some("morning".into());
        spec.enabled = false;
        let target = build_target(&spec).unwrap();
        assert_eq!(target.id(), "morning");
        assert_eq!(target.get("enabled"), Some(&json!(false)));
    }

    #[test]
    fn test_random_interval_order_enforced() {
        let mut spec = TargetSpec::new("user:1", "* * * * *", "x");
        spec.random_interval_min_minutes = 60;
        spec.random_interval_max_minutes = 30;
        assert!(matches!(
            build_target(&spec),
            Err(TargetError::InvalidRandomInterval { min: 60, max: 30 })
        ));

        spec.random_interval_max_minutes = 60;
        assert!(build_target(&spec).is_ok());
    }

    #[test]
    fn test_invalid_route_rejected() {
        let spec = TargetSpec::new("telegram:1", "* * * * *", "x");
        assert!(matches!(
            build_target(&spec),
            Err(TargetError::InvalidRoute(r)) if r == "telegram:1"
        ));
    }
}
