use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Plugin entry id under `plugins.entries` that owns the manager config.
pub const PLUGIN_ID: &str = "qq-automation-manager";

/// The only execution mode sanctioned by current policy.
pub const AGENT_ONLY: &str = "agent-only";

/// Job type written by the builder.
pub const JOB_TYPE_CRON_AGENT_TURN: &str = "cron-agent-turn";

/// Schedule kind written by the builder.
pub const SCHEDULE_KIND_CRON: &str = "cron";

/// Recognized route kinds. A route is `<kind>:<identifier>`.
pub const ROUTE_KINDS: [&str; 3] = ["user", "group", "guild"];

// ──────────────────── Manager Config ────────────────────

/// Keys every manager config carries, with the value filled in when the
/// key is missing. An existing value is never replaced, whatever its type.
///
/// - `enabled`: manager switch read by the scheduler
/// - `configVersion`: schema version of the config object
/// - `reconcileOnStartup`: reconcile targets into jobs at gateway start
/// - `reconcileIntervalMs`: periodic reconcile interval
/// - `pruneOrphans`: drop scheduler jobs with no matching target
/// - `strictAgentOnly`: refuse targets that are not `agent-only`
pub fn manager_defaults() -> [(&'static str, Value); 6] {
    [
        ("enabled", Value::Bool(true)),
        ("configVersion", Value::from(1)),
        ("reconcileOnStartup", Value::Bool(true)),
        ("reconcileIntervalMs", Value::from(120_000)),
        ("pruneOrphans", Value::Bool(false)),
        ("strictAgentOnly", Value::Bool(true)),
    ]
}

/// The `config` object of the manager plugin entry.
///
/// Settings stay as raw JSON in their original key order; only the
/// target list is lifted out into [`Target`] records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerConfig {
    settings: Map<String, Value>,
    /// Ordered target list. Insertion order is list and scan order.
    pub targets: Vec<Target>,
}

/// A `targets` entry that is not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTarget {
    pub index: usize,
    pub found: &'static str,
}

impl ManagerConfig {
    /// Fill in missing defaults and split out the target list.
    ///
    /// A `targets` value that is not a list is replaced by an empty one.
    pub fn from_map(mut settings: Map<String, Value>) -> Result<Self, MalformedTarget> {
        for (key, value) in manager_defaults() {
            settings.entry(key).or_insert(value);
        }
        let raw = settings
            .entry("targets")
            .or_insert_with(|| Value::Array(Vec::new()));
        let items = match raw.take() {
            Value::Array(items) => items,
            other => {
                tracing::warn!(
                    found = value_kind(&other),
                    "Manager config `targets` is not a list, resetting to empty"
                );
                Vec::new()
            }
        };
        let targets = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => Ok(Target::from_map(fields)),
                other => Err(MalformedTarget {
                    index,
                    found: value_kind(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { settings, targets })
    }

    /// The config object with the current target list written back in place.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut settings = self.settings.clone();
        let targets = self
            .targets
            .iter()
            .map(|t| Value::Object(t.as_map().clone()))
            .collect();
        settings.insert("targets".to_string(), Value::Array(targets));
        settings
    }

    /// Raw setting by key. `targets` reads as `null` here; use the field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truthiness of a JSON value: `null`, `false`, `0`, `""`, `[]` and `{}`
/// are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// String form used for id and route matching: strings as-is, other
/// scalars in their JSON spelling, missing or `null` as `""`.
fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ──────────────────── Target ────────────────────

/// One scheduled automation record.
///
/// Backed by the raw JSON object so fields this crate does not touch keep
/// their value, type and position across a load/save cycle. Accessors read
/// leniently; an off-type field behaves like a missing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(Map<String, Value>);

impl Target {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `id` in string form; a numeric id `7` reads as `"7"`.
    pub fn id(&self) -> String {
        text_of(self.0.get("id"))
    }

    pub fn route(&self) -> String {
        text_of(self.0.get("route"))
    }

    pub fn execution_mode(&self) -> Option<&str> {
        self.0.get("executionMode").and_then(Value::as_str)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.get("enabled").is_some_and(is_truthy)
    }

    pub fn is_agent_only(&self) -> bool {
        self.execution_mode() == Some(AGENT_ONLY)
    }

    /// Legacy non-agent delivery block. Presence alone counts, even `null`.
    pub fn has_delivery(&self) -> bool {
        self.0.contains_key("delivery")
    }

    pub fn job(&self) -> Option<&Map<String, Value>> {
        self.0.get("job").and_then(Value::as_object)
    }

    /// `job.schedule` when both levels are objects.
    pub fn schedule(&self) -> Option<&Map<String, Value>> {
        self.job()
            .and_then(|job| job.get("schedule"))
            .and_then(Value::as_object)
    }

    /// Raw `job.schedule.expr`, if any.
    pub fn cron_expr(&self) -> Option<&Value> {
        self.schedule().and_then(|s| s.get("expr"))
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.0.insert("enabled".to_string(), Value::Bool(enabled));
    }

    pub fn set_execution_mode(&mut self, mode: &str) {
        self.0
            .insert("executionMode".to_string(), Value::String(mode.to_string()));
    }

    /// Remove `delivery`, keeping the order of the remaining keys.
    pub fn take_delivery(&mut self) -> Option<Value> {
        self.0.shift_remove("delivery")
    }
}
