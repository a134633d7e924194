//! Command dispatch: resolve paths → load → normalize → run → save.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};

use qqauto_config::{ConfigError, ConfigSession, PathOverrides, resolve_paths};
use qqauto_targets::{
    TargetError, TargetQuery, audit_targets, build_target, disable_target, list_targets,
    migrate_agent_only, remove_target, upsert_target, verify_target,
};

use crate::Commands;

/// The single JSON document a command prints on success.
pub enum Output {
    Pretty(Value),
    Compact(Value),
}

impl Output {
    fn pretty<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Output::Pretty(serde_json::to_value(value)?))
    }

    pub fn print(&self) {
        match self {
            Output::Pretty(v) => println!(
                "{}",
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            ),
            Output::Compact(v) => println!("{v}"),
        }
    }
}

pub fn run(overrides: &PathOverrides, command: Commands) -> Result<Output> {
    let paths = resolve_paths(overrides)?;
    tracing::info!(
        command = command.name(),
        config = %paths.config_path.display(),
        "Running command"
    );
    let mut session = ConfigSession::open(&paths.config_path)?;

    match command {
        Commands::List => Output::pretty(&json!({ "targets": list_targets(session.targets()) })),

        Commands::Audit => Output::pretty(&audit_targets(session.targets())),

        Commands::Verify { id, route } => {
            let query = TargetQuery {
                id: id.as_deref().filter(|s| !s.is_empty()),
                route: route.as_deref().filter(|s| !s.is_empty()),
            };
            Output::pretty(&verify_target(
                session.targets(),
                &paths.workspace_root,
                query,
            ))
        }

        Commands::MigrateAgentOnly => {
            let changed = migrate_agent_only(session.targets_mut());
            session.save()?;
            Ok(Output::Compact(
                json!({ "ok": true, "action": "migrated", "changed": changed }),
            ))
        }

        Commands::Upsert(args) => {
            let target = build_target(&args.to_spec())?;
            let (id, route) = (target.id(), target.route());
            let action = upsert_target(session.targets_mut(), target);
            session.save()?;
            Ok(Output::Compact(
                json!({ "ok": true, "action": action, "id": id, "route": route }),
            ))
        }

        Commands::Disable { id } => {
            if !disable_target(session.targets_mut(), &id) {
                return Err(TargetError::NotFound(id).into());
            }
            session.save()?;
            Ok(Output::Compact(
                json!({ "ok": true, "action": "disabled", "id": id }),
            ))
        }

        Commands::Remove { id } => {
            if !remove_target(session.targets_mut(), &id) {
                return Err(TargetError::NotFound(id).into());
            }
            session.save()?;
            Ok(Output::Compact(
                json!({ "ok": true, "action": "removed", "id": id }),
            ))
        }
    }
}

/// Structured form of a fatal error.
#[derive(Debug, Serialize)]
pub struct Failure {
    ok: bool,
    error: &'static str,
    message: String,
    #[serde(skip)]
    pub exit_code: u8,
}

impl Failure {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let (error, exit_code) = if let Some(e) = err.downcast_ref::<TargetError>() {
            let code = match e {
                TargetError::InvalidRoute(_) => "invalid_route",
                TargetError::InvalidRandomInterval { .. } => "invalid_random_interval",
                TargetError::NotFound(_) => "target_not_found",
            };
            (code, 2)
        } else if let Some(e) = err.downcast_ref::<ConfigError>() {
            let code = match e {
                ConfigError::Read { .. } | ConfigError::Write { .. } => "config_io",
                ConfigError::Parse { .. } => "config_parse",
                ConfigError::Shape(_) => "config_shape",
                ConfigError::Serialize(_) => "config_io",
                ConfigError::NoDirFound => "no_home_dir",
            };
            (code, 1)
        } else {
            ("internal", 1)
        };
        Self {
            ok: false,
            error,
            message: err.to_string(),
            exit_code,
        }
    }

    pub fn print(&self) {
        println!(
            "{}",
            serde_json::to_string(self).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes() {
        let err: anyhow::Error = TargetError::InvalidRoute("dm:1".into()).into();
        let failure = Failure::from_error(&err);
        assert_eq!(failure.error, "invalid_route");
        assert_eq!(failure.exit_code, 2);

        let err: anyhow::Error = ConfigError::NoDirFound.into();
        let failure = Failure::from_error(&err);
        assert_eq!(failure.error, "no_home_dir");
        assert_eq!(failure.exit_code, 1);

        let err = anyhow::anyhow!("boom");
        assert_eq!(Failure::from_error(&err).error, "internal");
    }

    #[test]
    fn test_failure_json_shape() {
        let err: anyhow::Error = TargetError::NotFound("x".into()).into();
        let value = serde_json::to_value(Failure::from_error(&err)).unwrap();
        assert_eq!(
            value,
            json!({ "ok": false, "error": "target_not_found", "message": "target not found: x" })
        );
    }
}
