mod commands;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use qqauto_config::PathOverrides;
use qqauto_targets::TargetSpec;
use qqauto_targets::builder::{
    DEFAULT_ACTIVE_CONVERSATION_MINUTES, DEFAULT_MAX_CHARS, DEFAULT_MIN_SILENCE_MINUTES,
    DEFAULT_RANDOM_INTERVAL_MAX_MINUTES, DEFAULT_RANDOM_INTERVAL_MIN_MINUTES, DEFAULT_THINKING,
    DEFAULT_TIMEOUT_SECONDS, DEFAULT_TZ,
};

#[derive(Parser)]
#[command(
    name = "qq-auto-targets",
    about = "Manage qq-automation-manager targets in openclaw.json"
)]
struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct LocationArgs {
    /// OpenClaw home dir (default: ~/.openclaw)
    #[arg(long, global = true)]
    openclaw_home: Option<String>,

    /// Explicit openclaw.json path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Explicit workspace root (for verify)
    #[arg(long, global = true)]
    workspace_root: Option<String>,
}

impl LocationArgs {
    fn overrides(&self) -> PathOverrides {
        PathOverrides {
            openclaw_home: self.openclaw_home.clone(),
            config: self.config.clone(),
            workspace_root: self.workspace_root.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List targets
    List,
    /// Create a target, or replace the one with the same id
    Upsert(UpsertArgs),
    /// Disable a target without removing it
    Disable {
        /// Id of the target to disable
        #[arg(long)]
        id: String,
    },
    /// Delete a target
    Remove {
        /// Id of the target to delete
        #[arg(long)]
        id: String,
    },
    /// Force every target to agent-only and drop legacy delivery blocks
    MigrateAgentOnly,
    /// Report targets that violate the agent-only policy
    Audit,
    /// Check one target against its runtime evidence
    Verify {
        /// Target id (takes priority over --route)
        #[arg(long)]
        id: Option<String>,

        /// Target route; with neither flag the first target is checked
        #[arg(long)]
        route: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::List => "list",
            Commands::Upsert(_) => "upsert",
            Commands::Disable { .. } => "disable",
            Commands::Remove { .. } => "remove",
            Commands::MigrateAgentOnly => "migrate-agent-only",
            Commands::Audit => "audit",
            Commands::Verify { .. } => "verify",
        }
    }
}

#[derive(Args, Debug)]
struct UpsertArgs {
    /// Target id (default: route with ':' replaced by '-')
    #[arg(long)]
    id: Option<String>,

    /// user:<id>, group:<id> or guild:<id>
    #[arg(long)]
    route: String,

    /// Cron expression, e.g. "*/30 9-22 * * 1-5"
    #[arg(long)]
    cron: String,

    /// IANA timezone for the cron expression
    #[arg(long, default_value = DEFAULT_TZ)]
    tz: String,

    /// Instruction sent to the agent on each trigger
    #[arg(long, allow_hyphen_values = true)]
    message: String,

    /// Effort hint for the agent turn
    #[arg(long, default_value = DEFAULT_THINKING)]
    thinking: String,

    /// Agent turn timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    timeout_seconds: u64,

    /// Create the target enabled (default)
    #[arg(long, overrides_with = "no_enabled")]
    enabled: bool,

    /// Create the target disabled
    #[arg(long = "no-enabled", overrides_with = "enabled")]
    no_enabled: bool,

    /// Minutes of silence required before a proactive turn
    #[arg(long, default_value_t = DEFAULT_MIN_SILENCE_MINUTES)]
    min_silence: u32,

    /// Minutes of recent traffic that count as an active conversation
    #[arg(long, default_value_t = DEFAULT_ACTIVE_CONVERSATION_MINUTES)]
    active_window: u32,

    /// Lower bound of the random interval between turns, in minutes
    #[arg(long, default_value_t = DEFAULT_RANDOM_INTERVAL_MIN_MINUTES)]
    random_min: u32,

    /// Upper bound of the random interval, in minutes (>= --random-min)
    #[arg(long, default_value_t = DEFAULT_RANDOM_INTERVAL_MAX_MINUTES)]
    random_max: u32,

    /// Length cap for the generated message
    #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
    max_chars: u32,
}

impl UpsertArgs {
    fn to_spec(&self) -> TargetSpec {
        let mut spec = TargetSpec::new(&self.route, &self.cron, &self.message);
        spec.id = self.id.clone().filter(|id| !id.is_empty());
        spec.tz = self.tz.clone();
        spec.thinking = self.thinking.clone();
        spec.timeout_seconds = self.timeout_seconds;
        spec.enabled = self.enabled || !self.no_enabled;
        spec.min_silence_minutes = self.min_silence;
        spec.active_conversation_minutes = self.active_window;
        spec.random_interval_min_minutes = self.random_min;
        spec.random_interval_max_minutes = self.random_max;
        spec.max_chars = self.max_chars;
        spec
    }
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries exactly one JSON document.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match commands::run(&cli.location.overrides(), cli.command) {
        Ok(output) => {
            output.print();
            ExitCode::SUCCESS
        }
        Err(err) => {
            let failure = commands::Failure::from_error(&err);
            failure.print();
            eprintln!("error: {err}");
            ExitCode::from(failure.exit_code)
        }
    }
}
