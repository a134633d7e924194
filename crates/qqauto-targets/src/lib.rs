//! qqauto-targets: automation target management.
//!
//! Builds and validates target records, applies list/upsert/disable/remove
//! and policy operations over the ordered target list, and verifies a
//! target against the runtime evidence its scheduler leaves on disk.

pub mod builder;
pub mod repository;
pub mod verify;

use thiserror::Error;

pub use builder::{TargetSpec, build_target, route_to_default_id, validate_route};
pub use repository::{
    AuditIssue, AuditIssueKind, AuditReport, TargetSummary, UpsertAction, audit_targets,
    disable_target, find_target, list_targets, migrate_agent_only, remove_target, upsert_target,
};
pub use verify::{TargetQuery, VerifyReport, route_meta_dir, verify_target};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid route: {0} (expected user:<id>, group:<id> or guild:<id>)")]
    InvalidRoute(String),
    #[error("random interval max ({max}) must be >= min ({min})")]
    InvalidRandomInterval { min: u32, max: u32 },
    #[error("target not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, TargetError>;
