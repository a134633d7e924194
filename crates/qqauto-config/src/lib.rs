//! qqauto-config: locating, loading, normalizing and saving `openclaw.json`.
//!
//! The document is kept as an untyped JSON object; only the manager plugin
//! entry is read into [`qqauto_types::ManagerConfig`].

pub mod document;
pub mod manager;
pub mod paths;

use std::path::PathBuf;

use thiserror::Error;

pub use document::{load_document, render_document, save_document};
pub use manager::{ConfigSession, normalize};
pub use paths::{PathOverrides, ResolvedPaths, resolve_paths};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unexpected config shape: {0}")]
    Shape(String),
    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("home directory not found")]
    NoDirFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
