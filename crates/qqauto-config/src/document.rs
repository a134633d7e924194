//! Whole-document load and save.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::{ConfigError, Result};

/// Read and parse the document. A missing or malformed file is an error;
/// no default document is synthesized.
pub fn load_document(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => {
            tracing::debug!(path = %path.display(), keys = map.len(), "Loaded config document");
            Ok(map)
        }
        _ => Err(ConfigError::Shape(format!(
            "{} does not contain a JSON object",
            path.display()
        ))),
    }
}

/// Two-space indented JSON with non-ASCII kept literal and one trailing newline.
pub fn render_document(document: &Map<String, Value>) -> Result<String> {
    let mut out = serde_json::to_string_pretty(document).map_err(ConfigError::Serialize)?;
    out.push('\n');
    Ok(out)
}

/// Replace the file at `path` with the rendered document.
///
/// The content goes to a temporary file in the same directory first and is
/// renamed over the target, so readers never see a half-written document.
/// A symlinked `path` is resolved first; the link itself stays in place.
pub fn save_document(path: &Path, document: &Map<String, Value>) -> Result<()> {
    let content = render_document(document)?;
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let resolved = match fs::canonicalize(path) {
        Ok(real) => real,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(write_err(e)),
    };
    let path = resolved.as_path();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Saved config document");
    Ok(())
}
