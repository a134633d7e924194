//! Normalization of the manager plugin entry and the load → mutate → save
//! session around it.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use qqauto_types::{ManagerConfig, PLUGIN_ID, Target};

use crate::document::{load_document, save_document};
use crate::{ConfigError, Result};

fn child_object<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    label: &str,
) -> Result<&'a mut Map<String, Value>> {
    parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ConfigError::Shape(format!("`{label}` is not an object")))
}

/// Return `plugins.entries.<PLUGIN_ID>`, creating missing levels and the
/// entry's `enabled`/`config` keys along the way.
fn manager_entry(document: &mut Map<String, Value>) -> Result<&mut Map<String, Value>> {
    let plugins = child_object(document, "plugins", "plugins")?;
    let entries = child_object(plugins, "entries", "plugins.entries")?;
    let label = format!("plugins.entries.{PLUGIN_ID}");
    let entry = child_object(entries, PLUGIN_ID, &label)?;
    entry
        .entry("enabled".to_string())
        .or_insert(Value::Bool(true));
    child_object(entry, "config", &format!("{label}.config"))?;
    Ok(entry)
}

/// Ensure the manager subtree exists and read it with defaults filled in.
///
/// The document gains any missing wrapper levels; the returned config
/// carries the defaults. Neither overwrites an explicit value.
pub fn normalize(document: &mut Map<String, Value>) -> Result<ManagerConfig> {
    let entry = manager_entry(document)?;
    let raw = entry
        .get("config")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let config = ManagerConfig::from_map(raw).map_err(|bad| {
        ConfigError::Shape(format!(
            "target at index {} is a {}, not an object",
            bad.index, bad.found
        ))
    })?;
    tracing::debug!(targets = config.targets.len(), "Normalized manager config");
    Ok(config)
}

/// Write `config` back into the manager entry of `document`.
pub fn store(document: &mut Map<String, Value>, config: &ManagerConfig) -> Result<()> {
    manager_entry(document)?.insert("config".to_string(), Value::Object(config.to_map()));
    Ok(())
}

/// A loaded document plus its manager config.
///
/// Mutations go through [`ConfigSession::targets_mut`], which marks the
/// session dirty; [`ConfigSession::save`] writes only when dirty.
#[derive(Debug)]
pub struct ConfigSession {
    path: PathBuf,
    document: Map<String, Value>,
    manager: ManagerConfig,
    dirty: bool,
}

impl ConfigSession {
    /// Load the document at `path` and normalize it.
    pub fn open(path: &Path) -> Result<Self> {
        let document = load_document(path)?;
        Self::from_document(path, document)
    }

    pub fn from_document(path: &Path, mut document: Map<String, Value>) -> Result<Self> {
        let manager = normalize(&mut document)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
            manager,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manager(&self) -> &ManagerConfig {
        &self.manager
    }

    pub fn targets(&self) -> &[Target] {
        &self.manager.targets
    }

    /// Mutable access to the target list. Marks the session dirty.
    pub fn targets_mut(&mut self) -> &mut Vec<Target> {
        self.dirty = true;
        &mut self.manager.targets
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The full document with the current manager config written in.
    pub fn document(&self) -> Result<Map<String, Value>> {
        let mut document = self.document.clone();
        store(&mut document, &self.manager)?;
        Ok(document)
    }

    /// Persist the document if anything was mutated. Returns whether a
    /// write happened.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        store(&mut self.document, &self.manager)?;
        save_document(&self.path, &self.document)?;
        self.dirty = false;
        tracing::info!(path = %self.path.display(), "Config saved");
        Ok(true)
    }
}
