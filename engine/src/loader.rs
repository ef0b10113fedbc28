//! Menu configuration loading and hot reload.
//!
//! One JSON file per node, named after the node (`home.json` defines
//! `home`). A reload parses the whole directory first and swaps the parsed
//! set atomically behind a read-mostly pointer only when every file
//! parsed, so a partially rewritten config directory is never observed and
//! in-flight turns keep their snapshot.

use crate::menu::MenuNode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use ussd_gateway_core::{GatewayError, Result};

/// An immutable, named set of menu nodes.
#[derive(Debug, Clone, Default)]
pub struct MenuSet {
    nodes: HashMap<String, MenuNode>,
}

impl MenuSet {
    /// Build a set from nodes; each node's `name` field is the key.
    #[must_use]
    pub fn from_nodes(nodes: impl IntoIterator<Item = MenuNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }

    /// Look up a node by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MenuNode> {
        self.nodes.get(name)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the set holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Parse every `*.json` file in a directory into a [`MenuSet`].
///
/// # Errors
///
/// Fails on the first unreadable or unparseable file; nothing is returned
/// partially.
pub fn load_menu_dir(dir: &Path) -> Result<MenuSet> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        GatewayError::Internal(format!("Cannot read menu directory {}: {e}", dir.display()))
    })?;

    let mut nodes = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| GatewayError::Internal(format!("Cannot read menu directory entry: {e}")))?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| {
            GatewayError::Internal(format!("Cannot read menu file {}: {e}", path.display()))
        })?;

        let mut node: MenuNode = serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Internal(format!("Invalid menu file {}: {e}", path.display()))
        })?;
        node.name = stem.to_string();
        nodes.push(node);
    }

    Ok(MenuSet::from_nodes(nodes))
}

/// Read-mostly holder of the active menu set.
pub struct MenuStore {
    inner: RwLock<Arc<MenuSet>>,
    dir: Option<PathBuf>,
}

impl MenuStore {
    /// Load the initial set from a directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read or any file is invalid.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let set = load_menu_dir(&dir)?;

        tracing::info!(dir = %dir.display(), menus = set.len(), "Loaded menu configuration");

        Ok(Self {
            inner: RwLock::new(Arc::new(set)),
            dir: Some(dir),
        })
    }

    /// Wrap an in-memory set; used by tests and fixtures.
    #[must_use]
    pub fn from_set(set: MenuSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(set)),
            dir: None,
        }
    }

    /// The active snapshot. In-flight turns keep the `Arc` they took even
    /// across a concurrent reload.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MenuSet> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-parse the directory and swap the active set.
    ///
    /// The swap happens only after the whole directory parsed; on any
    /// error the previous set stays active.
    ///
    /// # Errors
    ///
    /// Fails if this store was built from an in-memory set, the directory
    /// cannot be read, or any file is invalid.
    pub fn reload(&self) -> Result<usize> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| GatewayError::Internal("Menu store has no backing directory".into()))?;

        let set = load_menu_dir(dir)?;
        let count = set.len();

        match self.inner.write() {
            Ok(mut guard) => *guard = Arc::new(set),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(set),
        }

        tracing::info!(menus = count, "Reloaded menu configuration");
        Ok(count)
    }
}
