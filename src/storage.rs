//! Locating per-workspace storage folders.
//!
//! Layout (shared by VS Code and Cursor):
//! ```text
//! <config_dir>/<Product>/User/workspaceStorage/
//!     <identity hash>/
//!         workspace.json        {"folder": "file:///..."} or {"workspace": "file:///..."}
//!         state.vscdb           SQLite, ItemTable(key, value)
//!         state.vscdb.backup
//!         chatSessions/...      anything else the editor or its extensions keep
//! ```
use crate::report::Reporter;
use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "workspace.json";

/// An editor family and the directory holding its workspace storage folders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Editor {
    pub name: String,
    pub storage_dir: PathBuf,
}

impl Editor {
    pub fn new(name: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            storage_dir: storage_dir.into(),
        }
    }
}

/// VS Code and Cursor under the OS config directory
/// (`~/.config`, `~/Library/Application Support`, `%APPDATA%`).
pub fn default_editors() -> Vec<Editor> {
    let Some(config) = dirs::config_dir() else {
        return Vec::new();
    };
    [("VS Code", "Code"), ("Cursor", "Cursor")]
        .into_iter()
        .map(|(name, product)| {
            Editor::new(name, config.join(product).join("User").join("workspaceStorage"))
        })
        .collect()
}

#[derive(Deserialize)]
struct Descriptor {
    folder: Option<String>,
    workspace: Option<String>,
}

impl Descriptor {
    fn matches(&self, uri: &str) -> bool {
        self.folder.as_deref() == Some(uri) || self.workspace.as_deref() == Some(uri)
    }
}

fn read_descriptor(folder: &Path) -> Result<Descriptor> {
    let path = folder.join(DESCRIPTOR_FILE);
    let content = fs::read_to_string(&path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

/// Find the storage folder under `base_dir` whose descriptor names `uri`.
///
/// Folders are scanned in name order and the first match wins. A missing base
/// directory, or no match, is `None`.
pub fn find_workspace_storage(
    base_dir: &Path,
    uri: &str,
    reporter: &dyn Reporter,
) -> Option<PathBuf> {
    let entries = match fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) => {
            reporter.debug(&format!("Cannot read {}: {}", base_dir.display(), e));
            return None;
        }
    };

    let mut folders: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut matches = folders.into_iter().filter(|folder| {
        if !folder.join(DESCRIPTOR_FILE).exists() {
            return false;
        }
        match read_descriptor(folder) {
            Ok(descriptor) => descriptor.matches(uri),
            Err(e) => {
                reporter.debug(&format!("Skipping {}: {:#}", folder.display(), e));
                false
            }
        }
    });

    let first = matches.next()?;
    let others: Vec<String> = matches
        .map(|p| p.file_name().unwrap_or_default().to_string_lossy().into_owned())
        .collect();
    if !others.is_empty() {
        reporter.warn(&format!(
            "Several storage folders claim {}; using {}, ignoring {}",
            uri,
            first.display(),
            others.join(", ")
        ));
    }
    Some(first)
}
