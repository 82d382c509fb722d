//! Rewriting a copied storage folder so it points at the new workspace location.
use crate::report::Reporter;
use crate::storage::DESCRIPTOR_FILE;
use crate::utils::write_atomic;
use eyre::{Context, Result};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, params};
use serde_json::Value as Json;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const STORE_FILE: &str = "state.vscdb";
pub const STORE_BACKUP_FILE: &str = "state.vscdb.backup";

/// Default cap for auxiliary files; anything bigger is left alone.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Source → destination strings for one workspace move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub from_path: String,
    pub to_path: String,
    pub from_uri: String,
    pub to_uri: String,
}

impl Replacement {
    pub fn new(
        from_path: impl Into<String>,
        to_path: impl Into<String>,
        from_uri: impl Into<String>,
        to_uri: impl Into<String>,
    ) -> Self {
        Self {
            from_path: from_path.into(),
            to_path: to_path.into(),
            from_uri: from_uri.into(),
            to_uri: to_uri.into(),
        }
    }

    /// Replace source URIs and paths in one left-to-right pass. Where both
    /// could match at the same spot the URI wins, and substituted text is
    /// never scanned again. `None` if nothing matched.
    pub fn rewrite_str(&self, text: &str) -> Option<String> {
        let mut next_uri = find_from(text, &self.from_uri, 0);
        let mut next_path = find_from(text, &self.from_path, 0);
        if next_uri.is_none() && next_path.is_none() {
            return None;
        }

        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        loop {
            // Cached positions are always >= pos.
            let (at, from_len, to) = match (next_uri, next_path) {
                (Some(u), Some(p)) if p < u => (p, self.from_path.len(), &self.to_path),
                (Some(u), _) => (u, self.from_uri.len(), &self.to_uri),
                (None, Some(p)) => (p, self.from_path.len(), &self.to_path),
                (None, None) => break,
            };
            out.push_str(&text[pos..at]);
            out.push_str(to);
            pos = at + from_len;

            if next_uri.is_some_and(|u| u < pos) {
                next_uri = find_from(text, &self.from_uri, pos);
            }
            if next_path.is_some_and(|p| p < pos) {
                next_path = find_from(text, &self.from_path, pos);
            }
        }
        out.push_str(&text[pos..]);
        Some(out)
    }

    /// Byte-level entry point. Content that is not UTF-8 is treated as binary
    /// and never touched.
    pub fn rewrite_bytes(&self, content: &[u8]) -> Option<Vec<u8>> {
        let text = std::str::from_utf8(content).ok()?;
        self.rewrite_str(text).map(String::into_bytes)
    }
}

/// First occurrence of `needle` at or after `start`.
fn find_from(haystack: &str, needle: &str, start: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack[start..].find(needle).map(|at| at + start)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub descriptor_updated: bool,
    pub store_rows: usize,
    pub files: usize,
}

/// Point `workspace.json` at the destination URI. Returns whether the file changed.
pub fn rewrite_descriptor(path: &Path, to_uri: &str) -> Result<bool> {
    let content =
        fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let mut doc: Json = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

    let Some(obj) = doc.as_object_mut() else {
        return Ok(false);
    };
    let field = if obj.contains_key("folder") {
        "folder"
    } else if obj.contains_key("workspace") {
        "workspace"
    } else {
        return Ok(false);
    };
    if obj.get(field).and_then(Json::as_str) == Some(to_uri) {
        return Ok(false);
    }
    obj.insert(field.to_string(), Json::String(to_uri.to_string()));

    let out = serde_json::to_string_pretty(&doc).wrap_err("Failed to serialize descriptor")?;
    write_atomic(path, out.as_bytes())?;
    Ok(true)
}

/// Rewrite text values of `ItemTable` in place. Returns the number of rows updated.
///
/// Non-text values and the schema are never touched; a database without
/// `ItemTable` is left as is.
pub fn rewrite_store(db_path: &Path, replacement: &Replacement) -> Result<usize> {
    let mut conn = Connection::open(db_path)
        .wrap_err_with(|| format!("Failed to open database: {}", db_path.display()))?;

    let has_table: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'ItemTable')",
            [],
            |row| row.get(0),
        )
        .wrap_err("Failed to inspect schema")?;
    if !has_table {
        return Ok(0);
    }

    let updates: Vec<(Value, String)> = {
        let mut stmt = conn
            .prepare("SELECT key, value FROM ItemTable")
            .wrap_err("Failed to prepare query")?;
        let mut rows = stmt.query([]).wrap_err("Failed to execute query")?;
        let mut updates = Vec::new();
        while let Some(row) = rows.next().wrap_err("Failed to read row")? {
            let ValueRef::Text(bytes) = row.get_ref(1)? else {
                continue;
            };
            let Some(new_value) = std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| replacement.rewrite_str(text))
            else {
                continue;
            };
            updates.push((row.get::<_, Value>(0)?, new_value));
        }
        updates
    };

    if updates.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction().wrap_err("Failed to begin transaction")?;
    {
        let mut stmt = tx
            .prepare("UPDATE ItemTable SET value = ?1 WHERE key = ?2")
            .wrap_err("Failed to prepare update")?;
        for (key, value) in &updates {
            stmt.execute(params![value, key])
                .wrap_err("Failed to update row")?;
        }
    }
    tx.commit().wrap_err("Failed to commit")?;
    Ok(updates.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRewrite {
    Rewritten,
    Unchanged,
    Binary,
    TooLarge,
}

pub fn rewrite_file(path: &Path, replacement: &Replacement, max_size: u64) -> Result<FileRewrite> {
    let len = fs::metadata(path)
        .wrap_err_with(|| format!("Failed to stat {}", path.display()))?
        .len();
    if len > max_size {
        return Ok(FileRewrite::TooLarge);
    }
    let content = fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let Ok(text) = std::str::from_utf8(&content) else {
        return Ok(FileRewrite::Binary);
    };
    match replacement.rewrite_str(text) {
        Some(new_content) => {
            write_atomic(path, new_content.as_bytes())?;
            Ok(FileRewrite::Rewritten)
        }
        None => Ok(FileRewrite::Unchanged),
    }
}

/// The store, its backup and SQLite side files are handled by `rewrite_store`.
fn is_store_file(name: &str) -> bool {
    name.starts_with(STORE_FILE)
}

/// Rewrite every other file under `dir`. Returns the number of files changed.
///
/// The top-level descriptor is skipped; `rewrite_descriptor` owns it.
pub fn rewrite_files(
    dir: &Path,
    replacement: &Replacement,
    max_size: u64,
    reporter: &dyn Reporter,
) -> usize {
    let mut changed = 0;
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                reporter.warn(&format!("Cannot walk {}: {}", dir.display(), e));
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        let is_descriptor = entry.depth() == 1 && name == DESCRIPTOR_FILE;
        if !entry.file_type().is_file() || is_descriptor || is_store_file(&name) {
            continue;
        }
        match rewrite_file(entry.path(), replacement, max_size) {
            Ok(FileRewrite::Rewritten) => {
                changed += 1;
                reporter.debug(&format!("Rewrote {}", entry.path().display()));
            }
            Ok(FileRewrite::TooLarge) => {
                reporter.debug(&format!("Skipped large file {}", entry.path().display()));
            }
            Ok(FileRewrite::Unchanged | FileRewrite::Binary) => {}
            Err(e) => reporter.warn(&format!("Error updating file: {:#}", e)),
        }
    }
    changed
}

/// Rewrite a freshly copied storage folder: descriptor, store (and its backup),
/// then every remaining file. Individual failures become warnings.
pub fn rewrite_metadata_folder(
    folder: &Path,
    replacement: &Replacement,
    max_size: u64,
    reporter: &dyn Reporter,
) -> RewriteStats {
    let mut stats = RewriteStats::default();

    let descriptor = folder.join(DESCRIPTOR_FILE);
    if descriptor.exists() {
        match rewrite_descriptor(&descriptor, &replacement.to_uri) {
            Ok(updated) => stats.descriptor_updated = updated,
            Err(e) => reporter.warn(&format!("Error updating descriptor: {:#}", e)),
        }
    }

    for name in [STORE_FILE, STORE_BACKUP_FILE] {
        let db_path = folder.join(name);
        if !db_path.exists() {
            continue;
        }
        match rewrite_store(&db_path, replacement) {
            Ok(rows) => stats.store_rows += rows,
            Err(e) => reporter.warn(&format!("Error updating SQLite DB: {:#}", e)),
        }
    }

    stats.files = rewrite_files(folder, replacement, max_size, reporter);
    stats
}
