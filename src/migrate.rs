use crate::identity::workspace_hash;
use crate::report::Reporter;
use crate::rewrite::{DEFAULT_MAX_FILE_SIZE, Replacement, rewrite_metadata_folder};
use crate::storage::{Editor, default_editors, find_workspace_storage};
use crate::utils::{copy_dir_all, workspace_uri};
use eyre::{Context, Result, eyre};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the migration needs, independent of how it was parsed (CLI/config file).
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub editors: Vec<Editor>,
    /// Don't copy the project folder; the destination must already exist.
    pub no_copy: bool,
    pub prefer_node: bool,
    pub max_file_size: u64,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            editors: default_editors(),
            no_copy: false,
            prefer_node: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePair {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl WorkspacePair {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    pub fn name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesOutcome {
    Copied,
    /// Destination was already there; copy skipped.
    Exists,
    /// `no_copy` was requested.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorOutcome {
    Migrated,
    NotFound,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceResult {
    pub name: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub status: Status,
    pub files: FilesOutcome,
    pub editors: Vec<(String, EditorOutcome)>,
    pub details: String,
}

impl WorkspaceResult {
    fn new(pair: &WorkspacePair, editors: &[Editor]) -> Self {
        Self {
            name: pair.name(),
            source: pair.source.clone(),
            dest: pair.dest.clone(),
            status: Status::Done,
            files: FilesOutcome::Skipped,
            editors: editors
                .iter()
                .map(|e| (e.name.clone(), EditorOutcome::Skipped))
                .collect(),
            details: String::new(),
        }
    }

    fn failed(mut self, files: FilesOutcome, details: impl Into<String>) -> Self {
        self.status = Status::Failed;
        self.files = files;
        self.details = details.into();
        self
    }

    pub fn editor(&self, name: &str) -> Option<EditorOutcome> {
        self.editors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| *outcome)
    }
}

/// Pair every subdirectory of `source_root` with the same name under `dest_root`.
pub fn collect_batch(source_root: &Path, dest_root: &Path) -> Result<Vec<WorkspacePair>> {
    if !source_root.is_dir() {
        return Err(eyre!(
            "Batch source {} is not a directory.",
            source_root.display()
        ));
    }
    let mut names: Vec<OsString> = fs::read_dir(source_root)
        .wrap_err_with(|| format!("Failed to list {}", source_root.display()))?
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name())
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| WorkspacePair::new(source_root.join(&name), dest_root.join(&name)))
        .collect())
}

/// Migrate each pair in turn. One pair failing never stops the others.
pub fn run_batch(
    pairs: &[WorkspacePair],
    config: &MigrateConfig,
    reporter: &dyn Reporter,
) -> Vec<WorkspaceResult> {
    pairs
        .iter()
        .map(|pair| {
            reporter.workspace_started(&pair.name());
            let result = migrate_workspace(pair, config, reporter);
            reporter.workspace_finished(&result);
            result
        })
        .collect()
}

/// Copy one project (unless suppressed) and carry its storage over for every editor.
pub fn migrate_workspace(
    pair: &WorkspacePair,
    config: &MigrateConfig,
    reporter: &dyn Reporter,
) -> WorkspaceResult {
    let name = pair.name();
    let mut result = WorkspaceResult::new(pair, &config.editors);

    if !pair.source.exists() {
        reporter.error(&format!(
            "Source path {} does not exist.",
            pair.source.display()
        ));
        return result.failed(FilesOutcome::Failed, "Source missing");
    }
    if pair.source == pair.dest {
        reporter.error(&format!(
            "Source and destination paths are the same for {}.",
            name
        ));
        return result.failed(FilesOutcome::Failed, "Same path");
    }

    result.files = if config.no_copy {
        if !pair.dest.exists() {
            reporter.error(&format!(
                "Destination {} does not exist, and --no-copy was specified.",
                pair.dest.display()
            ));
            return result.failed(FilesOutcome::Failed, "Dest missing (--no-copy)");
        }
        FilesOutcome::Skipped
    } else if pair.dest.exists() {
        reporter.warn(&format!(
            "Destination {} already exists. Skipping copy.",
            pair.dest.display()
        ));
        FilesOutcome::Exists
    } else {
        reporter.debug(&format!("Copying files for {}...", name));
        if let Err(e) = copy_dir_all(&pair.source, &pair.dest) {
            reporter.error(&format!("Failed to copy {}: {:#}", name, e));
            return result.failed(FilesOutcome::Failed, "Copy failed");
        }
        FilesOutcome::Copied
    };

    let (source_uri, dest_uri) = match (workspace_uri(&pair.source), workspace_uri(&pair.dest)) {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), _) | (_, Err(e)) => {
            reporter.error(&format!("{:#}", e));
            let files = result.files;
            return result.failed(files, "Unsupported path");
        }
    };
    let replacement = Replacement::new(
        pair.source.to_string_lossy(),
        pair.dest.to_string_lossy(),
        source_uri,
        dest_uri,
    );

    for (editor, (_, outcome)) in config.editors.iter().zip(result.editors.iter_mut()) {
        match migrate_editor(editor, pair, &replacement, config, reporter) {
            Ok(o) => *outcome = o,
            Err(err) => {
                // The destination hash is shared by every editor; no point going on.
                let stop = matches!(err, EditorError::Identity(_));
                let e = err.into_report();
                reporter.error(&format!(
                    "{} migration failed for {}: {:#}",
                    editor.name, name, e
                ));
                *outcome = EditorOutcome::Failed;
                result.status = Status::Failed;
                if !result.details.is_empty() {
                    result.details.push_str("; ");
                }
                result.details.push_str(&format!("{}: {:#}", editor.name, e));
                if stop {
                    break;
                }
            }
        }
    }

    result
}

enum EditorError {
    Identity(eyre::Report),
    Storage(eyre::Report),
}

impl EditorError {
    fn into_report(self) -> eyre::Report {
        match self {
            EditorError::Identity(e) | EditorError::Storage(e) => e,
        }
    }
}

fn migrate_editor(
    editor: &Editor,
    pair: &WorkspacePair,
    replacement: &Replacement,
    config: &MigrateConfig,
    reporter: &dyn Reporter,
) -> Result<EditorOutcome, EditorError> {
    let name = pair.name();
    let Some(source_storage) =
        find_workspace_storage(&editor.storage_dir, &replacement.from_uri, reporter)
    else {
        reporter.info(&format!(
            "No {} workspace storage found for {}",
            editor.name, name
        ));
        return Ok(EditorOutcome::NotFound);
    };
    reporter.debug(&format!(
        "Migrating {} storage {}",
        editor.name,
        source_storage.display()
    ));

    let dest_hash = workspace_hash(&pair.dest, config.prefer_node)
        .wrap_err("Failed to compute destination workspace hash")
        .map_err(EditorError::Identity)?;
    let dest_storage = editor.storage_dir.join(&dest_hash);
    if dest_storage == source_storage {
        return Err(EditorError::Storage(eyre!(
            "Destination storage {} is the source storage",
            dest_storage.display()
        )));
    }

    if dest_storage.exists() {
        fs::remove_dir_all(&dest_storage)
            .wrap_err_with(|| format!("Failed to remove old storage {}", dest_storage.display()))
            .map_err(EditorError::Storage)?;
    }
    if let Err(e) = copy_dir_all(&source_storage, &dest_storage) {
        // A half copy still names the source workspace and would shadow it on the next lookup.
        discard_partial_copy(&dest_storage, reporter);
        return Err(EditorError::Storage(
            e.wrap_err("Failed to copy workspace storage"),
        ));
    }

    let stats = rewrite_metadata_folder(&dest_storage, replacement, config.max_file_size, reporter);
    reporter.success(&format!(
        "{} migration complete for {} ({} rows, {} files rewritten)",
        editor.name, name, stats.store_rows, stats.files
    ));
    Ok(EditorOutcome::Migrated)
}

fn discard_partial_copy(dest_storage: &Path, reporter: &dyn Reporter) {
    if dest_storage.exists()
        && let Err(e) = fs::remove_dir_all(dest_storage)
    {
        reporter.warn(&format!(
            "Failed to remove partial copy {}: {}",
            dest_storage.display(),
            e
        ));
    }
}
