use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use workspace_migrate::migrate::{
    self, EditorOutcome, FilesOutcome, MigrateConfig, Status, WorkspacePair, WorkspaceResult,
};
use workspace_migrate::report::ConsoleReporter;
use workspace_migrate::rewrite::DEFAULT_MAX_FILE_SIZE;
use workspace_migrate::storage::{Editor, default_editors};
use workspace_migrate::utils::absolutize;

/// Migrate VS Code and Cursor workspaces while preserving chat history.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source workspace or root folder path.
    #[arg(long, value_name = "PATH")]
    source: PathBuf,

    /// Destination workspace or root folder path.
    #[arg(long, value_name = "PATH")]
    dest: PathBuf,

    /// Skip copying the actual project folder.
    #[arg(long)]
    no_copy: bool,

    /// Treat source and dest as root folders containing multiple workspaces.
    #[arg(long)]
    batch: bool,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/workspace-migrate/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Always use the built-in hasher instead of asking `node`.
    #[arg(long)]
    no_node: bool,

    /// Print each storage folder and file touched.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bar and summary).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    prefer_node: Option<bool>,
    max_file_size: Option<u64>,
    editors: Option<Vec<Editor>>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("workspace-migrate/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn files_label(outcome: FilesOutcome) -> &'static str {
    match outcome {
        FilesOutcome::Copied => "Copied",
        FilesOutcome::Exists => "Exists",
        FilesOutcome::Skipped => "Skipped",
        FilesOutcome::Failed => "Failed",
    }
}

fn editor_label(outcome: EditorOutcome) -> &'static str {
    match outcome {
        EditorOutcome::Migrated => "Migrated",
        EditorOutcome::NotFound => "Not Found",
        EditorOutcome::Skipped => "Skipped",
        EditorOutcome::Failed => "Failed",
    }
}

fn print_summary(results: &[WorkspaceResult], editors: &[Editor]) {
    let mut header = vec!["Workspace".to_string(), "Status".into(), "Files".into()];
    header.extend(editors.iter().map(|e| e.name.clone()));
    header.push("Details".into());

    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            let mut row = vec![
                r.name.clone(),
                match r.status {
                    Status::Done => "Done".into(),
                    Status::Failed => "Failed".into(),
                },
                files_label(r.files).into(),
            ];
            row.extend(r.editors.iter().map(|(_, o)| editor_label(*o).to_string()));
            row.push(r.details.clone());
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("\nMigration Summary");
    println!("{}", render(&header));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    for row in &rows {
        println!("{}", render(row));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve the migration config (CLI > Config > Default)
    let config = MigrateConfig {
        editors: file_cfg.editors.unwrap_or_else(default_editors),
        no_copy: cli.no_copy,
        prefer_node: !cli.no_node && file_cfg.prefer_node.unwrap_or(true),
        max_file_size: file_cfg.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE),
    };
    if config.editors.is_empty() {
        return Err(eyre!(
            "Could not determine editor storage directories.\nSet [[editors]] in config.toml."
        ));
    }

    // 3. Build the list of workspace pairs
    let source_root = absolutize(&cli.source)?;
    let dest_root = absolutize(&cli.dest)?;
    let pairs = if cli.batch {
        let pairs = migrate::collect_batch(&source_root, &dest_root)?;
        if pairs.is_empty() {
            eprintln!("No directories found in {}", source_root.display());
            return Ok(());
        }
        pairs
    } else {
        vec![WorkspacePair::new(source_root, dest_root)]
    };

    // 4. Run
    let reporter = ConsoleReporter::new(pairs.len() as u64, cli.verbose, cli.quiet);
    let results = migrate::run_batch(&pairs, &config, &reporter);
    reporter.finish();

    if !cli.quiet {
        print_summary(&results, &config.editors);
    }

    let failed = results
        .iter()
        .filter(|r| r.status == Status::Failed)
        .count();
    if failed > 0 {
        return Err(eyre!("{} of {} workspace(s) failed", failed, results.len()));
    }
    if !cli.quiet {
        println!("\nAll done! You can now open the new folders in VS Code or Cursor.");
    }
    Ok(())
}
