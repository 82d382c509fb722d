//! # workspace-migrate
//!
//! Move or duplicate a project folder without losing what VS Code and Cursor
//! remember about it: open editors, UI state, and AI chat history.
//!
//! ## What it does
//!
//! Both editors keep per-workspace state in
//! `<config>/<Product>/User/workspaceStorage/<hash>/`, where `<hash>` is derived
//! from the folder's path and its inode (Linux) or birth time (macOS, Windows).
//! A copied or renamed project therefore starts with an empty history. This tool:
//!
//! 1. copies the project folder (unless `--no-copy`),
//! 2. finds the storage folder whose `workspace.json` names the old location,
//! 3. copies it under the hash of the new location,
//! 4. rewrites the old path and `file://` URI inside `workspace.json`, the
//!    `state.vscdb` SQLite store, and every other text file in the folder.
//!
//! The source project and its storage folder are never modified.
//!
//! ## Usage
//!
//! ```sh
//! # Copy ~/code/app to ~/work/app and carry its state over
//! workspace-migrate --source ~/code/app --dest ~/work/app
//!
//! # Folder already moved by hand
//! workspace-migrate --source ~/code/app --dest ~/work/app --no-copy
//!
//! # Every project under ~/code → ~/work
//! workspace-migrate --source ~/code --dest ~/work --batch
//! ```
//!
//! Preferences can be persisted in `~/.config/workspace-migrate/config.toml`.
//!
//! Close the editors before migrating; they hold `state.vscdb` open.
pub mod identity;
pub mod migrate;
pub mod report;
pub mod rewrite;
pub mod storage;
pub mod utils;
