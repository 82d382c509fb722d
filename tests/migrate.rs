use rusqlite::{Connection, params};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use workspace_migrate::identity::native_hash;
use workspace_migrate::migrate::{
    EditorOutcome, FilesOutcome, MigrateConfig, Status, WorkspacePair, migrate_workspace,
};
use workspace_migrate::report::{Level, Reporter};
use workspace_migrate::rewrite::DEFAULT_MAX_FILE_SIZE;
use workspace_migrate::storage::Editor;
use workspace_migrate::utils::workspace_uri;

struct Silent;

impl Reporter for Silent {
    fn report(&self, _level: Level, _message: &str) {}
}

struct Fixture {
    _root: TempDir,
    source: PathBuf,
    dest: PathBuf,
    vscode: PathBuf,
    cursor: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("proj").join("a");
        fs::create_dir_all(source.join("src")).unwrap();
        fs::write(source.join("src/main.js"), "console.log(1);\n").unwrap();
        let dest = root.path().join("proj").join("b");
        let vscode = root.path().join("Code/User/workspaceStorage");
        let cursor = root.path().join("Cursor/User/workspaceStorage");
        fs::create_dir_all(&vscode).unwrap();
        fs::create_dir_all(&cursor).unwrap();
        Self {
            _root: root,
            source,
            dest,
            vscode,
            cursor,
        }
    }

    fn config(&self, no_copy: bool) -> MigrateConfig {
        MigrateConfig {
            editors: vec![
                Editor::new("VS Code", &self.vscode),
                Editor::new("Cursor", &self.cursor),
            ],
            no_copy,
            prefer_node: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    fn pair(&self) -> WorkspacePair {
        WorkspacePair::new(&self.source, &self.dest)
    }

    fn source_str(&self) -> String {
        self.source.to_str().unwrap().to_string()
    }

    fn dest_str(&self) -> String {
        self.dest.to_str().unwrap().to_string()
    }

    /// Seed a VS Code storage folder for the source project.
    fn seed_vscode(&self) -> PathBuf {
        let folder = self.vscode.join("0123456789abcdef0123456789abcdef");
        fs::create_dir_all(folder.join("chatSessions")).unwrap();
        let uri = workspace_uri(&self.source).unwrap();
        fs::write(
            folder.join("workspace.json"),
            serde_json::json!({ "folder": uri }).to_string(),
        )
        .unwrap();
        fs::write(
            folder.join("chatSessions/session.json"),
            format!(r#"{{"uri":"{}/src/main.js","cwd":"{}"}}"#, uri, self.source_str()),
        )
        .unwrap();

        let conn = Connection::open(folder.join("state.vscdb")).unwrap();
        conn.execute_batch(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
        )
        .unwrap();
        let rows = [
            ("lastPath", format!("{}/src/main.js", self.source_str())),
            (
                "history.entries",
                format!(r#"[{{"editor":{{"resource":"{}/src/main.js"}}}}]"#, uri),
            ),
            ("theme", "dark".to_string()),
        ];
        for (key, value) in &rows {
            conn.execute(
                "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .unwrap();
        }
        folder
    }

    fn dest_storage(&self) -> PathBuf {
        self.vscode.join(native_hash(&self.dest).unwrap())
    }
}

fn store_value(folder: &Path, key: &str) -> String {
    let conn = Connection::open(folder.join("state.vscdb")).unwrap();
    conn.query_row("SELECT value FROM ItemTable WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .unwrap()
}

fn descriptor_folder(folder: &Path) -> String {
    let doc: Value =
        serde_json::from_str(&fs::read_to_string(folder.join("workspace.json")).unwrap()).unwrap();
    doc["folder"].as_str().unwrap().to_string()
}

#[test]
fn moves_descriptor_store_and_chat_sessions() {
    let fx = Fixture::new();
    let source_storage = fx.seed_vscode();

    let result = migrate_workspace(&fx.pair(), &fx.config(false), &Silent);

    assert_eq!(result.status, Status::Done, "{}", result.details);
    assert_eq!(result.files, FilesOutcome::Copied);
    assert_eq!(result.editor("VS Code"), Some(EditorOutcome::Migrated));
    assert_eq!(result.editor("Cursor"), Some(EditorOutcome::NotFound));
    assert!(fx.dest.join("src/main.js").is_file());

    let dest_storage = fx.dest_storage();
    let dest_uri = workspace_uri(&fx.dest).unwrap();
    assert_eq!(descriptor_folder(&dest_storage), dest_uri);
    assert_eq!(
        store_value(&dest_storage, "lastPath"),
        format!("{}/src/main.js", fx.dest_str())
    );
    let history = store_value(&dest_storage, "history.entries");
    assert!(history.contains(&format!("{}/src/main.js", dest_uri)));
    assert!(!history.contains(&fx.source_str()));
    assert_eq!(store_value(&dest_storage, "theme"), "dark");

    let chat = fs::read_to_string(dest_storage.join("chatSessions/session.json")).unwrap();
    assert!(chat.contains(&dest_uri));
    assert!(!chat.contains(&fx.source_str()));

    // The source storage is never touched.
    assert_eq!(
        descriptor_folder(&source_storage),
        workspace_uri(&fx.source).unwrap()
    );
    assert_eq!(
        store_value(&source_storage, "lastPath"),
        format!("{}/src/main.js", fx.source_str())
    );
}

#[test]
fn no_storage_anywhere_is_still_done() {
    let fx = Fixture::new();

    let result = migrate_workspace(&fx.pair(), &fx.config(false), &Silent);

    assert_eq!(result.status, Status::Done);
    assert_eq!(result.files, FilesOutcome::Copied);
    assert_eq!(result.editor("VS Code"), Some(EditorOutcome::NotFound));
    assert_eq!(result.editor("Cursor"), Some(EditorOutcome::NotFound));
}

#[test]
fn rerun_with_no_copy_overwrites_consistently() {
    let fx = Fixture::new();
    fx.seed_vscode();

    let first = migrate_workspace(&fx.pair(), &fx.config(false), &Silent);
    assert_eq!(first.status, Status::Done);

    // Leave a stale file behind; the second run must replace the whole folder.
    let dest_storage = fx.dest_storage();
    fs::write(dest_storage.join("stale.txt"), "left over").unwrap();

    let second = migrate_workspace(&fx.pair(), &fx.config(true), &Silent);
    assert_eq!(second.status, Status::Done, "{}", second.details);
    assert_eq!(second.files, FilesOutcome::Skipped);
    assert_eq!(second.editor("VS Code"), Some(EditorOutcome::Migrated));

    assert!(!dest_storage.join("stale.txt").exists());
    assert_eq!(
        descriptor_folder(&dest_storage),
        workspace_uri(&fx.dest).unwrap()
    );
    assert_eq!(
        store_value(&dest_storage, "lastPath"),
        format!("{}/src/main.js", fx.dest_str())
    );
}

#[test]
fn existing_destination_still_migrates_metadata() {
    let fx = Fixture::new();
    fx.seed_vscode();
    fs::create_dir_all(&fx.dest).unwrap();

    let result = migrate_workspace(&fx.pair(), &fx.config(false), &Silent);

    assert_eq!(result.status, Status::Done);
    assert_eq!(result.files, FilesOutcome::Exists);
    assert_eq!(result.editor("VS Code"), Some(EditorOutcome::Migrated));
    assert!(!fx.dest.join("src").exists());
    assert_eq!(
        descriptor_folder(&fx.dest_storage()),
        workspace_uri(&fx.dest).unwrap()
    );
}
