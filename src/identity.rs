//! Workspace identity hashing.
//!
//! VS Code (and its forks) name each per-workspace storage folder after
//! `md5(path + creation_marker)`, where the marker comes from the folder's own
//! filesystem metadata. A freshly copied project therefore gets a new storage
//! folder name, and we have to compute it the same way the editor will.
use std::borrow::Cow;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Same formula, evaluated by the editor's own runtime.
const NODE_SCRIPT: &str = r#"
const fs = require('fs');
const crypto = require('crypto');
let path = process.argv[1];
try {
    const stat = fs.statSync(path);
    let ctime;
    if (process.platform === 'linux') {
        ctime = stat.ino;
    } else if (process.platform === 'darwin') {
        ctime = stat.birthtime.getTime();
    } else if (process.platform === 'win32') {
        ctime = Math.floor(stat.birthtimeMs);
        path = path.toLowerCase();
    } else {
        ctime = stat.birthtime.getTime();
    }
    console.log(crypto.createHash('md5').update(path).update(String(ctime)).digest('hex'));
} catch (e) {
    console.error(e);
    process.exit(1);
}
"#;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Path not found or not statable: {}", path.display())]
    PathNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("No creation marker available for {} on {:?}", path.display(), platform)]
    MissingCreationMarker { path: PathBuf, platform: Platform },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// Pick the number that gets appended to the path before hashing.
    pub fn creation_marker(self, stat: &StatInfo) -> Option<u128> {
        match self {
            Platform::Linux => stat.inode.map(u128::from),
            Platform::MacOs | Platform::Windows | Platform::Other => stat.birth_millis,
        }
    }

    /// Windows hashes the lower-cased path.
    pub fn hash_path(self, path: &str) -> Cow<'_, str> {
        match self {
            Platform::Windows => Cow::Owned(path.to_lowercase()),
            _ => Cow::Borrowed(path),
        }
    }
}

/// The parts of `stat()` the identity formula reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatInfo {
    pub inode: Option<u64>,
    /// Birth time, whole milliseconds since the Unix epoch.
    pub birth_millis: Option<u128>,
}

impl StatInfo {
    pub fn from_metadata(meta: &Metadata) -> Self {
        #[cfg(unix)]
        let inode = {
            use std::os::unix::fs::MetadataExt;
            Some(meta.ino())
        };
        #[cfg(not(unix))]
        let inode = None;

        let birth_millis = meta
            .created()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis());

        Self {
            inode,
            birth_millis,
        }
    }
}

/// Lowercase hex MD5 of `path` followed by the decimal marker.
pub fn digest(path: &str, marker: u128) -> String {
    let input = format!("{}{}", path, marker);
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Pure Rust rendition of the editor's hash.
pub fn native_hash(path: &Path) -> Result<String, IdentityError> {
    let meta = fs::metadata(path).map_err(|source| IdentityError::PathNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let platform = Platform::current();
    let marker = platform
        .creation_marker(&StatInfo::from_metadata(&meta))
        .ok_or_else(|| IdentityError::MissingCreationMarker {
            path: path.to_path_buf(),
            platform,
        })?;
    let path_str = path
        .to_str()
        .ok_or_else(|| IdentityError::NonUtf8Path(path.to_path_buf()))?;
    Ok(digest(&platform.hash_path(path_str), marker))
}

/// Run the hash through a local `node`, if there is one.
pub fn node_hash(path: &Path) -> Option<String> {
    let output = Command::new("node")
        .arg("-e")
        .arg(NODE_SCRIPT)
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?.trim().to_string();
    let well_formed = hash.len() == 32 && hash.bytes().all(|b| b.is_ascii_hexdigit());
    well_formed.then_some(hash)
}

/// Identity hash for `path`. With `prefer_node`, node is tried first and the
/// native implementation is the fallback.
pub fn workspace_hash(path: &Path, prefer_node: bool) -> Result<String, IdentityError> {
    if prefer_node && let Some(hash) = node_hash(path) {
        return Ok(hash);
    }
    native_hash(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn digest_matches_known_value() {
        assert_eq!(digest("/proj/a", 12345), "8b4e617f73c66b105aa443596a89d54e");
    }

    #[test]
    fn digest_depends_on_path_and_marker() {
        let base = digest("/proj/a", 12345);
        assert_ne!(base, digest("/proj/b", 12345));
        assert_ne!(base, digest("/proj/a", 12346));
    }

    #[test]
    fn marker_follows_platform() {
        let stat = StatInfo {
            inode: Some(42),
            birth_millis: Some(1_700_000_000_123),
        };
        assert_eq!(Platform::Linux.creation_marker(&stat), Some(42));
        assert_eq!(
            Platform::MacOs.creation_marker(&stat),
            Some(1_700_000_000_123)
        );
        assert_eq!(
            Platform::Windows.creation_marker(&stat),
            Some(1_700_000_000_123)
        );
        assert_eq!(
            Platform::Other.creation_marker(&StatInfo::default()),
            None
        );
    }

    #[test]
    fn windows_lowercases_path() {
        assert_eq!(Platform::Windows.hash_path(r"C:\Users\Me\Proj"), r"c:\users\me\proj");
        assert_eq!(Platform::Linux.hash_path("/Home/Proj"), "/Home/Proj");
    }

    #[test]
    fn native_hash_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let first = native_hash(dir.path()).unwrap();
        let second = native_hash(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn distinct_folders_hash_differently() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        assert_ne!(native_hash(&a).unwrap(), native_hash(&b).unwrap());
    }

    #[test]
    fn missing_path_is_path_not_found() {
        let root = TempDir::new().unwrap();
        let err = workspace_hash(&root.path().join("nope"), false).unwrap_err();
        assert!(matches!(err, IdentityError::PathNotFound { .. }));
    }

    #[test]
    fn node_and_native_agree() {
        let dir = TempDir::new().unwrap();
        let Some(from_node) = node_hash(dir.path()) else {
            // node is not installed here
            return;
        };
        assert_eq!(from_node, native_hash(dir.path()).unwrap());
    }
}
