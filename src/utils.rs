use crate::identity::Platform;
use eyre::{Context, Result, eyre};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Everything except unreserved characters and `/` gets escaped, so `:` and
/// spaces come out as `%3A` and `%20` like the editor writes them.
const URI_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// `file://` URI for a workspace folder on the running platform.
pub fn workspace_uri(path: &Path) -> Result<String> {
    let path_str = path
        .to_str()
        .ok_or_else(|| eyre!("Path is not valid UTF-8: {}", path.display()))?;
    Ok(workspace_uri_for(path_str, Platform::current()))
}

pub fn workspace_uri_for(path: &str, platform: Platform) -> String {
    match platform {
        Platform::Windows => {
            let mut forward = path.replace('\\', "/");
            // Drive letters are stored lower-case: file:///c%3A/...
            if forward.as_bytes().get(1) == Some(&b':') {
                forward[..1].make_ascii_lowercase();
            }
            format!("file:///{}", utf8_percent_encode(&forward, URI_PATH))
        }
        _ => format!("file://{}", utf8_percent_encode(path, URI_PATH)),
    }
}

/// Absolute, lexically normalized path (no `.`/`..`, no trailing separator).
/// Symlinks are left alone.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .wrap_err_with(|| format!("Failed to resolve path: {}", path.display()))?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Recursively copy `src` into `dst`, creating `dst`. Symlinks are recreated on unix.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.wrap_err_with(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .wrap_err("Walked outside of the source tree")?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .wrap_err_with(|| format!("Failed to create directory: {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).wrap_err_with(|| {
                format!(
                    "Failed to copy {} → {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)
        .wrap_err_with(|| format!("Failed to read symlink: {}", src.display()))?;
    std::os::unix::fs::symlink(&link, dst)
        .wrap_err_with(|| format!("Failed to create symlink: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .wrap_err_with(|| format!("Failed to copy {} → {}", src.display(), dst.display()))
}

/// Replace `path` with `contents` via a sibling temp file, keeping its permissions.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre!("No parent directory for {}", path.display()))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .wrap_err_with(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .wrap_err_with(|| format!("Failed to write temp file for {}", path.display()))?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .wrap_err_with(|| format!("Failed to copy permissions of {}", path.display()))?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .wrap_err_with(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
