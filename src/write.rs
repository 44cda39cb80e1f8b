//! Incremental output writing.
//!
//! Every file the build produces goes through [`write_if_changed`]: the new
//! content is compared with what is already on disk and the write is skipped
//! when they match. Re-running a build over unchanged inputs therefore leaves
//! every mtime alone, which keeps rsync/deploy diffs and downstream caches
//! quiet.
//!
//! Writes that do happen are atomic: content goes to a temporary file in the
//! target directory which is then renamed over the destination. A reader (or
//! a failed build) never observes a half-written page.
//!
//! The temporary file takes over the permissions of the file it replaces;
//! new files get `0o666` minus the process umask, the same as `fs::write`.
//! A destination that is a symlink is resolved first, so the link stays a
//! link and its target receives the content.
//!
//! Callers must guarantee that no two writers target the same path at the
//! same time; the build pipeline does so by giving every output path exactly
//! one owning article.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What [`write_if_changed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Existing content was byte-identical; the filesystem was not touched.
    Unchanged,
    /// The file was created or replaced.
    Written,
}

/// Write `content` to `path` unless the file already holds exactly that.
pub fn write_if_changed(path: &Path, content: impl AsRef<[u8]>) -> Result<WriteOutcome, WriteError> {
    let content = content.as_ref();
    match fs::read(path) {
        Ok(existing) if existing == content => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(WriteError::new(path, e)),
    }
    write_always(path, content)?;
    Ok(WriteOutcome::Written)
}

/// Atomically replace `path` with `content`, whatever is there now.
pub fn write_always(path: &Path, content: impl AsRef<[u8]>) -> Result<(), WriteError> {
    let target = resolve_symlink(path).map_err(|e| WriteError::new(path, e))?;
    let mut tmp = temp_file_for(&target).map_err(|e| WriteError::new(path, e))?;
    tmp.write_all(content.as_ref())
        .map_err(|e| WriteError::new(path, e))?;
    tmp.persist(&target)
        .map_err(|e| WriteError::new(path, e.error))?;
    Ok(())
}

/// Create `path` with `content` only if nothing exists there yet.
///
/// Returns `true` when this call created the file. When several writers race
/// on the same path exactly one wins and the others return `false`; the
/// content is never observed half-written.
pub fn write_new(path: &Path, content: impl AsRef<[u8]>) -> Result<bool, WriteError> {
    if path.exists() {
        return Ok(false);
    }
    let mut tmp = temp_file_for(path).map_err(|e| WriteError::new(path, e))?;
    tmp.write_all(content.as_ref())
        .map_err(|e| WriteError::new(path, e))?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(WriteError::new(path, e.error)),
    }
}

/// The file a symlink at `path` points to, or `path` itself.
fn resolve_symlink(path: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path),
        Ok(_) => Ok(path.to_path_buf()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}

/// A temporary sibling of `path` carrying the permissions `path` should
/// end up with.
fn temp_file_for(path: &Path) -> io::Result<NamedTempFile> {
    let tmp = new_temp_in(parent_dir(path))?;
    match fs::metadata(path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    Ok(tmp)
}

#[cfg(unix)]
fn new_temp_in(dir: &Path) -> io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;
    // Subject to the umask, like any newly created file.
    tempfile::Builder::new()
        .permissions(fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn new_temp_in(dir: &Path) -> io::Result<NamedTempFile> {
    NamedTempFile::new_in(dir)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn creates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");

        let outcome = write_if_changed(&path, "<p>hi</p>").unwrap();

        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn same_content_twice_writes_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");

        let first = write_if_changed(&path, "same").unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        let second = write_if_changed(&path, "same").unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn different_content_writes_twice() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");

        assert_eq!(write_if_changed(&path, "v1").unwrap(), WriteOutcome::Written);
        assert_eq!(write_if_changed(&path, "v2").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn missing_parent_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no/such/dir/page.html");

        let err = write_if_changed(&path, "x").unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn write_always_rewrites_identical_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plugin.js");
        write_always(&path, "a").unwrap();
        write_always(&path, "a").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a");
    }

    #[test]
    fn write_new_first_writer_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.png");

        assert!(write_new(&path, "first").unwrap());
        assert!(!write_new(&path, "second").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn write_new_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.png");
        write_new(&path, "x").unwrap();
        write_new(&path, "x").unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("abc.png")]);
    }

    #[test]
    fn racing_writers_create_exactly_one_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.png");

        let created: Vec<(usize, bool)> = (0..16)
            .into_par_iter()
            .map(|i| (i, write_new(&path, format!("writer {i}")).unwrap()))
            .collect();

        let winners: Vec<usize> = created.iter().filter(|(_, c)| *c).map(|(i, _)| *i).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("writer {}", winners[0])
        );
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    // =========================================================================
    // Permissions and symlinks
    // =========================================================================

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("post.md");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_if_changed(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(mode(&path), 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn new_files_are_readable_by_others() {
        let tmp = TempDir::new().unwrap();
        let page = tmp.path().join("page.html");
        let asset = tmp.path().join("abc.png");

        write_if_changed(&page, "<p>hi</p>").unwrap();
        write_new(&asset, "png").unwrap();

        for path in [&page, &asset] {
            assert_eq!(mode(path) & 0o044, 0o044, "{} not world-readable", path.display());
        }
    }

    #[cfg(unix)]
    #[test]
    fn writes_through_symlinks() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("shared.md");
        let link = tmp.path().join("post.md");
        fs::write(&target, "old").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(write_if_changed(&link, "new").unwrap(), WriteOutcome::Written);

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }
}
