use std::{fs, io, path::Path};

use tempfile::{Builder, TempDir};
use tracing::debug;

/// Owner bits every scratch directory keeps so its tree can be renamed into and removed
#[cfg(unix)]
pub(crate) const OWNER_RWX: u32 = 0o700;

/// A temporary directory removed on close or drop, even when its content left read-only directories behind
#[derive(Debug)]
pub struct ScratchDir(Option<TempDir>);

impl ScratchDir {
    /// Creates a scratch directory in the system temp area
    ///
    /// ## Errors
    ///
    /// Fails if the directory can't be created
    pub fn new(prefix: &str) -> io::Result<Self> {
        Builder::new().prefix(prefix).tempdir().map(|dir| Self(Some(dir)))
    }

    /// Creates a scratch directory under `parent`
    ///
    /// ## Errors
    ///
    /// Fails if the directory can't be created
    pub fn new_in(parent: impl AsRef<Path>, prefix: &str) -> io::Result<Self> {
        Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map(|dir| Self(Some(dir)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }

    /// Removes the directory and everything in it
    ///
    /// ## Errors
    ///
    /// Fails if part of the tree can't be removed
    pub fn close(mut self) -> io::Result<()> {
        match self.0.take() {
            Some(dir) => {
                unlock_tree(dir.path());
                dir.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            unlock_tree(dir.path());
        }
    }
}

/// Gives the owner full access back on `root` and every directory below it
fn unlock_tree(root: &Path) {
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        if let Err(err) = unlock_dir(&dir) {
            debug!("couldn't unlock {}: {err}", dir.display());
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        pending.extend(
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_dir()))
                .map(|entry| entry.path()),
        );
    }
}

#[cfg(unix)]
fn unlock_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::symlink_metadata(dir)?.permissions();
    permissions.set_mode(permissions.mode() | OWNER_RWX);
    fs::set_permissions(dir, permissions)
}

#[cfg(not(unix))]
fn unlock_dir(dir: &Path) -> io::Result<()> {
    let mut permissions = fs::symlink_metadata(dir)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(dir, permissions)
}
