use std::{
    fs,
    io::{self, ErrorKind},
    path::Path,
};

use tracing::debug;

use crate::{Error, Result};

/// Recursively copies the content of `src` into `dest`, keeping file contents and permissions.
/// `dest` is created when missing. Symlinks are skipped.
/// Directories always keep the owner's read, write and search bits so the mirrored tree can be reworked and removed.
/// Returns the amount of copied files.
///
/// ## Errors
///
/// Fails on the first entry that can't be read, created or written
pub fn mirror_dir(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<usize> {
    let (src, dest) = (src.as_ref(), dest.as_ref());

    match fs::create_dir(dest) {
        Err(err) if err.kind() != ErrorKind::AlreadyExists => return Err(copy_error(dest, err)),
        _ => {}
    }

    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|err| copy_error(src, err))? {
        let entry = entry.map_err(|err| copy_error(src, err))?;
        let (from, to) = (entry.path(), dest.join(entry.file_name()));
        let file_type = entry.file_type().map_err(|err| copy_error(&from, err))?;

        if file_type.is_dir() {
            copied += mirror_dir(&from, &to)?;
        } else if file_type.is_file() {
            // `fs::copy` carries the permission bits over
            fs::copy(&from, &to).map_err(|err| copy_error(&from, err))?;
            debug!("copied {}", from.display());
            copied += 1;
        }
    }

    // Applied last so a read-only directory can still be filled
    let permissions = dir_permissions(src).map_err(|err| copy_error(src, err))?;
    fs::set_permissions(dest, permissions).map_err(|err| copy_error(dest, err))?;

    Ok(copied)
}

#[cfg(unix)]
fn dir_permissions(dir: &Path) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    use crate::scratch::OWNER_RWX;

    let mode = fs::metadata(dir)?.permissions().mode();
    Ok(fs::Permissions::from_mode((mode & 0o7777) | OWNER_RWX))
}

#[cfg(not(unix))]
fn dir_permissions(dir: &Path) -> io::Result<fs::Permissions> {
    let mut permissions = fs::metadata(dir)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    Ok(permissions)
}

fn copy_error(path: &Path, source: io::Error) -> Error {
    Error::Copy {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind as Kind;

    use super::*;

    #[test]
    fn mirrors_nested_trees() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::create_dir_all(src.path().join("empty")).unwrap();
        fs::write(src.path().join("1.jpg"), b"one").unwrap();
        fs::write(src.path().join("a/b/2.jpg"), b"two").unwrap();

        let copied = mirror_dir(src.path(), dest.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read(dest.path().join("1.jpg")).unwrap(), b"one");
        assert_eq!(fs::read(dest.path().join("a/b/2.jpg")).unwrap(), b"two");
        assert!(dest.path().join("empty").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let script = src.path().join("run.sh");
        fs::write(&script, b"#!/bin/sh").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        mirror_dir(src.path(), dest.path()).unwrap();

        let mode = fs::metadata(dest.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directories_stay_writable_for_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("ch")).unwrap();
        fs::write(src.path().join("ch/1.jpg"), b"1").unwrap();
        fs::set_permissions(src.path().join("ch"), fs::Permissions::from_mode(0o555)).unwrap();

        mirror_dir(src.path(), dest.path()).unwrap();

        let mode = fs::metadata(dest.path().join("ch"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        fs::rename(dest.path().join("ch/1.jpg"), dest.path().join("ch/001.jpg")).unwrap();

        fs::set_permissions(src.path().join("ch"), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn missing_source_is_a_copy_error() {
        let dest = tempfile::tempdir().unwrap();

        let err = mirror_dir(dest.path().join("nope"), dest.path().join("out")).unwrap_err();

        assert_eq!(err.kind(), Kind::Copy);
    }
}
