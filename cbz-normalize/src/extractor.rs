use std::{
    path::{Path, MAIN_SEPARATOR_STR},
    process::{Command, Stdio},
};

use camino::Utf8Path;
use tracing::debug;

use crate::{config::DEFAULT_UNRAR_PROGRAM, Error, Result};

/// Unpacks a rar archive into a directory.
/// Implemented by [`Unrar`] in production, faked in tests.
pub trait RarExtractor: Send + Sync {
    /// ## Errors
    ///
    /// Fails if the archive can't be fully extracted into `dest`
    fn extract(&self, archive: &Utf8Path, dest: &Path) -> Result<()>;
}

/// Runs an external `unrar` compatible program as `<program> x <archive> <dest>`.
/// Its output is discarded, only the exit status matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unrar {
    program: String,
}

impl Unrar {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Unrar {
    fn default() -> Self {
        Self::new(DEFAULT_UNRAR_PROGRAM)
    }
}

impl RarExtractor for Unrar {
    fn extract(&self, archive: &Utf8Path, dest: &Path) -> Result<()> {
        // unrar only reads the last argument as a destination when it ends with a separator
        let mut dest = dest.as_os_str().to_owned();
        dest.push(MAIN_SEPARATOR_STR);
        debug!("running {} x {archive} {dest:?}", self.program);

        let status = Command::new(&self.program)
            .arg("x")
            .arg(archive)
            .arg(&dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| Error::ExtractorSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(Error::ExtractorStatus {
                program: self.program.clone(),
                status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    use super::*;

    #[test]
    fn missing_program_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let unrar = Unrar::new("this-unrar-does-not-exist");

        let err = unrar
            .extract(Utf8Path::new("book.cbr"), dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(matches!(err, Error::ExtractorSpawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let unrar = Unrar::new("false");

        let err = unrar
            .extract(Utf8Path::new("book.cbr"), dir.path())
            .unwrap_err();

        assert!(matches!(err, Error::ExtractorStatus { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_a_success() {
        let dir = tempfile::tempdir().unwrap();

        Unrar::new("true")
            .extract(Utf8Path::new("book.cbr"), dir.path())
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn runs_the_program_with_extract_archive_and_directory_arguments() {
        use std::{fs, os::unix::fs::PermissionsExt};

        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let script = dir.path().join("fake-unrar");
        fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s|' \"$@\" > '{}'\n", args_file.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let dest = dir.path().join("out");

        Unrar::new(script.to_str().unwrap())
            .extract(Utf8Path::new("my book.cbr"), &dest)
            .unwrap();

        assert_eq!(
            fs::read_to_string(&args_file).unwrap(),
            format!("x|my book.cbr|{}/|", dest.display())
        );
    }
}
