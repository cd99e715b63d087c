use std::{io, path::PathBuf, process::ExitStatus};

use camino::Utf8PathBuf;

/// Coarse classification of an [`Error`], one per stage of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Extraction,
    Rename,
    Compression,
    Copy,
    Replace,
    FatalScan,
    Task,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("extraction error: {0}")]
    Extraction(#[source] cbz::Error),

    #[error("extraction error: couldn't create a working directory: {0}")]
    ExtractionDir(#[source] io::Error),

    #[error("extraction error: couldn't start `{program}`: {source}")]
    ExtractorSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("extraction error: `{program}` exited with {status}")]
    ExtractorStatus { program: String, status: ExitStatus },

    #[error("rename error: {from} -> {to}: {source}")]
    Rename {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rename error: {from} -> {to}: target already exists")]
    RenameCollision { from: Utf8PathBuf, to: Utf8PathBuf },

    #[error("rename error: couldn't walk {path}: {source}")]
    RenameWalk {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("compression error: {0}")]
    Compression(#[source] cbz::Error),

    #[error("copy error: {}: {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("replace error: {path}: {source}")]
    Replace {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("replace error: {output} is already produced by {claimed_by}")]
    OutputConflict {
        output: Utf8PathBuf,
        claimed_by: Utf8PathBuf,
    },

    #[error("working directory {path} can't be read: {source}")]
    FatalScan {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("conversion task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(_)
            | Self::ExtractionDir(_)
            | Self::ExtractorSpawn { .. }
            | Self::ExtractorStatus { .. } => ErrorKind::Extraction,
            Self::Rename { .. } | Self::RenameCollision { .. } | Self::RenameWalk { .. } => {
                ErrorKind::Rename
            }
            Self::Compression(_) => ErrorKind::Compression,
            Self::Copy { .. } => ErrorKind::Copy,
            Self::Replace { .. } | Self::OutputConflict { .. } => ErrorKind::Replace,
            Self::FatalScan { .. } => ErrorKind::FatalScan,
            Self::Join(_) => ErrorKind::Task,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
