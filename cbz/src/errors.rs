use std::{io, path::PathBuf, result};

use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("Walk error {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Cbz file size couldn't be converted")]
    CbzFileSizeConversion,

    #[error("Cbz entry {0} would be extracted outside of the destination")]
    CbzUnsafeEntryName(String),

    #[error("Path {0:?} is not valid utf-8")]
    NonUtf8Path(PathBuf),

    #[error("Path {path} is not located under {base}")]
    NotUnderBase { path: String, base: String },
}

pub type Result<T, E = Error> = result::Result<T, E>;
