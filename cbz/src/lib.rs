#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Seek, Write},
    path::Path,
    result,
};

use bytes::Bytes;
use camino::Utf8Path;
use tracing::debug;
use walkdir::WalkDir;
use zip::{read::ZipFile, write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

pub use crate::errors::{Error, Result};

pub mod errors;

/// Mask applied to stored modes, keeps the permission bits and drops the file type
const PERMISSION_BITS: u32 = 0o7777;

pub trait Cbz {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait CbzRead: Cbz {
    fn file_names(&self) -> Vec<&str>;

    /// Lookup the file by `name` in Cbz and returns a `CbzFile`
    ///
    /// ## Errors
    ///
    /// Fails if no such file exists or if the entry can't be decompressed
    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>>;

    /// Iterate over files present in the Cbz, sorted by name.
    /// If the closure returns an error, this error is returned immediately.
    ///
    /// ## Errors
    ///
    /// Returns an error immediately if the provided closure returns an error
    fn try_for_each<F, E>(&mut self, mut f: F) -> result::Result<(), E>
    where
        F: FnMut(Result<CbzFile<'_>>) -> result::Result<(), E>,
    {
        let mut file_names = self
            .file_names()
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();
        file_names.sort();

        for file_name in file_names {
            f(self.read_by_name(&file_name))?;
        }

        Ok(())
    }
}

pub struct CbzFile<'a>(ZipFile<'a>);

impl<'a> CbzFile<'a> {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn size(&self) -> u64 {
        self.0.size()
    }

    /// Permission bits stored alongside the entry, if any
    pub fn unix_mode(&self) -> Option<u32> {
        self.0.unix_mode().map(|mode| mode & PERMISSION_BITS)
    }

    /// Convert the file content to `Bytes`
    ///
    /// ## Errors
    ///
    /// Fails if file size is too large to fit a `usize` on host machine
    /// or if the content can't be read
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(
            self.size()
                .try_into()
                .map_err(|_| Error::CbzFileSizeConversion)?,
        );

        self.0.read_to_end(&mut buf)?;

        Ok(buf.into())
    }
}

impl<'a> Read for CbzFile<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<'a> From<ZipFile<'a>> for CbzFile<'a> {
    fn from(zip_file: ZipFile<'a>) -> Self {
        Self(zip_file)
    }
}

#[derive(Debug)]
pub struct CbzReader<R> {
    archive: ZipArchive<R>,
}

impl<R> CbzReader<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        Self { archive }
    }
}

impl<R> CbzReader<R>
where
    R: Read + Seek,
{
    /// Creates `CbzReader` from a `Read`
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;

        Ok(Self::new(archive))
    }

    /// Decompresses every entry under `dest`, keeping the relative paths and the stored permissions.
    /// Directory entries are created as is, parent directories of file entries are created when missing.
    /// Returns the amount of files written.
    ///
    /// ## Errors
    ///
    /// Fails if an entry can't be decompressed, if its name points outside of `dest`,
    /// or if a destination path can't be created or written
    pub fn extract_to(&mut self, dest: impl AsRef<Utf8Path>) -> Result<usize> {
        let dest = dest.as_ref();
        let mut written = 0;

        for index in 0..self.archive.len() {
            let mut file = self.archive.by_index(index)?;
            let Some(relative_path) = file.enclosed_name().map(Path::to_path_buf) else {
                return Err(Error::CbzUnsafeEntryName(file.name().to_string()));
            };
            let out_path = dest.as_std_path().join(relative_path);

            if file.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out_file = File::create(&out_path)?;
            io::copy(&mut file, &mut out_file)?;
            drop(out_file);

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                if let Some(mode) = file.unix_mode() {
                    let permissions = fs::Permissions::from_mode(mode & PERMISSION_BITS);
                    fs::set_permissions(&out_path, permissions)?;
                }
            }

            debug!("extracted {}", file.name());
            written += 1;
        }

        Ok(written)
    }
}

impl CbzReader<BufReader<File>> {
    /// Creates `CbzReader` from a path
    ///
    /// ## Errors
    ///
    /// Fails if the file can't be open or the underlying `ZipArchive` can't be created
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        Self::from_reader(BufReader::new(file))
    }
}

impl<R> Cbz for CbzReader<R>
where
    R: Read + Seek,
{
    fn len(&self) -> usize {
        self.archive.len()
    }
}

impl<R> CbzRead for CbzReader<R>
where
    R: Read + Seek,
{
    fn file_names(&self) -> Vec<&str> {
        self.archive.file_names().collect()
    }

    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>> {
        let archive_file = self.archive.by_name(name)?;

        Ok(archive_file.into())
    }
}

pub struct CbzWriter<W: Write + Seek> {
    archive: ZipWriter<W>,
    size: usize,
}

impl<W> CbzWriter<W>
where
    W: Write + Seek,
{
    pub fn new(archive: ZipWriter<W>) -> Self {
        Self { archive, size: 0 }
    }

    /// Creates a `CbzWriter` from a `Write`
    pub fn from_writer(writer: W) -> Self {
        Self::new(ZipWriter::new(writer))
    }

    /// Deflates `reader` into a new entry named `filename`
    ///
    /// ## Errors
    ///
    /// Fails if the entry can't be started or if the copy fails
    pub fn insert_from_reader(
        &mut self,
        filename: impl Into<String>,
        mut reader: impl Read,
        unix_mode: Option<u32>,
    ) -> Result<u64> {
        let mut file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(mode) = unix_mode {
            file_options = file_options.unix_permissions(mode & PERMISSION_BITS);
        }

        self.archive.start_file(filename, file_options)?;
        let copied = io::copy(&mut reader, &mut self.archive)?;
        self.size += 1;

        Ok(copied)
    }

    /// Walks `base` and stores every regular file under its path relative to `base`,
    /// `/` separated and sorted by name. Directories are implied by the entry names.
    /// Returns the amount of entries written.
    ///
    /// ## Errors
    ///
    /// Fails if `base` can't be walked, a file can't be read, or the archive can't be written
    pub fn insert_dir_all(&mut self, base: impl AsRef<Utf8Path>) -> Result<usize> {
        let base = base.as_ref();
        let mut inserted = 0;

        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                return Err(Error::NonUtf8Path(entry.path().to_path_buf()));
            };
            let relative_path = path.strip_prefix(base).map_err(|_| Error::NotUnderBase {
                path: path.to_string(),
                base: base.to_string(),
            })?;
            let entry_name = relative_path
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join("/");

            #[cfg(unix)]
            let unix_mode = {
                use std::os::unix::fs::PermissionsExt;

                Some(entry.metadata()?.permissions().mode())
            };
            #[cfg(not(unix))]
            let unix_mode = None;

            let file = File::open(path)?;
            self.insert_from_reader(entry_name.as_str(), BufReader::new(file), unix_mode)?;
            debug!("compressed {entry_name}");
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Terminates the Cbz archiving, called on drop anyway but error can't be handled
    ///
    /// ## Errors
    ///
    /// Same errors as the underlying `ZipWriter::finish` method
    pub fn finish(&mut self) -> Result<W> {
        let mut writer = self.archive.finish()?;
        writer.flush()?;

        Ok(writer)
    }
}

impl<W> Cbz for CbzWriter<W>
where
    W: Write + Seek,
{
    fn len(&self) -> usize {
        self.size
    }
}
