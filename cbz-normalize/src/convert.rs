use std::{
    fmt::{self, Display},
    fs::{self, File},
    io::{self, BufWriter},
    sync::Arc,
};

use camino::{Utf8Path, Utf8PathBuf};
use cbz::{CbzReader, CbzWriter};
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::{
    config::{ArchiveExtensions, ArchiveFormat, Config, ImageExtensions, OUTPUT_EXTENSION},
    extractor::{RarExtractor, Unrar},
    mirror::mirror_dir,
    normalize::normalize_dir,
    scratch::ScratchDir,
    Error, Result,
};

/// Steps a single archive goes through, a failure at any of them ends the conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Renaming,
    Compressing,
    Replacing,
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Extracting => "extracting",
                Self::Renaming => "renaming",
                Self::Compressing => "compressing",
                Self::Replacing => "replacing",
                Self::Done => "done",
            }
        )
    }
}

/// A successfully converted archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    /// Pages whose name changed
    pub renamed: usize,
    /// Entries written to the output archive
    pub entries: usize,
}

/// Turns one cbz or cbr archive into a normalized cbz.
///
/// The archive is extracted into a private directory next to it, its pages are renamed,
/// and the result is compressed into a temporary file that finally replaces the source.
/// Temporary state is dropped whatever the outcome, the source is only removed once its replacement is in place.
#[derive(Clone)]
pub struct Converter {
    archive_extensions: ArchiveExtensions,
    image_extensions: ImageExtensions,
    pad_width: usize,
    rar_extractor: Arc<dyn RarExtractor>,
}

impl Converter {
    pub fn new(config: &Config, rar_extractor: Arc<dyn RarExtractor>) -> Self {
        Self {
            archive_extensions: config.archive_extensions.clone(),
            image_extensions: config.image_extensions.clone(),
            pad_width: config.pad_width,
            rar_extractor,
        }
    }

    /// Creates a `Converter` that extracts rar archives with the configured external program
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Arc::new(Unrar::new(config.unrar_program.clone())))
    }

    /// Path of the archive produced for `source`
    #[must_use]
    pub fn output_path(source: &Utf8Path) -> Utf8PathBuf {
        source.with_extension(OUTPUT_EXTENSION)
    }

    /// ## Errors
    ///
    /// Returns the error of the first failing stage, the source archive is left untouched unless
    /// its replacement has already been moved into place
    pub fn convert(&self, source: &Utf8Path) -> Result<Conversion> {
        let output = Self::output_path(source);
        let parent = match source.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let stem = source.file_stem().unwrap_or("archive");

        info!("processing {source}");

        debug!("{source}: {}", Stage::Extracting);
        let extraction_dir = ScratchDir::new_in(parent, &format!("{stem}_extracted"))
            .map_err(Error::ExtractionDir)?;
        let extraction_path = utf8_dir(&extraction_dir)?;
        if self.archive_extensions.format_of(source) == Some(ArchiveFormat::Rar) {
            self.extract_rar(source, &extraction_path)?;
        } else {
            CbzReader::from_path(source)
                .and_then(|mut reader| reader.extract_to(&extraction_path))
                .map_err(Error::Extraction)?;
        }

        debug!("{source}: {}", Stage::Renaming);
        let renamed = normalize_dir(&extraction_path, &self.image_extensions, self.pad_width)?;

        debug!("{source}: {}", Stage::Compressing);
        let mut part = Builder::new()
            .prefix(&format!(".{stem}."))
            .suffix(&format!(".{OUTPUT_EXTENSION}.part"))
            .tempfile_in(parent)
            .map_err(|err| Error::Compression(err.into()))?;
        let entries =
            write_archive(part.as_file_mut(), &extraction_path).map_err(Error::Compression)?;

        debug!("{source}: {}", Stage::Replacing);
        let permissions = fs::metadata(source)
            .map_err(|err| replace_error(source, err))?
            .permissions();
        part.as_file()
            .set_permissions(permissions)
            .map_err(|err| replace_error(&output, err))?;
        part.persist(&output)
            .map_err(|err| replace_error(&output, err.error))?;
        if source != output.as_path() && !is_same_file(source, &output) {
            fs::remove_file(source).map_err(|err| replace_error(source, err))?;
        }

        debug!("{source}: {}", Stage::Done);
        if let Err(err) = extraction_dir.close() {
            warn!("couldn't remove extraction directory of {source}: {err}");
        }
        info!("converted {source} to {output} ({renamed} pages renamed)");

        Ok(Conversion {
            source: source.to_owned(),
            output,
            renamed,
            entries,
        })
    }

    /// Rar archives are unpacked by the external extractor in a scratch directory of the system temp area,
    /// then mirrored into the extraction directory
    fn extract_rar(&self, source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        let scratch = ScratchDir::new("cbr_extract").map_err(Error::ExtractionDir)?;

        self.rar_extractor.extract(source, scratch.path())?;
        mirror_dir(scratch.path(), dest)?;

        if let Err(err) = scratch.close() {
            warn!("couldn't remove scratch directory of {source}: {err}");
        }

        Ok(())
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("archive_extensions", &self.archive_extensions)
            .field("image_extensions", &self.image_extensions)
            .field("pad_width", &self.pad_width)
            .finish_non_exhaustive()
    }
}

fn utf8_dir(dir: &ScratchDir) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
        Error::ExtractionDir(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{path:?} is not a valid utf-8 path"),
        ))
    })
}

fn write_archive(file: &mut File, base: &Utf8Path) -> cbz::Result<usize> {
    let entries = {
        let mut writer = CbzWriter::from_writer(BufWriter::new(&mut *file));
        let entries = writer.insert_dir_all(base)?;
        writer.finish()?;
        entries
    };
    file.sync_all()?;

    Ok(entries)
}

fn replace_error(path: &Utf8Path, source: io::Error) -> Error {
    Error::Replace {
        path: path.to_owned(),
        source,
    }
}

/// `a.CBZ` and `a.cbz` are the same file on case insensitive file systems
fn is_same_file(a: &Utf8Path, b: &Utf8Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        match (fs::metadata(a), fs::metadata(b)) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    {
        a.as_str().eq_ignore_ascii_case(b.as_str())
    }
}
