use std::{num::NonZeroUsize, thread};

use camino::{Utf8Path, Utf8PathBuf};

pub static DEFAULT_WORKDIR: &str = "./";
pub static DEFAULT_PAD_WIDTH: usize = 3;
pub static DEFAULT_UNRAR_PROGRAM: &str = "unrar";
/// Extension given to every converted archive
pub static OUTPUT_EXTENSION: &str = "cbz";

/// Container format of a source archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

/// Extensions of the archives picked up by the batch, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveExtensions {
    zip: Vec<String>,
    rar: Vec<String>,
}

impl ArchiveExtensions {
    pub fn new<Z, R>(zip: Z, rar: R) -> Self
    where
        Z: IntoIterator,
        Z::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            zip: zip.into_iter().map(|ext| ext.as_ref().to_lowercase()).collect(),
            rar: rar.into_iter().map(|ext| ext.as_ref().to_lowercase()).collect(),
        }
    }

    /// Returns the format the extension of `path` stands for, if any
    #[must_use]
    pub fn format_of(&self, path: &Utf8Path) -> Option<ArchiveFormat> {
        let extension = path.extension()?.to_lowercase();

        if self.zip.contains(&extension) {
            Some(ArchiveFormat::Zip)
        } else if self.rar.contains(&extension) {
            Some(ArchiveFormat::Rar)
        } else {
            None
        }
    }
}

impl Default for ArchiveExtensions {
    fn default() -> Self {
        Self::new(["cbz"], ["cbr"])
    }
}

/// Extensions of the entries considered as pages, matched case-sensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtensions(Vec<String>);

impl ImageExtensions {
    pub fn new(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(extensions.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, path: &Utf8Path) -> bool {
        path.extension()
            .is_some_and(|extension| self.0.iter().any(|known| known == extension))
    }
}

impl Default for ImageExtensions {
    fn default() -> Self {
        Self::new(["jpg", "jpeg", "png", "gif", "bmp", "tiff"])
    }
}

/// How many conversions may run at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Sequential,
    Pooled(NonZeroUsize),
}

impl Concurrency {
    #[must_use]
    pub fn limit(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pooled(size) => size.get(),
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Pooled(thread::available_parallelism().unwrap_or(NonZeroUsize::MIN))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for archives, extraction directories are created there too
    pub workdir: Utf8PathBuf,
    pub archive_extensions: ArchiveExtensions,
    pub image_extensions: ImageExtensions,
    /// Minimum width of every digit run in page names
    pub pad_width: usize,
    pub concurrency: Concurrency,
    /// Program invoked as `<program> x <archive> <dest>` for rar archives
    pub unrar_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: DEFAULT_WORKDIR.into(),
            archive_extensions: ArchiveExtensions::default(),
            image_extensions: ImageExtensions::default(),
            pad_width: DEFAULT_PAD_WIDTH,
            concurrency: Concurrency::default(),
            unrar_program: DEFAULT_UNRAR_PROGRAM.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_extensions_ignore_case() {
        let extensions = ArchiveExtensions::default();

        assert_eq!(
            extensions.format_of(Utf8Path::new("book.CBZ")),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            extensions.format_of(Utf8Path::new("book.Cbr")),
            Some(ArchiveFormat::Rar)
        );
        assert_eq!(extensions.format_of(Utf8Path::new("book.zip")), None);
        assert_eq!(extensions.format_of(Utf8Path::new("cbz")), None);
    }

    #[test]
    fn image_extensions_are_case_sensitive() {
        let extensions = ImageExtensions::default();

        assert!(extensions.matches(Utf8Path::new("page7.jpg")));
        assert!(extensions.matches(Utf8Path::new("scan.tiff")));
        assert!(!extensions.matches(Utf8Path::new("page7.JPG")));
        assert!(!extensions.matches(Utf8Path::new("info.txt")));
        assert!(!extensions.matches(Utf8Path::new("jpg")));
    }

    #[test]
    fn sequential_runs_one_at_a_time() {
        assert_eq!(Concurrency::Sequential.limit(), 1);
        assert_eq!(
            Concurrency::Pooled(NonZeroUsize::new(8).unwrap()).limit(),
            8
        );
        assert!(Concurrency::default().limit() >= 1);
    }
}
