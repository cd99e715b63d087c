use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{config::ImageExtensions, Error, Result};

/// Page names are often numbered without padding (1, 2, 10...) and sort badly.
/// This function rewrites every run of ascii digits in `name` as its integer value padded to `width`.
/// Values needing more digits keep their natural width, non digit characters are left as is.
///
/// Applying it twice gives the same result as applying it once.
#[must_use]
pub fn pad_digit_runs(name: &str, width: usize) -> String {
    let mut padded = String::with_capacity(name.len() + width);
    let mut rest = name;

    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        padded.push_str(&rest[..start]);

        let digits = &rest[start..];
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        // Stripping the leading zeros is the integer re-encoding, minus the overflow
        let value = match digits[..end].trim_start_matches('0') {
            "" => "0",
            value => value,
        };
        padded.push_str(&format!("{value:0>width$}"));

        rest = &digits[end..];
    }
    padded.push_str(rest);

    padded
}

/// Renames in place every image found under `dir` whose name changes once padded.
/// Returns the amount of renamed files.
///
/// ## Errors
///
/// Fails if `dir` can't be walked, if a target name is already taken, or if a rename fails
pub fn normalize_dir(
    dir: impl AsRef<Utf8Path>,
    images: &ImageExtensions,
    width: usize,
) -> Result<usize> {
    let dir = dir.as_ref();
    let mut renames = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| Error::RenameWalk {
            path: dir.to_owned(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(path) = Utf8Path::from_path(entry.path()) else {
            warn!("{:?} is not a valid utf-8 path, leaving it as is", entry.path());
            continue;
        };
        if !images.matches(path) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let padded = pad_digit_runs(file_name, width);
        if padded != file_name {
            renames.push((path.to_owned(), path.with_file_name(padded)));
        }
    }

    let renamed = renames.len();
    for (from, to) in renames {
        rename(from, to)?;
    }

    Ok(renamed)
}

fn rename(from: Utf8PathBuf, to: Utf8PathBuf) -> Result<()> {
    if fs::symlink_metadata(&to).is_ok() {
        return Err(Error::RenameCollision { from, to });
    }

    if let Err(source) = fs::rename(&from, &to) {
        return Err(Error::Rename { from, to, source });
    }
    debug!("renamed {from} -> {to}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ErrorKind;

    use super::*;

    fn pad(name: &str) -> String {
        pad_digit_runs(name, 3)
    }

    #[test]
    fn pads_every_digit_run() {
        assert_eq!(pad("page7.jpg"), "page007.jpg");
        assert_eq!(pad("img10.png"), "img010.png");
        assert_eq!(pad("ch1_p23.jpeg"), "ch001_p023.jpeg");
        assert_eq!(pad("0.jpg"), "000.jpg");
    }

    #[test]
    fn leaves_names_without_short_runs_alone() {
        assert_eq!(pad("cover.png"), "cover.png");
        assert_eq!(pad("page1000.gif"), "page1000.gif");
        assert_eq!(pad(""), "");
    }

    #[test]
    fn drops_superfluous_leading_zeros() {
        assert_eq!(pad("page0001.png"), "page001.png");
        assert_eq!(pad("page00012345.png"), "page12345.png");
        assert_eq!(pad("0000.jpg"), "000.jpg");
    }

    #[test]
    fn handles_runs_wider_than_any_integer() {
        let name = "scan123456789012345678901234567890.jpg";

        assert_eq!(pad(name), name);
    }

    #[test]
    fn ignores_non_ascii_digits() {
        assert_eq!(pad("page٣.jpg"), "page٣.jpg");
        assert_eq!(pad("ページ2.png"), "ページ002.png");
    }

    #[test]
    fn is_idempotent() {
        for name in [
            "page7.jpg",
            "ch1_p23.jpeg",
            "0.jpg",
            "page0001.png",
            "v01c002p0003.bmp",
            "cover.png",
            "9999.gif",
            "a1b22c333d4444.tiff",
        ] {
            let once = pad(name);

            assert_eq!(pad(&once), once, "{name}");
        }
    }

    #[test]
    fn honors_custom_width() {
        assert_eq!(pad_digit_runs("7.jpg", 5), "00007.jpg");
        assert_eq!(pad_digit_runs("7.jpg", 1), "7.jpg");
    }

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        (dir, path)
    }

    #[test]
    fn renames_images_recursively() {
        let (_dir, root) = scratch();
        fs::create_dir_all(root.join("chapter 2")).unwrap();
        fs::write(root.join("1.jpg"), b"1").unwrap();
        fs::write(root.join("chapter 2/10.png"), b"10").unwrap();
        fs::write(root.join("cover.png"), b"cover").unwrap();

        let renamed = normalize_dir(&root, &ImageExtensions::default(), 3).unwrap();

        assert_eq!(renamed, 2);
        assert_eq!(fs::read(root.join("001.jpg")).unwrap(), b"1");
        assert_eq!(fs::read(root.join("chapter 2/010.png")).unwrap(), b"10");
        assert!(root.join("cover.png").is_file());
        assert!(!root.join("1.jpg").exists());
        // only file names change, never directories
        assert!(root.join("chapter 2").is_dir());
    }

    #[test]
    fn leaves_non_images_alone() {
        let (_dir, root) = scratch();
        fs::write(root.join("info1.txt"), b"info").unwrap();
        fs::write(root.join("page1.JPG"), b"page").unwrap();

        let renamed = normalize_dir(&root, &ImageExtensions::default(), 3).unwrap();

        assert_eq!(renamed, 0);
        assert!(root.join("info1.txt").is_file());
        assert!(root.join("page1.JPG").is_file());
    }

    #[test]
    fn refuses_to_overwrite_existing_pages() {
        let (_dir, root) = scratch();
        fs::write(root.join("1.jpg"), b"short").unwrap();
        fs::write(root.join("001.jpg"), b"padded").unwrap();

        let err = normalize_dir(&root, &ImageExtensions::default(), 3).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Rename);
        assert!(matches!(err, Error::RenameCollision { .. }));
        assert_eq!(fs::read(root.join("001.jpg")).unwrap(), b"padded");
        assert_eq!(fs::read(root.join("1.jpg")).unwrap(), b"short");
    }

    #[test]
    fn normalizing_twice_renames_nothing() {
        let (_dir, root) = scratch();
        fs::write(root.join("2.gif"), b"2").unwrap();

        assert_eq!(
            normalize_dir(&root, &ImageExtensions::default(), 3).unwrap(),
            1
        );
        assert_eq!(
            normalize_dir(&root, &ImageExtensions::default(), 3).unwrap(),
            0
        );
    }
}
