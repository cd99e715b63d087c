use std::{
    collections::{hash_map::Entry, HashMap},
    fs,
};

use camino::{Utf8Path, Utf8PathBuf};
use futures::{stream, StreamExt};
use tracing::{debug, error, info};

use crate::{
    config::{ArchiveExtensions, Config},
    convert::{Conversion, Converter},
    Error, Result,
};

/// Outcome of a whole batch, both lists are sorted by source path
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<Conversion>,
    pub failed: Vec<(Utf8PathBuf, Error)>,
}

/// Lists the archives sitting directly in `workdir`, sorted by path.
/// Symlinks are followed, entries that don't lead to a regular file or whose name isn't utf-8 are ignored.
///
/// ## Errors
///
/// Fails if `workdir` can't be read
pub fn scan(workdir: &Utf8Path, extensions: &ArchiveExtensions) -> Result<Vec<Utf8PathBuf>> {
    let fatal = |source| Error::FatalScan {
        path: workdir.to_owned(),
        source,
    };
    let mut archives = Vec::new();

    for entry in fs::read_dir(workdir).map_err(fatal)? {
        let entry = entry.map_err(fatal)?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            error!("{:?} is not a valid utf-8 path", entry.path());
            continue;
        };
        if extensions.format_of(&path).is_none() {
            continue;
        }

        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => archives.push(path),
            Ok(_) => debug!("skipping {path}, not a regular file"),
            Err(err) => debug!("skipping {path}: {err}"),
        }
    }
    archives.sort();

    Ok(archives)
}

/// Keeps a single archive per output path. Archives already sitting at their output path win,
/// then the first in path order. The others are returned as conflicts.
fn claim_outputs(
    mut archives: Vec<Utf8PathBuf>,
) -> (Vec<Utf8PathBuf>, Vec<(Utf8PathBuf, Error)>) {
    archives.sort_by_cached_key(|archive| {
        (Converter::output_path(archive) != *archive, archive.clone())
    });

    let mut claimed = HashMap::new();
    let mut conflicts = Vec::new();
    for archive in archives {
        match claimed.entry(Converter::output_path(&archive)) {
            Entry::Occupied(entry) => {
                let err = Error::OutputConflict {
                    output: entry.key().clone(),
                    claimed_by: Utf8PathBuf::clone(entry.get()),
                };
                conflicts.push((archive, err));
            }
            Entry::Vacant(entry) => {
                entry.insert(archive);
            }
        }
    }

    let mut accepted = claimed.into_values().collect::<Vec<_>>();
    accepted.sort();

    (accepted, conflicts)
}

/// Converts every archive found in the configured working directory, at most `config.concurrency` at once.
/// A failing archive is reported and never stops the others.
///
/// ## Errors
///
/// Only fails if the working directory can't be scanned
pub async fn run_batch(config: &Config, converter: Converter) -> Result<BatchReport> {
    let archives = scan(&config.workdir, &config.archive_extensions)?;
    let (archives, failed) = claim_outputs(archives);
    for (archive, err) in &failed {
        error!("skipping {archive}: {err}");
    }
    info!(
        "found {} archives in {}, converting up to {} at once",
        archives.len(),
        config.workdir,
        config.concurrency.limit()
    );

    let mut report = BatchReport {
        converted: Vec::with_capacity(archives.len()),
        failed,
    };
    let mut results = stream::iter(archives)
        .map(|archive| {
            let converter = converter.clone();
            async move {
                let task_archive = archive.clone();
                let res = tokio::task::spawn_blocking(move || converter.convert(&task_archive))
                    .await
                    .map_err(Error::from)
                    .and_then(|res| res);

                (archive, res)
            }
        })
        .buffer_unordered(config.concurrency.limit());

    while let Some((archive, res)) = results.next().await {
        match res {
            Ok(conversion) => report.converted.push(conversion),
            Err(err) => {
                error!("failed to convert {archive}: {err}");
                report.failed.push((archive, err));
            }
        }
    }

    report.converted.sort_by(|a, b| a.source.cmp(&b.source));
    report.failed.sort_by(|(a, _), (b, _)| a.cmp(b));

    Ok(report)
}
