#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::num::NonZeroUsize;

use anyhow::Result;
use camino::Utf8PathBuf;
use cbz_normalize::{
    batch::run_batch,
    config::{Concurrency, Config, DEFAULT_PAD_WIDTH, DEFAULT_UNRAR_PROGRAM, DEFAULT_WORKDIR},
    convert::Converter,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(about, author, version)]
pub struct Args {
    /// The directory containing the cbz and cbr archives to normalize
    #[clap(default_value = DEFAULT_WORKDIR)]
    pub workdir: Utf8PathBuf,
    /// Maximum amount of archives converted at once, defaults to the amount of available cores
    #[clap(short, long, conflicts_with = "sequential")]
    pub jobs: Option<NonZeroUsize>,
    /// Convert the archives one after the other
    #[clap(long, action)]
    pub sequential: bool,
    /// Minimum width of the numbers found in page names
    #[clap(long, default_value_t = DEFAULT_PAD_WIDTH)]
    pub pad_width: usize,
    /// The program used to extract cbr archives, invoked as `<unrar> x <archive> <dir>`
    #[clap(long, default_value = DEFAULT_UNRAR_PROGRAM)]
    pub unrar: String,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let concurrency = match (args.sequential, args.jobs) {
            (true, _) => Concurrency::Sequential,
            (false, Some(jobs)) => Concurrency::Pooled(jobs),
            (false, None) => Concurrency::default(),
        };

        Self {
            workdir: args.workdir,
            pad_width: args.pad_width,
            concurrency,
            unrar_program: args.unrar,
            ..Self::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from(Args::parse());
    let converter = Converter::from_config(&config);

    let report = run_batch(&config, converter).await?;
    info!(
        "{} archives converted, {} failed",
        report.converted.len(),
        report.failed.len()
    );

    Ok(())
}
