//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use fetchq_core::DEFAULT_WORKER_COUNT;

/// Fetch a set of URLs to local files with a bounded pool of workers.
///
/// Jobs come from positional URLs or, when none are given, from stdin with
/// one `URL [DEST]` per line. Without a DEST the file is named after the
/// last URL path segment inside --output-dir.
#[derive(Parser, Debug)]
#[command(name = "fetchq")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download (reads `URL [DEST]` lines from stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory for jobs without an explicit destination
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of download workers (1-100)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKER_COUNT as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Pause each worker takes after a job, in milliseconds (0 to disable, max 60000)
    #[arg(short = 'd', long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay: u64,

    /// Keep successful downloads in the report
    #[arg(long)]
    pub record_successes: bool,

    /// Drop failed downloads from the report (and from the exit code)
    #[arg(long)]
    pub no_record_failures: bool,

    /// Print recorded results as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
