//! CLI entry point for fetchq.

use std::io::{self, IsTerminal, Read};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fetchq_core::{DownloadQueue, HttpClient, QueueConfig, RecordingPolicy};
use tracing::{debug, info, warn};

mod cli;
mod input;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let input_text = if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        info!("No input provided. Pipe `URL [DEST]` lines via stdin or pass URLs as arguments.");
        info!("Example: echo 'https://example.com/file.pdf tmp/file.pdf' | fetchq");
        return Ok(());
    };

    let parsed = input::parse_jobs(&input_text, &args.output_dir);
    for skipped in &parsed.skipped {
        warn!(line = %skipped, "Skipped unrecognized input");
    }
    if parsed.jobs.is_empty() {
        info!("No valid jobs found in input");
        return Ok(());
    }

    let policy = RecordingPolicy {
        record_successes: args.record_successes,
        record_failures: !args.no_record_failures,
    };
    let config = QueueConfig::with_workers(usize::from(args.workers))
        .with_recording_policy(policy)
        .with_inter_job_delay(Duration::from_millis(args.delay));

    let client = HttpClient::try_new().context("building HTTP client")?;
    let queue = DownloadQueue::new(config, client)?;

    let total = parsed.jobs.len();
    for (url, destination) in parsed.jobs {
        queue.enqueue(url, destination)?;
    }
    info!(jobs = total, workers = queue.worker_count(), "Jobs enqueued");

    queue.wait_until_done().await;

    let failures = queue.failures();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&queue.all_results())?);
    } else {
        for failure in &failures {
            warn!("{failure}");
        }
    }

    info!(
        total,
        recorded = queue.all_results().len(),
        failed = failures.len(),
        "Download complete"
    );

    if !failures.is_empty() {
        bail!("{} of {total} downloads failed", failures.len());
    }
    Ok(())
}
