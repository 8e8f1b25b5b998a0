use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use dexor::config::{
    DEFAULT_INPUT_DIR, DEFAULT_INPUT_EXTENSION, DEFAULT_OUTPUT_DIR, DEFAULT_PARALLELISM,
    DEFAULT_PREFIX_PROBE_SIZE, DEFAULT_QUEUE_CAPACITY,
};
use dexor::{signatures, BatchDecoder, BatchReport, DecodeConfig, TaskOutcome};

#[derive(Parser, Debug)]
#[command(name = "dexor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recover images obscured with a single-byte XOR key")]
struct Cli {
    /// Directory to process
    #[arg(long = "in", default_value = DEFAULT_INPUT_DIR)]
    input: PathBuf,

    /// Directory to write decoded files to
    #[arg(long = "out", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Number of decode workers
    #[arg(short, long, default_value_t = DEFAULT_PARALLELISM)]
    jobs: usize,

    /// Input file suffix (case-sensitive)
    #[arg(long, default_value = DEFAULT_INPUT_EXTENSION)]
    ext: String,

    /// Bytes read from each file before key recovery
    #[arg(long, default_value_t = DEFAULT_PREFIX_PROBE_SIZE)]
    probe: usize,

    /// Capacity of the task queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue: usize,

    /// Write a JSON report of every processed file
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    println!("Input directory:  {}", cli.input.display());
    println!("Output directory: {}", cli.output.display());

    let config = DecodeConfig::new(&cli.input, &cli.output)
        .with_parallelism(cli.jobs)
        .with_input_extension(cli.ext)
        .with_prefix_probe_size(cli.probe)
        .with_queue_capacity(cli.queue);

    let decoder = BatchDecoder::new(config, signatures()).context("Invalid configuration")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")?,
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let report = decoder
        .run(&running, |outcome| on_outcome(&pb, outcome))
        .with_context(|| format!("Failed to decode {}", cli.input.display()))?;

    pb.finish_and_clear();
    print_summary(&report);

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "dexor=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn on_outcome(pb: &ProgressBar, outcome: &TaskOutcome) {
    pb.inc(1);
    match &outcome.result {
        Ok(file) => pb.set_message(format!("{}", file.output.display())),
        Err(e) => pb.println(format!("{} {}", style("[!]").yellow(), e)),
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    if report.cancelled {
        println!("{}", style("Decode Interrupted").yellow().bold());
    } else {
        println!("{}", style("Decode Complete!").green().bold());
    }
    println!();
    println!("Files found:     {}", report.dispatched);
    if report.skipped > 0 {
        println!("Entries skipped: {}", report.skipped);
    }
    println!(
        "Files decoded:   {} ({})",
        style(report.decoded.len()).green(),
        format_size(report.bytes_decoded(), BINARY)
    );
    for (extension, count) in report.decoded_by_extension() {
        println!("  {:<6} {}", extension, count);
    }
    if !report.failed.is_empty() {
        println!("Failed:          {}", style(report.failed.len()).yellow());
        for (kind, count) in report.failed_by_kind() {
            println!("  {:<8} {}", kind, count);
        }
    }
    println!("Output folder:   {}", report.output_dir.display());
    println!("Finished in {:.3}s", report.duration.as_secs_f64());
}
