//! Site-Mirror main entry point
//!
//! This is the command-line interface for the Site-Mirror offline site copier.

use anyhow::{bail, Context};
use clap::Parser;
use site_mirror::config::{load_config_with_hash, validate_options, MirrorOptions};
use site_mirror::output::print_report;
use site_mirror::url::validate_root_url;
use site_mirror::{Mirror, MirrorError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that recorded an error
const EXIT_RUN_FAILED: u8 = 1;

/// Exit code for bad arguments or configuration
const EXIT_USAGE: u8 = 2;

/// Site-Mirror: a recursive offline site copier
///
/// Site-Mirror downloads a website starting at URL, following links to the
/// same host and its subdomains up to the given depth, and rewrites links in
/// the saved pages so the copy can be browsed offline.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version)]
#[command(about = "A recursive offline site copier", long_about = None)]
struct Cli {
    /// Root URL to mirror (may also be set as root-url in the config file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Maximum number of link hops to follow from the root
    #[arg(short, long, value_name = "N")]
    depth: Option<u32>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate options and show what would be mirrored without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if cli.dry_run {
        return match handle_dry_run(&options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{:#}", e);
                ExitCode::from(EXIT_USAGE)
            }
        };
    }

    handle_mirror(options, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,warn"),
            1 => EnvFilter::new("site_mirror=debug,info"),
            2 => EnvFilter::new("site_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves run options: defaults, then the config file, then CLI flags
fn build_options(cli: &Cli) -> anyhow::Result<MirrorOptions> {
    let mut options = MirrorOptions::default();

    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
        let (file, hash) = load_config_with_hash(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        tracing::info!("Configuration loaded successfully (hash: {})", hash);
        options = options.merge_file(&file);
    }

    if let Some(url) = &cli.url {
        options.root_url = url.clone();
    }
    if let Some(depth) = cli.depth {
        options.max_depth = depth;
    }
    if let Some(out) = &cli.out {
        options.output_dir = out.clone();
    }
    if let Some(workers) = cli.workers {
        options.workers = workers;
    }
    if let Some(timeout) = cli.timeout {
        options.timeout = Duration::from_secs(timeout);
    }

    if options.root_url.trim().is_empty() {
        bail!("no root URL given; pass one as an argument or set root-url in the config file");
    }

    Ok(options)
}

/// Handles the --dry-run mode: validates options and shows what would be mirrored
fn handle_dry_run(options: &MirrorOptions) -> anyhow::Result<()> {
    let root = validate_root_url(&options.root_url).context("invalid root URL")?;
    validate_options(options).context("invalid options")?;

    println!("=== Site-Mirror Dry Run ===\n");

    println!("Mirror Configuration:");
    println!("  Root URL: {}", root);
    println!("  Max depth: {}", options.max_depth);
    println!("  Output directory: {}", options.output_dir.display());
    println!("  Workers: {}", options.effective_workers());
    println!("  Timeout: {}s", options.timeout.as_secs());
    println!("  Queue capacity: {}", options.queue_capacity);
    println!("  User agent: {}", options.user_agent);

    println!("\n✓ Options are valid");
    println!(
        "✓ Would mirror {} and its subdomains",
        root.host_str().unwrap_or_default()
    );

    Ok(())
}

/// Handles the main mirror operation
async fn handle_mirror(options: MirrorOptions, quiet: bool) -> ExitCode {
    let mirror = match Mirror::new(options) {
        Ok(mirror) => mirror,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(exit_code_for(&e));
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let report = mirror.run_with_cancellation(cancel).await;

    if !quiet {
        print_report(&report);
    }

    match report.into_result() {
        Ok(_) => {
            tracing::info!("Mirror completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Mirror finished with errors: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Maps a run error onto the process exit code
fn exit_code_for(error: &MirrorError) -> u8 {
    match error {
        MirrorError::InvalidRootUrl(_) | MirrorError::Config(_) => EXIT_USAGE,
        _ => EXIT_RUN_FAILED,
    }
}
