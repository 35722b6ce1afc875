//! Docmirror main entry point
//!
//! This is the command-line interface for the docmirror documentation
//! crawler.

use clap::Parser;
use docmirror::config::load_config_with_hash;
use docmirror::crawler::{Coordinator, CrawlOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docmirror: a documentation-site mirroring crawler
///
/// Docmirror crawls a documentation website breadth-first from seed URLs,
/// extracts the main content of each page, downloads referenced images, and
/// writes a metadata index of everything it mirrored.
#[derive(Parser, Debug)]
#[command(name = "docmirror")]
#[command(version = "0.3.0")]
#[command(about = "A documentation-site mirroring crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from a previous run's metadata file
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous metadata
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Skip image downloads
    #[arg(long)]
    no_images: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let options = CrawlOptions {
        resume: cli.resume,
        images: !cli.no_images,
    };
    handle_crawl(config, config_hash, options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docmirror=info,warn"),
            1 => EnvFilter::new("docmirror=debug,info"),
            2 => EnvFilter::new("docmirror=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &docmirror::Config) {
    println!("=== Docmirror Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Page workers: {}", config.crawler.page_workers);
    println!("  Image workers: {}", config.crawler.image_workers);

    println!("\nRate Limiting:");
    println!(
        "  Delay: {}ms initial, {}ms-{}ms adaptive range",
        config.rate_limit.initial_delay_ms,
        config.rate_limit.min_delay_ms,
        config.rate_limit.max_delay_ms
    );
    println!("  Max retries: {}", config.rate_limit.max_retries);

    println!("\nPolicy:");
    println!("  Allowed domains: {:?}", config.policy.allowed_domains);
    if !config.policy.allowed_path_prefixes.is_empty() {
        println!("  Path prefixes: {:?}", config.policy.allowed_path_prefixes);
    }
    if !config.policy.excluded_extensions.is_empty() {
        println!(
            "  Excluded extensions: {:?}",
            config.policy.excluded_extensions
        );
    }
    if !config.policy.excluded_patterns.is_empty() {
        println!("  Excluded patterns: {:?}", config.policy.excluded_patterns);
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.output_dir);
    println!("  Metadata file: {}", config.output.metadata_file);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", config.seeds.len());
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: docmirror::Config,
    config_hash: String,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    if options.resume {
        tracing::info!("Starting crawl (resuming from previous metadata if present)");
    } else {
        tracing::info!("Starting fresh crawl");
    }
    if !options.images {
        tracing::info!("Image downloads disabled");
    }

    let coordinator = Coordinator::new(config, config_hash, options);
    match coordinator.run().await {
        Ok(summary) => {
            println!(
                "Crawl finished: {} pages mirrored, {} failed, {} skipped, {}/{} images",
                summary.pages_processed,
                summary.pages_failed,
                summary.pages_skipped,
                summary.images_done,
                summary.images_discovered
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
