//! Blog-Harvest main entry point
//!
//! This is the command-line interface for the Blog-Harvest archiver.

use anyhow::{bail, Context};
use blog_harvest::config::{load_config_with_hash, Config};
use blog_harvest::crawler::{BlogOutcome, Coordinator};
use blog_harvest::output::{
    export_all, export_blog, export_stamp, load_statistics, print_statistics, ExportFormat,
};
use blog_harvest::storage::{open_storage, SqliteStorage, Storage};
use blog_harvest::{parse_blog_url, BlogId};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Blog-Harvest: a polite blog archiver
///
/// Blog-Harvest collects blog metadata, posts, comments and reaction counts
/// into a local SQLite database, resuming interrupted crawls where they
/// stopped, and exports the stored records as JSON or CSV.
#[derive(Parser, Debug)]
#[command(name = "blog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite blog archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Blog URL to crawl or export (repeatable); defaults to every unfinished blog
    #[arg(long = "blog", value_name = "URL")]
    blogs: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Restart the selected blogs from their metadata
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export", "delete"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "delete"])]
    stats: bool,

    /// Export stored blogs (the selected ones, or every completed one) and exit
    #[arg(long, value_name = "FORMAT", conflicts_with_all = ["dry_run", "stats", "delete"])]
    export: Option<ExportFormat>,

    /// Delete a stored blog with everything harvested for it and exit
    #[arg(long, value_name = "BLOG_ID", conflicts_with_all = ["dry_run", "stats", "export"])]
    delete: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let blogs = cli
        .blogs
        .iter()
        .map(|url| parse_blog_url(url).with_context(|| format!("invalid blog URL '{}'", url)))
        .collect::<anyhow::Result<Vec<BlogId>>>()?;

    if cli.dry_run {
        handle_dry_run(&config, &blogs)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(format) = cli.export {
        handle_export(&config, &blogs, format)
    } else if let Some(blog_id) = &cli.delete {
        handle_delete(&config, blog_id)
    } else {
        handle_crawl(config, config_hash, &cli.blogs, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("blog_harvest=info,warn"),
            1 => EnvFilter::new("blog_harvest=debug,info"),
            2 => EnvFilter::new("blog_harvest=trace,debug"),
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

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, blogs: &[BlogId]) -> anyhow::Result<()> {
    println!("=== Blog-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request delay: {}ms", config.crawler.request_delay);
    println!("  Blog request delay: {}ms", config.crawler.blog_request_delay);
    println!(
        "  Comment request delay: {}ms",
        config.crawler.comment_request_delay
    );
    println!(
        "  Retries: {} (rate-limit attempts: {})",
        config.crawler.max_retries, config.crawler.rate_limit_attempts
    );
    println!(
        "  Concurrent blogs: {}",
        config.crawler.max_concurrent_blogs
    );

    println!("\nPlatform:");
    println!("  Blog host: {}", config.platform.blog_base);
    println!("  Mobile host: {}", config.platform.mobile_base);
    println!("  API host: {}", config.platform.api_base);
    println!(
        "  Browser rendering: {}",
        if config.browser.enabled {
            config.browser.webdriver_url.as_str()
        } else {
            "disabled"
        }
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Exports: {}", config.output.export_dir);

    println!("\nBlogs ({}):", blogs.len());
    for blog in blogs {
        println!("  - {}", blog);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes JSON or CSV files
fn handle_export(config: &Config, blogs: &[BlogId], format: ExportFormat) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let dir = Path::new(&config.output.export_dir);
    let stamp = export_stamp(&chrono::Local::now());

    let files = if blogs.is_empty() {
        export_all(&storage, format, dir, &stamp)?
    } else {
        let mut files = Vec::new();
        for blog in blogs {
            files.extend(export_blog(&storage, blog.as_str(), format, dir, &stamp)?);
        }
        files
    };

    if files.is_empty() {
        println!("Nothing to export");
    }
    for file in &files {
        println!("✓ {}", file.display());
    }
    Ok(())
}

/// Handles the --delete mode
fn handle_delete(config: &Config, blog_id: &str) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    if storage.delete_blog(blog_id)? {
        println!("✓ Deleted {}", blog_id);
        Ok(())
    } else {
        bail!("blog {} is not stored", blog_id)
    }
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    urls: &[String],
    fresh: bool,
) -> anyhow::Result<()> {
    let storage = Arc::new(Mutex::new(open_database(&config)?));
    let coordinator =
        Coordinator::new(config, Arc::clone(&storage))?.with_config_hash(config_hash);

    let blogs = if urls.is_empty() {
        coordinator.pending_blogs()?
    } else {
        urls.iter()
            .map(|url| coordinator.register_blog(url))
            .collect::<Result<Vec<_>, _>>()?
    };
    if blogs.is_empty() {
        println!("No blogs to crawl; pass --blog <URL>");
        return Ok(());
    }

    if fresh {
        tracing::info!("Restarting {} blogs from their metadata", blogs.len());
        let mut guard = storage
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        for blog in &blogs {
            guard.reset_progress(blog.as_str())?;
        }
    }

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current request");
            stop.stop();
        }
    });

    let report = coordinator.run(&blogs).await?;
    for (blog_id, outcome) in &report.outcomes {
        match outcome {
            BlogOutcome::Completed => println!("✓ {}", blog_id),
            BlogOutcome::Failed(reason) => println!("✗ {}: {}", blog_id, reason),
            BlogOutcome::Suspended(reason) => println!("✗ {} suspended: {}", blog_id, reason),
            BlogOutcome::Stopped => println!("… {} stopped, rerun to resume", blog_id),
        }
    }

    if report.failed() > 0 {
        bail!("{} of {} blogs failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
