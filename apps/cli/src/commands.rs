//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use uuid::Uuid;

use lexcrawl_core::{
    PendingJob, ProgressReporter, StorageJobSink, WorkflowContext, WorkflowReport,
    discover_sources, extract_url, manifest_json, process_unchunked, retry_extraction,
    run_interruptible,
};
use lexcrawl_crawler::HttpFetcher;
use lexcrawl_shared::{
    AppConfig, DocumentType, HarvestConfig, SourceId, init_config, load_config, load_config_from,
};
use lexcrawl_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lexcrawl: harvest official publications into sources and article chunks.
#[derive(Parser)]
#[command(
    name = "lexcrawl",
    version,
    about = "Extract, discover and chunk Diário da República publications.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.lexcrawl/lexcrawl.toml).
    #[arg(long, global = true, env = "LEXCRAWL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured path.
    #[arg(long, global = true, env = "LEXCRAWL_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract one publication by URL (workflow 1).
    ExtractUrl {
        /// Detail or consolidated-legislation page URL.
        #[arg(long)]
        url: String,

        /// Job id to record the terminal status under.
        #[arg(long)]
        job_id: Option<Uuid>,
    },

    /// Discover publications in a date range and store source stubs (workflow 2).
    DiscoverSources {
        /// First day of the range (YYYY-MM-DD).
        #[arg(long)]
        start_date: NaiveDate,

        /// Last day of the range, inclusive.
        #[arg(long)]
        end_date: NaiveDate,

        /// Document type: Lei, Decreto-Lei, Portaria, Despacho, Resolução, Decreto.
        #[arg(long = "type")]
        doc_type: DocumentType,

        #[arg(long)]
        job_id: Option<Uuid>,
    },

    /// Extract and chunk stored sources that have no chunks (workflow 3).
    ProcessUnchunked {
        /// Maximum number of sources to process [default: configured sweep limit].
        #[arg(long)]
        limit: Option<u32>,

        /// Worker count, overriding the configured concurrency.
        #[arg(long)]
        concurrency: Option<u32>,

        #[arg(long)]
        job_id: Option<Uuid>,
    },

    /// Re-extract an existing source and append its chunks (workflow 4).
    RetryExtraction {
        /// Id of the source to retry.
        #[arg(long)]
        source_id: SourceId,

        #[arg(long)]
        job_id: Option<Uuid>,
    },

    /// Print the workflow manifest as JSON.
    DescribeWorkflows,

    /// Full-text search over stored chunks.
    Search {
        /// FTS5 query.
        query: String,

        /// Maximum number of hits.
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lexcrawl=info",
        1 => "lexcrawl=debug",
        _ => "lexcrawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::ExtractUrl { url, job_id } => {
            let (ctx, job) = start_workflow(&cli, *job_id, None).await?;
            info!(url = %url, "extracting document");
            let progress = CliProgress::new();
            let report =
                run_interruptible(job, extract_url(&ctx, url, &progress), interrupted()).await?;
            finish(&report)
        }
        Command::DiscoverSources {
            start_date,
            end_date,
            doc_type,
            job_id,
        } => {
            let (ctx, job) = start_workflow(&cli, *job_id, None).await?;
            let progress = CliProgress::new();
            let report = run_interruptible(
                job,
                discover_sources(&ctx, *start_date, *end_date, *doc_type, &progress),
                interrupted(),
            )
            .await?;
            finish(&report)
        }
        Command::ProcessUnchunked {
            limit,
            concurrency,
            job_id,
        } => {
            let (ctx, job) = start_workflow(&cli, *job_id, *concurrency).await?;
            let limit = limit.unwrap_or(ctx.config.sweep_limit);
            let progress = CliProgress::new();
            let report = run_interruptible(
                job,
                process_unchunked(&ctx, limit, &progress),
                interrupted(),
            )
            .await?;
            finish(&report)
        }
        Command::RetryExtraction { source_id, job_id } => {
            let (ctx, job) = start_workflow(&cli, *job_id, None).await?;
            let progress = CliProgress::new();
            let report = run_interruptible(
                job,
                retry_extraction(&ctx, *source_id, &progress),
                interrupted(),
            )
            .await?;
            finish(&report)
        }
        Command::DescribeWorkflows => {
            println!("{}", manifest_json()?);
            Ok(())
        }
        Command::Search { query, limit } => cmd_search(&cli, query, *limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

fn app_config(cli: &Cli) -> lexcrawl_shared::Result<AppConfig> {
    match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
}

/// Config file merged with CLI overrides.
fn harvest_config(cli: &Cli) -> lexcrawl_shared::Result<HarvestConfig> {
    let mut config = HarvestConfig::from(&app_config(cli)?);
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

/// Open the job database, then finish setup under the job's guard.
///
/// Once the database is open, config and fetcher errors settle the job as
/// `FAILED`. An unreadable config falls back to the default database path
/// so the failure can still be recorded.
async fn start_workflow(
    cli: &Cli,
    job_id: Option<Uuid>,
    concurrency: Option<u32>,
) -> Result<(WorkflowContext<HttpFetcher>, PendingJob<StorageJobSink>)> {
    let loaded = harvest_config(cli);
    let database_path = match (&loaded, &cli.db) {
        (Ok(config), _) => config.database_path.clone(),
        (Err(_), Some(db)) => db.clone(),
        (Err(_), None) => HarvestConfig::from(&AppConfig::default()).database_path,
    };

    let storage = Arc::new(Storage::open(&database_path).await?);
    info!(db = %database_path.display(), "database opened");
    let job = PendingJob::new(Arc::new(StorageJobSink::new(Arc::clone(&storage))), job_id);

    let (job, mut config) = job.setup(loaded).await?;
    if let Some(n) = concurrency {
        config.concurrency = n.max(1);
    }
    let (job, fetcher) = job.setup(HttpFetcher::new(&config)).await?;
    Ok((WorkflowContext::new(storage, fetcher, config), job))
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Print the report; a `FAILED` workflow exits non-zero.
fn finish(report: &WorkflowReport) -> Result<()> {
    let tally = &report.tally;
    let status = if report.succeeded { "SUCCESS" } else { "FAILED" };

    println!();
    println!("  Workflow:  {} ({status})", report.workflow);
    println!("  Result:    {}", report.message);
    println!(
        "  Documents: {} attempted, {} processed, {} failed",
        tally.attempted,
        tally.processed,
        tally.failed()
    );
    println!(
        "  Sources:   {} created, {} updated",
        tally.sources_created, tally.sources_updated
    );
    println!(
        "  Chunks:    {} inserted, {} already present",
        tally.chunks_inserted, tally.chunks_skipped
    );
    for failure in &tally.failures {
        println!("    ✗ [{}] {}: {}", failure.kind, failure.target, failure.message);
    }
    println!();

    if report.succeeded {
        Ok(())
    } else {
        Err(eyre!("{} failed: {}", report.workflow, report.message))
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_done(&self, target: &str, ok: bool, current: usize, total: usize) {
        let mark = if ok { "✓" } else { "✗" };
        self.spinner
            .set_message(format!("[{current}/{total}] {mark} {target}"));
    }

    fn done(&self, _report: &WorkflowReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

async fn cmd_search(cli: &Cli, query: &str, limit: u32) -> Result<()> {
    let config = harvest_config(cli)?;
    let storage = Storage::open_readonly(&config.database_path).await?;
    let hits = storage.search_chunks(query, limit).await?;

    if hits.is_empty() {
        println!("No chunks match '{query}'.");
        return Ok(());
    }
    for hit in hits {
        println!("{} #{}  ({:.2})", hit.main_url, hit.chunk_index, hit.score);
        println!("    source {}", hit.source_id);
        println!("    {}", hit.snippet.replace('\n', " "));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = app_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
