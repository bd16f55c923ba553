//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use skywatch_core::pipeline::{self, PollConfig, PollResult, ProgressReporter};
use skywatch_shared::{AppConfig, FeedConfig, Icao, init_config, load_config};
use skywatch_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// skywatch — track airport flight restrictions from a channel feed.
#[derive(Parser)]
#[command(
    name = "skywatch",
    version,
    about = "Track airport restriction announcements and publish them as a static site.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Shared flags for commands that run the pipeline.
#[derive(clap::Args, Clone)]
pub(crate) struct PipelineArgs {
    /// Feed URL (overrides config).
    #[arg(long)]
    feed_url: Option<String>,

    /// Keep at most this many newest feed entries (overrides config).
    #[arg(long)]
    limit: Option<usize>,

    /// Data directory for the database and status.json (overrides config).
    #[arg(long)]
    data_dir: Option<String>,

    /// Output directory for the rendered site (overrides config).
    #[arg(long)]
    site_dir: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Poll the feed once and re-render the site.
    Poll {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Poll on an interval until interrupted.
    Watch {
        /// Seconds between polls.
        #[arg(long, default_value_t = 1800)]
        interval_secs: u64,

        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Rebuild the site from the stored history without fetching.
    Render {
        #[command(flatten)]
        args: PipelineArgs,
    },

    /// Print the current status of all tracked airports.
    Status {
        /// Data directory (overrides config).
        #[arg(long)]
        data_dir: Option<String>,
    },

    /// Print the event history for one airport.
    History {
        /// ICAO code, e.g. UUWW.
        icao: String,

        /// Data directory (overrides config).
        #[arg(long)]
        data_dir: Option<String>,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "skywatch=info",
        1 => "skywatch=debug",
        _ => "skywatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Poll { args } => cmd_poll(&args).await,
        Command::Watch {
            interval_secs,
            args,
        } => cmd_watch(interval_secs, &args).await,
        Command::Render { args } => cmd_render(&args).await,
        Command::Status { data_dir } => cmd_status(data_dir.as_deref()).await,
        Command::History { icao, data_dir } => cmd_history(&icao, data_dir.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Merge config file values with CLI flag overrides.
fn build_poll_config(args: &PipelineArgs) -> Result<PollConfig> {
    let config = load_config()?;

    let mut feed = FeedConfig::from(&config);
    if let Some(url) = &args.feed_url {
        feed.url = url.clone();
    }
    if let Some(limit) = args.limit {
        feed.limit = limit;
    }

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| config.paths.data_dir.clone());
    let site_dir = args
        .site_dir
        .clone()
        .unwrap_or_else(|| config.paths.site_dir.clone());

    Ok(PollConfig {
        feed,
        extract: config.extract.clone(),
        data_dir: PathBuf::from(data_dir),
        site_dir: PathBuf::from(site_dir),
        templates_dir: config.paths.templates_dir.clone().map(PathBuf::from),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn resolve_data_dir(data_dir: Option<&str>) -> Result<PathBuf> {
    let config = load_config()?;
    Ok(PathBuf::from(
        data_dir.unwrap_or(config.paths.data_dir.as_str()),
    ))
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_poll(args: &PipelineArgs) -> Result<()> {
    let config = build_poll_config(args)?;

    info!(feed_url = %config.feed.url, "polling feed");

    let reporter = CliProgress::new();
    let result = pipeline::poll(&config, &reporter).await?;

    print_poll_summary(&result);
    Ok(())
}

async fn cmd_watch(interval_secs: u64, args: &PipelineArgs) -> Result<()> {
    let config = build_poll_config(args)?;
    let interval = Duration::from_secs(interval_secs);

    info!(
        feed_url = %config.feed.url,
        interval_secs,
        "watching feed"
    );

    loop {
        match pipeline::poll(&config, &pipeline::SilentProgress).await {
            Ok(result) => {
                info!(
                    entries_new = result.entries_new,
                    events_added = result.events_added,
                    fetch_failed = result.fetch_error.is_some(),
                    "poll finished, sleeping"
                );
            }
            Err(e) => {
                error!(error = %e, "poll failed, will retry next interval");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn cmd_render(args: &PipelineArgs) -> Result<()> {
    let config = build_poll_config(args)?;
    let rendered = pipeline::render(&config).await?;

    println!();
    println!("  Site rebuilt from stored history.");
    println!("  Pages:  {}", rendered.pages.join(", "));
    println!("  Path:   {}", rendered.site_dir.display());
    println!();
    Ok(())
}

fn print_poll_summary(result: &PollResult) {
    println!();
    println!("  Poll complete!");
    println!(
        "  Entries:   {} fetched, {} new",
        result.entries_fetched, result.entries_new
    );
    println!("  Events:    {} added", result.events_added);
    println!(
        "  Airports:  {} updated, {} tracked",
        result.airports_updated, result.airports_tracked
    );
    println!("  Site:      {}", result.site_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    if let Some(err) = &result.fetch_error {
        println!();
        println!("  Warning: feed fetch failed ({err});");
        println!("  the site was re-rendered from the stored history.");
    }
    println!();
}

// ---------------------------------------------------------------------------
// Reporting commands
// ---------------------------------------------------------------------------

async fn cmd_status(data_dir: Option<&str>) -> Result<()> {
    let storage = open_existing_storage(data_dir).await?;
    let snapshot = storage.load_snapshot().await?;

    if snapshot.is_empty() {
        println!("No airports tracked yet — run `skywatch poll` first.");
        return Ok(());
    }

    println!();
    println!("  {:<22} {:<6} {:<8} Last event", "Airport", "ICAO", "Status");
    for record in snapshot.sorted_by_name() {
        let status = record.current.map_or("—", |s| s.as_str());
        let last = record
            .events
            .last()
            .map(|e| e.ts.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "—".into());
        println!(
            "  {:<22} {:<6} {:<8} {last}",
            record.name,
            record.icao.as_str(),
            status
        );
    }
    println!();
    Ok(())
}

async fn cmd_history(icao: &str, data_dir: Option<&str>) -> Result<()> {
    let icao: Icao = icao.parse().map_err(|e| eyre!("{e}"))?;
    let storage = open_existing_storage(data_dir).await?;

    let Some(record) = storage.get_airport(&icao).await? else {
        println!("No history for {icao}.");
        return Ok(());
    };

    println!();
    println!("  {} ({})", record.name, record.icao);
    for event in record.events.iter().rev() {
        println!(
            "  {}  {}",
            event.ts.format("%Y-%m-%d %H:%M UTC"),
            event.status
        );
    }
    println!();
    Ok(())
}

/// Open the database read-only, failing clearly when no data exists yet.
async fn open_existing_storage(data_dir: Option<&str>) -> Result<Storage> {
    let dir = resolve_data_dir(data_dir)?;
    let db_path = dir.join("skywatch.db");
    if !db_path.exists() {
        return Err(eyre!(
            "no database at '{}' — run `skywatch poll` first",
            db_path.display()
        ));
    }
    Ok(Storage::open_readonly(&db_path).await?)
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &PollResult) {
        self.spinner.finish_and_clear();
    }
}
