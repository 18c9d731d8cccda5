use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use benibook_core::availability::{NormalizedResult, SearchRequest, ServerState};
use benibook_core::config::{config_path, load_config, load_config_from, save_config, AppConfig};
use benibook_core::finder::BookFinder;
use benibook_core::lookup::BookSummary;
use benibook_core::municipality;
use benibook_core::progress::{PollEvent, PollObserver, PollPhase};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "benibook")]
#[command(about = "Book metadata and library availability by ISBN")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show title and cover URL from openBD
    Info {
        #[arg(required = true)]
        isbn: String,
    },

    /// Check which libraries in a system hold the book
    Availability {
        #[arg(required = true)]
        isbn: String,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Title, cover and library availability in one go
    Lookup {
        #[arg(required = true)]
        isbn: String,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// List supported library systems
    Systems,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Library system code (e.g. Tokyo_Setagaya); defaults to availability.default_system
    #[arg(short, long)]
    system: Option<String>,

    /// Calil application key (overrides config and BENIBOOK_APP_KEY)
    #[arg(long)]
    app_key: Option<String>,

    /// Milliseconds to wait between polls
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Maximum number of polls before giving up
    #[arg(long)]
    max_rounds: Option<u32>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config();
    tracing::debug!(calil = %cfg.availability.host, openbd = %cfg.metadata.host, "loaded config");
    let result = match &cli.command {
        Commands::Info { isbn } => run_info(&cfg, isbn, cli.json).await,
        Commands::Availability { isbn, search } => run_availability(&cfg, isbn, search, cli.json).await,
        Commands::Lookup { isbn, search } => run_lookup(&cfg, isbn, search, cli.json).await,
        Commands::Systems => run_systems(cli.json),
        Commands::Config { action } => run_config(&cfg, action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_info(cfg: &AppConfig, isbn: &str, json: bool) -> CliResult {
    let finder = BookFinder::from_config(cfg);
    let summary = finder.summary(isbn).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(isbn, &summary);
    }
    Ok(())
}

async fn run_availability(cfg: &AppConfig, isbn: &str, args: &SearchArgs, json: bool) -> CliResult {
    let request = build_request(cfg, isbn, args);
    let spinner = spinner(json)?;
    let finder = BookFinder::from_config(cfg).with_observer(Arc::new(SpinnerObserver(spinner.clone())));
    let result = finder.library_collections(&request, &interrupt_token()).await;
    spinner.finish_and_clear();
    let result = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_availability(&request, &result);
    }
    Ok(())
}

async fn run_lookup(cfg: &AppConfig, isbn: &str, args: &SearchArgs, json: bool) -> CliResult {
    let request = build_request(cfg, isbn, args);
    let spinner = spinner(json)?;
    let finder = BookFinder::from_config(cfg).with_observer(Arc::new(SpinnerObserver(spinner.clone())));
    let found = finder.lookup(&request, &interrupt_token()).await;
    spinner.finish_and_clear();
    let found = found?;
    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        print_summary(isbn, &found.book);
        print_availability(&request, &found.availability);
    }
    Ok(())
}

fn run_systems(json: bool) -> CliResult {
    let systems = municipality::all();
    if json {
        println!("{}", serde_json::to_string_pretty(systems)?);
    } else {
        for m in systems {
            println!("{:<24} {}", m.code, m.name);
        }
    }
    Ok(())
}

fn build_request(cfg: &AppConfig, isbn: &str, args: &SearchArgs) -> SearchRequest {
    let mut request = cfg.availability.request(isbn, args.system.as_deref());
    if let Some(key) = &args.app_key {
        request.app_key = key.clone();
    }
    if let Some(ms) = args.interval_ms {
        request.poll_interval = Duration::from_millis(ms);
    }
    if let Some(rounds) = args.max_rounds {
        request.max_rounds = rounds;
    }
    request
}

/// Spinner on stderr, hidden when the output is JSON.
fn spinner(json: bool) -> Result<ProgressBar, Box<dyn std::error::Error + Send + Sync>> {
    if json {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Token cancelled by Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    cancel
}

struct SpinnerObserver(ProgressBar);

impl PollObserver for SpinnerObserver {
    fn on_poll(&self, event: PollEvent) {
        let msg = match event.phase {
            PollPhase::Requesting if event.round == 0 => {
                format!("Searching {} in {}", event.isbn, event.system_id)
            }
            PollPhase::Requesting => format!("Polling ({})", event.round),
            PollPhase::Waiting { interval } => {
                format!("Libraries still answering, retrying in {}ms", interval.as_millis())
            }
            PollPhase::Finished { state } => match state {
                ServerState::Success | ServerState::NotFound => "Done".to_string(),
                _ => "Search failed".to_string(),
            },
        };
        self.0.set_message(msg);
    }
}

fn print_summary(isbn: &str, summary: &BookSummary) {
    if !summary.found {
        println!("No bibliographic data for {}", isbn);
        return;
    }
    println!("Title: {}", summary.title);
    if !summary.cover_url.is_empty() {
        println!("Cover: {}", summary.cover_url);
    }
}

fn print_availability(request: &SearchRequest, result: &NormalizedResult) {
    let system = municipality::find(&request.system_id)
        .map(|m| m.name)
        .unwrap_or(request.system_id.as_str());
    if !result.is_held() {
        println!("No library in {} holds {}", system, request.isbn);
        return;
    }
    println!("{} ({} libraries):", system, result.library_stock.len());
    for lib in &result.library_stock {
        println!("  {:>3}. {} - {}", lib.id, lib.name, lib.status);
    }
    if !result.reserve_url.is_empty() {
        println!("Reserve: {}", result.reserve_url);
    }
}

fn run_config(cfg: &AppConfig, action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            save_config(&AppConfig::default(), &path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut file_cfg = if path.exists() {
                load_config_from(&path)?
            } else {
                AppConfig::default()
            };
            file_cfg.set_key(key, value)?;
            save_config(&file_cfg, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
