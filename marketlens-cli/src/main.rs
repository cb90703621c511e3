//! MarketLens CLI: prices, signals, picks and cache management.
//!
//! Commands:
//! - `price`, `options`, `trend`: one data kind for one symbol
//! - `signal`: CALL / PUT / NEUTRAL for a symbol or index name
//! - `indices`: signals for Nifty 50, Bank Nifty and Sensex
//! - `picks`: ranked regular, penny and mixed tables for the universe
//! - `cache clear | cleanup | status`: inspect and prune the cache
//! - `config`: print the effective configuration as TOML

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use marketlens_core::signals::{NewsSentiment, PickTables, Signal, StockPick};
use marketlens_core::{MarketObservation, OptionsSnapshot, Sourced, TrendSnapshot};
use marketlens_runner::{
    export_picks_csv, export_picks_json, export_signal_json, load_headlines, write_file,
    MarketService, ServiceConfig,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marketlens",
    about = "MarketLens CLI: cached market data and intraday CALL/PUT signals"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offline mode: no network access, every value is synthetic.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    /// Seed for synthetic fallback data.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Cache directory, overriding the config file.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Live price snapshot.
    Price { symbol: String },
    /// Aggregated open interest and implied volatility, nearest expiry.
    Options { symbol: String },
    /// Intraday trend over 5-minute closes.
    Trend {
        symbol: String,

        /// Number of closes in the regression window.
        #[arg(long)]
        periods: Option<usize>,
    },
    /// Classify a symbol or index name ("Nifty 50", "Bank Nifty", "Sensex").
    Signal { name: String },
    /// Signals for every tracked index.
    Indices,
    /// Rank the universe into pick tables.
    Picks {
        /// JSON array of scored headlines: [{"text": ..., "compound": ...}].
        #[arg(long)]
        news: Option<PathBuf>,

        /// Write all tables as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write all tables as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every entry, or those whose key contains the pattern.
    Clear {
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Remove expired and unreadable entries.
    Cleanup,
    /// Report entry counts, size and keys.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if cli.offline {
        config.provider.offline = true;
    }
    if let Some(seed) = cli.seed {
        config.fallback.seed = Some(seed);
    }
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let service = MarketService::open(config)?;
    let result = run_command(&service, cli.command, cli.format == OutputFormat::Json);
    let report = service.close();
    debug!(?report, "final cache sweep");
    result
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(service: &MarketService, command: Commands, as_json: bool) -> Result<()> {
    match command {
        Commands::Price { symbol } => {
            let price = service.get_live_price(&symbol);
            if as_json {
                print_json(&sourced_json(&price))
            } else {
                print_price(&price);
                Ok(())
            }
        }
        Commands::Options { symbol } => {
            let options = service.get_options_chain(&symbol);
            if as_json {
                print_json(&sourced_json(&options))
            } else {
                print_options(&options);
                Ok(())
            }
        }
        Commands::Trend { symbol, periods } => {
            let trend = service.get_intraday_trend(&symbol, periods);
            if as_json {
                print_json(&sourced_json(&trend))
            } else {
                print_trend(&trend);
                Ok(())
            }
        }
        Commands::Signal { name } => {
            let signal = service.get_signal(&name);
            if as_json {
                println!("{}", export_signal_json(&signal)?);
            } else {
                print_signal(&name, &signal);
            }
            Ok(())
        }
        Commands::Indices => {
            let signals = service.index_signals();
            if as_json {
                let by_name: BTreeMap<&str, &Signal> =
                    signals.iter().map(|(name, s)| (*name, s)).collect();
                print_json(&by_name)
            } else {
                for (name, signal) in &signals {
                    print_signal(name, signal);
                }
                Ok(())
            }
        }
        Commands::Picks { news, csv, json } => run_picks(service, news, csv, json, as_json),
        Commands::Cache { action } => run_cache(service, action, as_json),
        Commands::Config => Ok(()),
    }
}

fn run_picks(
    service: &MarketService,
    news: Option<PathBuf>,
    csv: Option<PathBuf>,
    json_out: Option<PathBuf>,
    as_json: bool,
) -> Result<()> {
    let sentiment = match news {
        Some(path) => service.news_sentiment(&load_headlines(&path)?),
        None => NewsSentiment::empty(),
    };

    let tables = service.pick_tables(&sentiment);
    let now = chrono::Utc::now();

    if let Some(path) = &csv {
        write_file(path, &export_picks_csv(&tables)?)?;
        eprintln!("CSV written to: {}", path.display());
    }
    if let Some(path) = &json_out {
        write_file(path, &export_picks_json(&tables, now)?)?;
        eprintln!("JSON written to: {}", path.display());
    }

    if as_json {
        println!("{}", export_picks_json(&tables, now)?);
    } else {
        print_tables(&tables);
    }
    Ok(())
}

fn run_cache(service: &MarketService, action: CacheAction, as_json: bool) -> Result<()> {
    match action {
        CacheAction::Clear { pattern } => {
            let report = service.clear_cache(pattern.as_deref());
            if as_json {
                return print_json(&report);
            }
            println!(
                "Cleared {} in-memory and {} persisted entries{}.",
                report.memory_removed,
                report.persisted_removed,
                pattern
                    .as_deref()
                    .map(|p| format!(" matching '{p}'"))
                    .unwrap_or_default()
            );
        }
        CacheAction::Cleanup => {
            let report = service.cleanup_expired();
            if as_json {
                return print_json(&report);
            }
            println!(
                "Removed {} expired record(s), {} unreadable, {} abandoned temp file(s).",
                report.persisted_removed, report.corrupt_removed, report.temp_removed
            );
        }
        CacheAction::Status => {
            let stats = service.cache_stats();
            let keys = service.persisted_keys();
            if as_json {
                return print_json(&json!({ "stats": stats, "keys": keys }));
            }
            println!("Cache:    {}", service.config().cache.dir.display());
            println!("Records:  {}", stats.persisted_records);
            println!("Size:     {}", format_size(stats.persisted_bytes));
            if !keys.is_empty() {
                println!();
                for key in &keys {
                    println!("  {key}");
                }
            }
        }
    }
    Ok(())
}

// ─── Output helpers ─────────────────────────────────────────────────

fn sourced_json<T: Serialize>(value: &Sourced<T>) -> serde_json::Value {
    json!({
        "source": if value.is_synthetic() { "synthetic" } else { "real" },
        "reason": value.reason(),
        "data": value.value(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn synthetic_note<T>(value: &Sourced<T>) -> String {
    value
        .reason()
        .map(|r| format!("  [synthetic: {r}]"))
        .unwrap_or_default()
}

fn print_price(price: &Sourced<MarketObservation>) {
    let p = price.value();
    println!(
        "{}  ₹{:.2}  {:+.2} ({:+.2}%)  vol {:.2}x  range ₹{:.2}–₹{:.2}{}",
        p.symbol,
        p.current_price,
        p.price_change,
        p.price_change_pct,
        p.volume_ratio,
        p.day_low,
        p.day_high,
        synthetic_note(price)
    );
}

fn print_options(options: &Sourced<OptionsSnapshot>) {
    let o = options.value();
    println!(
        "{}  expiry {}  PCR {:.2}  call OI {:.0}  put OI {:.0}  IV {:.1}% / {:.1}%{}",
        o.symbol,
        o.expiry_date,
        o.put_call_ratio,
        o.total_call_oi,
        o.total_put_oi,
        o.avg_call_iv * 100.0,
        o.avg_put_iv * 100.0,
        synthetic_note(options)
    );
}

fn print_trend(trend: &Sourced<TrendSnapshot>) {
    let t = trend.value();
    let basis = if t.has_sufficient_data() {
        String::new()
    } else {
        "  (insufficient data)".to_string()
    };
    println!(
        "{}  {}  strength {:.2}  slope {:+.4}{}{}",
        t.symbol,
        t.direction.label(),
        t.strength,
        t.slope,
        basis,
        synthetic_note(trend)
    );
}

fn print_signal(name: &str, signal: &Signal) {
    println!();
    println!("=== {name} ({}) ===", signal.symbol);
    println!(
        "Signal:      {}  (score {:+.3}, confidence {:.1}%)",
        signal.classification, signal.score, signal.confidence
    );
    println!(
        "Price:       ₹{:.2} ({:+.2}%)",
        signal.inputs.price.current_price, signal.inputs.price.price_change_pct
    );
    for reason in &signal.rationale {
        println!("  - {reason}");
    }
    if signal.degraded {
        println!(
            "WARNING: based on SYNTHETIC data ({})",
            signal.degraded_reasons.join(", ")
        );
    }
}

fn print_pick_table(title: &str, picks: &[StockPick]) {
    println!();
    println!("--- {title} ---");
    if picks.is_empty() {
        println!("No picks above the score threshold.");
        return;
    }
    println!(
        "{:<3} {:<12} {:>10} {:>8} {:>6} {:<28} {:<24} {:<14}",
        "#", "Stock", "Price", "Change", "Conf", "Buy", "Target", "Return"
    );
    println!("{}", "-".repeat(112));
    for (i, p) in picks.iter().enumerate() {
        println!(
            "{:<3} {:<12} {:>10.2} {:>7.2}% {:>5.1}% {:<28} {:<24} {:<14}{}",
            i + 1,
            p.display_name,
            p.price,
            p.price_change_pct,
            p.confidence,
            p.buy_position.to_string(),
            p.sell_position.to_string(),
            p.potential_return.to_string(),
            if p.degraded { " *" } else { "" }
        );
        println!("    {}  |  risk: {}", p.reason_summary(), p.risk_summary());
    }
}

fn print_tables(tables: &PickTables) {
    print_pick_table("Regular stocks", &tables.regular);
    print_pick_table("Penny stocks", &tables.penny);
    print_pick_table("Mixed", &tables.mixed);
    let degraded = tables
        .regular
        .iter()
        .chain(&tables.penny)
        .any(|p| p.degraded);
    if degraded {
        println!();
        println!("* scored on SYNTHETIC data");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
