mod analytics;
mod broker;
mod config;
mod data;
mod engine;
mod errors;
mod execution;
mod market;
mod news;
mod persistence;
mod strategies;
mod types;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use broker::HttpBroker;
use config::RunConfig;
use data::{CsvSource, HistoricalSource, HttpSource, SqliteSource};
use engine::{CancelToken, LiveEngine, PollingFeed, ReplayEngine};
use errors::EngineError;
use news::{GuardrailMode, StaticGuardrail};
use persistence::{DecisionLogger, SqliteDecisionLog};
use types::{Candle, Symbol};

#[derive(Parser)]
#[command(name = "smc-bot")]
#[command(version = "0.1.0")]
#[command(about = "Deterministic multi-timeframe market-structure trading engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay historical M1 candles through the full pipeline
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// End date (YYYY-MM-DD), exclusive
        #[arg(long)]
        end: String,
        /// Comma-separated symbols; defaults to the configured list
        #[arg(long)]
        symbols: Option<String>,
        /// Directory of {SYMBOL}.csv files
        #[arg(long, default_value = "data")]
        data: String,
        /// SQLite candle store (overrides --data)
        #[arg(long)]
        sqlite: Option<String>,
        /// Broker-adapter candle endpoint (overrides --data)
        #[arg(long)]
        http: Option<String>,
        /// Output directory for summary/trades/equity/decisions
        #[arg(long, default_value = "replay-out")]
        output: String,
        /// Fixed guardrail mode for the whole run (normal|reduced|blocked)
        #[arg(long, default_value = "normal")]
        guardrail: String,
    },
    /// Run the live loop against a broker bridge
    Live {
        /// Broker bridge base URL
        #[arg(long)]
        broker_url: String,
        /// Candle endpoint base URL (defaults to the broker bridge)
        #[arg(long)]
        feed_url: Option<String>,
        /// SQLite decision log path
        #[arg(long)]
        decision_log: Option<String>,
    },
    /// Print the current multi-timeframe structure for one symbol
    Analyze {
        /// Symbol to analyze
        #[arg(long)]
        symbol: String,
        /// Directory of {SYMBOL}.csv files
        #[arg(long, default_value = "data")]
        data: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("logging already initialized");
    }

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            e.downcast_ref::<EngineError>()
                .map(EngineError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Backtest {
            start,
            end,
            symbols,
            data,
            sqlite,
            http,
            output,
            guardrail,
        } => {
            run_backtest(
                config, &start, &end, symbols, &data, sqlite, http, &output, &guardrail,
            )
            .await
        }
        Commands::Live {
            broker_url,
            feed_url,
            decision_log,
        } => run_live(config, broker_url, feed_url, decision_log).await,
        Commands::Analyze { symbol, data } => run_analyze(config, &symbol, &data).await,
    }
}

fn load_config(path: &str) -> Result<RunConfig> {
    let config = if Path::new(path).exists() {
        RunConfig::from_file(Path::new(path))?
    } else {
        info!("no config file at {path}, using defaults with env overrides");
        let mut config = RunConfig::default();
        config.apply_env();
        config
    };

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {e}");
        }
        return Err(EngineError::Config(format!("{} error(s)", errors.len())).into());
    }
    Ok(config)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| EngineError::Config(format!("bad date '{raw}': {e}")))?;
    Ok(date
        .and_time(NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"))
        .and_utc())
}

fn parse_symbols(config: &RunConfig, raw: Option<String>) -> Result<Vec<Symbol>> {
    match raw {
        None => Ok(config.general.symbols.clone()),
        Some(list) => list
            .split(',')
            .map(|s| {
                Symbol::parse(s.trim())
                    .ok_or_else(|| EngineError::Config(format!("unknown symbol '{s}'")).into())
            })
            .collect(),
    }
}

fn parse_guardrail(raw: &str) -> Result<GuardrailMode> {
    match raw.to_lowercase().as_str() {
        "normal" => Ok(GuardrailMode::Normal),
        "reduced" => Ok(GuardrailMode::Reduced),
        "blocked" => Ok(GuardrailMode::Blocked),
        other => Err(EngineError::Config(format!("unknown guardrail mode '{other}'")).into()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_backtest(
    mut config: RunConfig,
    start: &str,
    end: &str,
    symbols: Option<String>,
    data_dir: &str,
    sqlite: Option<String>,
    http: Option<String>,
    output: &str,
    guardrail: &str,
) -> Result<i32> {
    let from = parse_date(start)?;
    let to = parse_date(end)?;
    let symbols = parse_symbols(&config, symbols)?;
    config.general.symbols = symbols.clone();
    let guardrail = parse_guardrail(guardrail)?;

    let source: Box<dyn HistoricalSource> = if let Some(db) = sqlite {
        Box::new(SqliteSource::new(&db).await?)
    } else if let Some(url) = http {
        Box::new(HttpSource::new(url))
    } else {
        Box::new(CsvSource::new(PathBuf::from(data_dir)))
    };

    let mut data: BTreeMap<Symbol, Vec<Candle>> = BTreeMap::new();
    for symbol in &symbols {
        let candles = source.load_candles(*symbol, from, to).await?;
        info!("[{symbol}] {} candles loaded", candles.len());
        data.insert(*symbol, candles);
    }

    let token = CancelToken::new();
    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_token.cancel();
        }
    });

    let initial_balance = config.scheduler.initial_balance;
    let report = tokio::task::spawn_blocking(move || {
        let mut engine = ReplayEngine::with_guardrail(config, guardrail);
        engine.run(data, from, to, &token)
    })
    .await??;

    report.write_outputs(Path::new(output))?;
    report.print_summary();
    info!(
        "replay finished: balance {} -> {}",
        initial_balance, report.summary.final_balance
    );

    Ok(if report.summary.cancelled { 3 } else { 0 })
}

async fn run_live(
    config: RunConfig,
    broker_url: String,
    feed_url: Option<String>,
    decision_log: Option<String>,
) -> Result<i32> {
    let broker = HttpBroker::new(broker_url.clone());
    let feed_source = HttpSource::new(feed_url.unwrap_or(broker_url));
    let mut feed = PollingFeed::new(feed_source, config.general.symbols.clone(), 60);

    let logger = match decision_log {
        Some(path) => {
            let log = SqliteDecisionLog::new(&path).await?;
            Some(DecisionLogger::spawn(log, 1024))
        }
        None => None,
    };

    let token = CancelToken::new();
    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_token.cancel();
        }
    });

    // The news guardrail service is wired per deployment; without one the
    // engine runs with a fixed normal verdict.
    let guardrail = StaticGuardrail::normal();
    let mut engine = LiveEngine::new(config);
    engine
        .run(&mut feed, &broker, &guardrail, logger.as_ref(), &token)
        .await?;

    if let Some(logger) = &logger {
        if logger.drops() > 0 {
            error!("{} decision records dropped", logger.drops());
        }
    }
    Ok(0)
}

async fn run_analyze(config: RunConfig, symbol: &str, data_dir: &str) -> Result<i32> {
    let symbol = Symbol::parse(symbol)
        .ok_or_else(|| EngineError::Config(format!("unknown symbol '{symbol}'")))?;
    let source = CsvSource::new(PathBuf::from(data_dir));
    let candles = source
        .load_candles(
            symbol,
            DateTime::<Utc>::MIN_UTC,
            DateTime::<Utc>::MAX_UTC,
        )
        .await?;
    if candles.is_empty() {
        return Err(EngineError::DataLoad(format!("no candles for {symbol}")).into());
    }

    let mut store = market::CandleStore::default();
    let mut aggregator = market::CandleAggregator::new();
    for candle in &candles {
        for closed in aggregator.roll(candle) {
            store.append(closed)?;
        }
        store.append(candle.clone())?;
    }

    let last = candles.last().expect("non-empty");
    let spread = config.scheduler.spread_for(symbol);
    let builder = config.context_builder(symbol);
    let snapshot = builder.build(
        &store,
        symbol,
        last.timestamp,
        last.close - spread / rust_decimal::Decimal::TWO,
        last.close + spread / rust_decimal::Decimal::TWO,
    );

    println!("{symbol} @ {}", last.timestamp);
    for ctx in [&snapshot.htf, &snapshot.itf, &snapshot.ltf] {
        let pd = ctx
            .pd
            .map(|p| format!("{:?} ({:.2})", p.zone, p.position))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {}: {} candles | bias {} | trend {} (bias-trend {}) | PD {} | swings {} | BOS/CHoCH {} | OB {} | FVG {} | sweeps {}",
            ctx.timeframe,
            ctx.candle_count,
            ctx.bias,
            ctx.trend,
            ctx.bias_trend,
            pd,
            ctx.swings.len(),
            ctx.events.len(),
            ctx.zones.order_blocks.len(),
            ctx.zones.fvgs.len(),
            ctx.zones.sweeps.len(),
        );
    }

    Ok(0)
}
