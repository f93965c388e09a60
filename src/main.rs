mod config;
mod engine;
mod error;
mod indicator;
mod model;
mod notifier;
mod signal;
mod source;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use engine::EngineConfig;
use engine::scoring::SignalEngine;
use error::SourceError;
use model::{ForexPair, MarketMetrics, SourceKind, TimeFrame};
use notifier::Notifier;
use notifier::json::JsonNotifier;
use notifier::terminal::TerminalNotifier;
use signal::{Signal, SignalReport};
use source::MarketDataSource;
use source::binance::BinanceSource;
use source::chain::FallbackChain;
use source::yahoo::YahooSource;

const NO_MARKET_DATA: &str = "No market data available";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data source error")]
    Source,
    #[display("signal engine error")]
    Engine,
    #[display("failed to write output")]
    Output,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "forex-signal", about = "Forex technical-analysis signal engine")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch candles and print one signal
    Signal {
        #[arg(long, value_parser = parse_pair)]
        pair: ForexPair,
        #[arg(long, value_parser = parse_timeframe, default_value = "15m")]
        timeframe: TimeFrame,
        /// Print the report as JSON instead of logging it
        #[arg(long)]
        json: bool,
    },
    /// Re-evaluate a pair on a fixed interval until ctrl+c
    Watch {
        #[arg(long, value_parser = parse_pair)]
        pair: ForexPair,
        #[arg(long, value_parser = parse_timeframe, default_value = "15m")]
        timeframe: TimeFrame,
        /// Defaults to `general.poll_interval_secs`
        #[arg(long)]
        interval_secs: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Print market metrics and raw candles as JSON
    Candles {
        #[arg(long, value_parser = parse_pair)]
        pair: ForexPair,
        #[arg(long, value_parser = parse_timeframe, default_value = "15m")]
        timeframe: TimeFrame,
        /// Query one source instead of the fallback chain
        #[arg(long, value_parser = parse_source)]
        source: Option<SourceKind>,
    },
    /// List configured pairs and supported timeframes
    Symbols,
    /// 24h price summary for the overview pairs
    Overview,
}

fn parse_pair(s: &str) -> Result<ForexPair, String> {
    ForexPair::parse(s).ok_or_else(|| format!("expected BASE/QUOTE, e.g. EUR/USD, got {s:?}"))
}

fn parse_timeframe(s: &str) -> Result<TimeFrame, String> {
    TimeFrame::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = TimeFrame::ALL.iter().map(|tf| tf.as_str()).collect();
        format!("unknown timeframe {s:?}, expected one of {}", known.join(", "))
    })
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    SourceKind::from_str(s).ok_or_else(|| format!("unknown source {s:?}, expected yahoo or binance"))
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    match cli.command {
        Command::Signal {
            pair,
            timeframe,
            json,
        } => {
            let pipeline = Pipeline::build(&config, json)?;
            pipeline.run_once(&pair, timeframe).await;
            Ok(())
        }
        Command::Watch {
            pair,
            timeframe,
            interval_secs,
            json,
        } => {
            let interval = interval_secs.unwrap_or(config.general.poll_interval_secs);
            if interval == 0 {
                return Err(Report::new(AppError::Config).attach("--interval-secs must be > 0"));
            }
            let pipeline = Arc::new(Pipeline::build(&config, json)?);
            watch(pipeline, pair, timeframe, Duration::from_secs(interval)).await
        }
        Command::Candles {
            pair,
            timeframe,
            source,
        } => print_candles(&config, &pair, timeframe, source).await,
        Command::Symbols => print_symbols(&config),
        Command::Overview => print_overview(&config).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    // stdout carries command output; logs go to stderr
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_source(
    kind: SourceKind,
    config: &AppConfig,
) -> Result<Arc<dyn MarketDataSource>, Report<SourceError>> {
    Ok(match kind {
        SourceKind::Yahoo => Arc::new(YahooSource::new(&config.sources)?),
        SourceKind::Binance => Arc::new(BinanceSource::new(&config.sources)?),
    })
}

fn build_chain(config: &AppConfig) -> Result<FallbackChain, Report<SourceError>> {
    let sources = config
        .source_order()
        .into_iter()
        .map(|kind| build_source(kind, config))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FallbackChain::new(sources))
}

/// Fetch → evaluate → notify, shared by `signal` and `watch`.
struct Pipeline {
    chain: FallbackChain,
    engine: SignalEngine,
    notifier: Box<dyn Notifier>,
    candle_limit: usize,
}

impl Pipeline {
    fn build(config: &AppConfig, json: bool) -> Result<Self, Report<AppError>> {
        let engine_config =
            EngineConfig::from_settings(&config.engine).change_context(AppError::Config)?;
        let engine = SignalEngine::new(engine_config).change_context(AppError::Engine)?;
        let chain = build_chain(config).change_context(AppError::Source)?;
        let notifier: Box<dyn Notifier> = if json {
            Box::new(JsonNotifier::stdout())
        } else {
            Box::new(TerminalNotifier)
        };

        info!(
            preset = %config.engine.preset,
            min_candles = engine.config().min_candles,
            sources = ?config.sources.order,
            "signal pipeline ready"
        );

        Ok(Self {
            chain,
            engine,
            notifier,
            candle_limit: config.general.candle_limit,
        })
    }

    async fn run_once(&self, pair: &ForexPair, timeframe: TimeFrame) {
        let report = match self.chain.fetch(pair, timeframe, self.candle_limit).await {
            Ok((source, candles)) => SignalReport {
                symbol: pair.to_string(),
                timeframe: timeframe.to_string(),
                source: Some(source),
                signal: self.engine.evaluate(&candles),
                last_price: candles.last().map(|c| c.close),
                total_candles: candles.len(),
                last_update: Utc::now(),
            },
            Err(e) => {
                tracing::warn!(error = ?e, symbol = %pair, "no market data, reporting HOLD");
                SignalReport {
                    symbol: pair.to_string(),
                    timeframe: timeframe.to_string(),
                    source: None,
                    signal: Signal::neutral(NO_MARKET_DATA),
                    last_price: None,
                    total_candles: 0,
                    last_update: Utc::now(),
                }
            }
        };
        self.notifier.notify(&report);
    }
}

async fn watch(
    pipeline: Arc<Pipeline>,
    pair: ForexPair,
    timeframe: TimeFrame,
    every: Duration,
) -> Result<(), Report<AppError>> {
    let cancel = CancellationToken::new();

    info!(symbol = %pair, timeframe = %timeframe, every_secs = every.as_secs(), "watching");

    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => pipeline.run_once(&pair, timeframe).await,
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;

    info!("shutdown complete");
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), Report<AppError>> {
    let text = serde_json::to_string_pretty(value).change_context(AppError::Output)?;
    println!("{text}");
    Ok(())
}

async fn print_candles(
    config: &AppConfig,
    pair: &ForexPair,
    timeframe: TimeFrame,
    source: Option<SourceKind>,
) -> Result<(), Report<AppError>> {
    let limit = config.general.candle_limit;
    let (kind, candles) = match source {
        Some(kind) => {
            let source = build_source(kind, config).change_context(AppError::Source)?;
            let raw = source
                .fetch_candles(pair, timeframe, limit)
                .await
                .change_context(AppError::Source)?;
            (kind, model::sanitize(&raw))
        }
        None => build_chain(config)
            .change_context(AppError::Source)?
            .fetch(pair, timeframe, limit)
            .await
            .change_context(AppError::Source)?,
    };

    print_json(&serde_json::json!({
        "symbol": pair.to_string(),
        "timeframe": timeframe.as_str(),
        "source": kind,
        "metrics": MarketMetrics::from_candles(&candles),
        "totalCandles": candles.len(),
        "candles": candles,
    }))
}

fn print_symbols(config: &AppConfig) -> Result<(), Report<AppError>> {
    let pairs: Vec<String> = config.pairs().iter().map(ToString::to_string).collect();
    let timeframes: Vec<serde_json::Value> = TimeFrame::ALL
        .iter()
        .map(|tf| serde_json::json!({ "value": tf.as_str(), "label": tf.label() }))
        .collect();

    print_json(&serde_json::json!({
        "pairs": pairs,
        "timeframes": timeframes,
    }))
}

async fn print_overview(config: &AppConfig) -> Result<(), Report<AppError>> {
    let binance = BinanceSource::new(&config.sources).change_context(AppError::Source)?;

    let mut summaries = Vec::new();
    for pair in config.overview_pairs() {
        match binance.fetch_ticker_24h(&pair).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                tracing::warn!(error = ?e, symbol = %pair, "24h ticker unavailable, skipping");
            }
        }
    }

    info!(
        requested = config.general.overview_pairs.len(),
        fetched = summaries.len(),
        "overview complete"
    );

    print_json(&serde_json::json!({ "market": summaries }))
}
