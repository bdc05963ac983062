//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_history_adapter::CsvHistoryAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::in_memory_state_store::InMemoryStateStore;
use crate::adapters::json_state_store::JsonStateStore;
use crate::adapters::simulated_venue::SimulatedVenue;
use crate::adapters::tracing_event_sink::TracingEventSink;
use crate::domain::config::{
    ExecutionConfig, IndicatorConfig, MarketConfig, PipelineConfig, StateBackend, StateConfig,
    StrategySettings, VenueKind, WarmupConfig,
};
use crate::domain::config_validation::{
    read_bool, read_double, read_int, validate_pipeline_config,
};
use crate::domain::driver::{PipelineDriver, RunReport};
use crate::domain::error::TicktraderError;
use crate::domain::orchestrator::DecisionPolicy;
use crate::domain::strategy::parse_strategy_list;
use crate::domain::symbol::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::state_store_port::StateStorePort;

#[derive(Parser, Debug)]
#[command(name = "ticktrader", about = "Event-driven market tick pipeline", version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline (the default when no subcommand is given)
    Run(RunArgs),
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// INI configuration file
    #[arg(short, long, env = "TICKTRADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma separated pairs, e.g. BTC/USDT,ETH/USDT
    #[arg(long, env = "TICKTRADER_SYMBOLS")]
    pub symbols: Option<String>,

    #[arg(long, env = "TICKTRADER_MAX_TICKS")]
    pub max_ticks: Option<u64>,

    #[arg(long, env = "TICKTRADER_TICK_SLEEP_MS")]
    pub tick_sleep_ms: Option<u64>,

    /// Seed for the synthetic tick source
    #[arg(long, env = "TICKTRADER_SEED")]
    pub seed: Option<u64>,

    /// Comma separated strategy names, evaluated in order
    #[arg(long, env = "TICKTRADER_STRATEGIES")]
    pub strategies: Option<String>,

    /// first_match or highest_confidence
    #[arg(long, env = "TICKTRADER_POLICY")]
    pub policy: Option<String>,

    /// Snapshot directory (json) or database file (sqlite)
    #[arg(long, env = "TICKTRADER_STATE_PATH")]
    pub state_path: Option<PathBuf>,

    /// Log filter, e.g. info or ticktrader=debug (overrides RUST_LOG)
    #[arg(long, env = "TICKTRADER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn log_level(&self) -> Option<&str> {
        match &self.command {
            Some(Command::Run(args)) => args.log_level.as_deref(),
            _ => self.run.log_level.as_deref(),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Some(Command::Run(args)) => run_pipeline(&args),
        Some(Command::Validate { config }) => run_validate(&config),
        None => run_pipeline(&cli.run),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_pipeline(args: &RunArgs) -> ExitCode {
    let config = match resolve_config(args) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut driver = match build_driver(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match driver.run() {
        Ok(report) => {
            println!("{}", format_report(&report));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match validate_pipeline_config(&adapter)
        .and_then(|()| build_pipeline_config(&adapter))
        .and_then(|c| c.validate().map(|()| c))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols: Vec<&str> = config.symbols.iter().map(|s| s.as_str()).collect();
    let strategies: Vec<String> = config.strategies.iter().map(|s| s.to_string()).collect();
    eprintln!("\nPipeline:");
    eprintln!("  environment: {}", config.environment);
    eprintln!("  symbols:     {}", symbols.join(", "));
    eprintln!("  max_ticks:   {}", config.max_ticks);
    eprintln!("  tick_sleep:  {} ms", config.tick_sleep.as_millis());
    eprintln!("\nStrategies:");
    eprintln!("  enabled: {}", strategies.join(", "));
    eprintln!("  policy:  {}", config.decision_policy);
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// File (if any) first, then command line overrides.
pub fn resolve_config(args: &RunArgs) -> Result<PipelineConfig, ExitCode> {
    let base = match &args.config {
        Some(path) => {
            let adapter = load_config(path)?;
            validate_pipeline_config(&adapter)
                .and_then(|()| build_pipeline_config(&adapter))
                .map_err(|e| {
                    eprintln!("error: {e}");
                    ExitCode::from(&e)
                })?
        }
        None => PipelineConfig::default(),
    };
    apply_overrides(base, args).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn build_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, TicktraderError> {
    let defaults = PipelineConfig::default();

    let symbols = match config.get_string("pipeline", "symbols") {
        Some(raw) => parse_symbols(&raw)
            .map_err(|e| TicktraderError::config_invalid("pipeline", "symbols", e.to_string()))?,
        None => defaults.symbols.clone(),
    };

    let ind = IndicatorConfig::default();
    let indicators = IndicatorConfig {
        fast_interval: uint(config, "indicators", "fast_interval", ind.fast_interval)?,
        medium_interval: uint(config, "indicators", "medium_interval", ind.medium_interval)?,
        heavy_interval: uint(config, "indicators", "heavy_interval", ind.heavy_interval)?,
        fast_window: size(config, "indicators", "fast_window", ind.fast_window)?,
        medium_window: size(config, "indicators", "medium_window", ind.medium_window)?,
        heavy_window: size(config, "indicators", "heavy_window", ind.heavy_window)?,
        ema_period: size(config, "indicators", "ema_period", ind.ema_period)?,
        rsi_period: size(config, "indicators", "rsi_period", ind.rsi_period)?,
    };

    let mk = MarketConfig::default();
    let market = MarketConfig {
        order_flow: read_bool(config, "market", "order_flow")?.unwrap_or(mk.order_flow),
        orderbook_depth: size(config, "market", "orderbook_depth", mk.orderbook_depth)?,
        trades_history: size(config, "market", "trades_history", mk.trades_history)?,
        bar_window: size(config, "market", "bar_window", mk.bar_window)?,
    };

    let strategies = match config.get_string("strategies", "enabled") {
        Some(raw) => parse_strategy_list(&raw)
            .map_err(|reason| TicktraderError::config_invalid("strategies", "enabled", reason))?,
        None => defaults.strategies.clone(),
    };
    let decision_policy = match config.get_string("strategies", "policy") {
        Some(raw) => raw
            .parse::<DecisionPolicy>()
            .map_err(|reason| TicktraderError::config_invalid("strategies", "policy", reason))?,
        None => defaults.decision_policy,
    };
    let ss = StrategySettings::default();
    let strategy_settings = StrategySettings {
        crossover_threshold_pct: double(
            config,
            "strategies",
            "crossover_threshold_pct",
            ss.crossover_threshold_pct,
        )?,
        rsi_oversold: double(config, "strategies", "rsi_oversold", ss.rsi_oversold)?,
        rsi_overbought: double(config, "strategies", "rsi_overbought", ss.rsi_overbought)?,
        order_budget: double(config, "strategies", "order_budget", ss.order_budget)?,
    };

    let ex = ExecutionConfig::default();
    let execution = ExecutionConfig {
        venue: match config.get_string("execution", "venue") {
            Some(raw) => raw
                .parse::<VenueKind>()
                .map_err(|reason| TicktraderError::config_invalid("execution", "venue", reason))?,
            None => ex.venue,
        },
        max_attempts: {
            let attempts = uint(config, "execution", "max_attempts", u64::from(ex.max_attempts))?;
            u32::try_from(attempts).map_err(|_| {
                TicktraderError::config_invalid("execution", "max_attempts", "too large")
            })?
        },
        timeout: match read_int(config, "execution", "timeout_ms")? {
            Some(ms) => Some(Duration::from_millis(to_u64("execution", "timeout_ms", ms)?)),
            None => ex.timeout,
        },
    };

    let st = StateConfig::default();
    let state = StateConfig {
        backend: match config.get_string("state", "backend") {
            Some(raw) => raw
                .parse::<StateBackend>()
                .map_err(|reason| TicktraderError::config_invalid("state", "backend", reason))?,
            None => st.backend,
        },
        path: config.get_string("state", "path").map(PathBuf::from),
        snapshot_interval: uint(config, "state", "snapshot_interval", st.snapshot_interval)?,
    };

    let warmup = WarmupConfig {
        history_dir: config.get_string("warmup", "history_dir").map(PathBuf::from),
        bars: size(config, "warmup", "bars", WarmupConfig::default().bars)?,
    };

    Ok(PipelineConfig {
        environment: config
            .get_string("pipeline", "environment")
            .map(|e| e.trim().to_string())
            .unwrap_or(defaults.environment),
        symbols,
        max_ticks: uint(config, "pipeline", "max_ticks", defaults.max_ticks)?,
        tick_sleep: Duration::from_millis(uint(
            config,
            "pipeline",
            "tick_sleep_ms",
            defaults.tick_sleep.as_millis() as u64,
        )?),
        seed: uint(config, "pipeline", "seed", defaults.seed)?,
        base_price: double(config, "pipeline", "base_price", defaults.base_price)?,
        volatility_pct: double(config, "pipeline", "volatility_pct", defaults.volatility_pct)?,
        stats_interval: uint(config, "pipeline", "stats_interval", defaults.stats_interval)?,
        indicators,
        market,
        strategies,
        strategy_settings,
        decision_policy,
        execution,
        state,
        warmup,
    })
}

pub fn apply_overrides(
    mut config: PipelineConfig,
    args: &RunArgs,
) -> Result<PipelineConfig, TicktraderError> {
    if let Some(raw) = &args.symbols {
        config.symbols = parse_symbols(raw)
            .map_err(|e| TicktraderError::config_invalid("pipeline", "symbols", e.to_string()))?;
    }
    if let Some(n) = args.max_ticks {
        config.max_ticks = n;
    }
    if let Some(ms) = args.tick_sleep_ms {
        config.tick_sleep = Duration::from_millis(ms);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(raw) = &args.strategies {
        config.strategies = parse_strategy_list(raw)
            .map_err(|reason| TicktraderError::config_invalid("strategies", "enabled", reason))?;
    }
    if let Some(raw) = &args.policy {
        config.decision_policy = raw
            .parse()
            .map_err(|reason| TicktraderError::config_invalid("strategies", "policy", reason))?;
    }
    if let Some(path) = &args.state_path {
        config.state.path = Some(path.clone());
    }
    Ok(config)
}

/// Wire the adapters selected by `config` into a driver.
pub fn build_driver(config: PipelineConfig) -> Result<PipelineDriver, TicktraderError> {
    let store = open_state_store(&config.state)?;
    let venue = config.execution.venue;
    let history_dir = config.warmup.history_dir.clone();

    let mut driver = PipelineDriver::new(config)
        .with_event_sink(Box::new(TracingEventSink::new()))
        .with_state_store(store);
    if venue == VenueKind::Simulated {
        driver = driver.with_venue(Box::new(SimulatedVenue::new()));
    }
    if let Some(dir) = history_dir {
        driver = driver.with_history(Box::new(CsvHistoryAdapter::new(dir)));
    }
    Ok(driver)
}

fn open_state_store(state: &StateConfig) -> Result<Box<dyn StateStorePort>, TicktraderError> {
    let Some(path) = &state.path else {
        return Ok(Box::new(InMemoryStateStore::new()));
    };
    match state.backend {
        StateBackend::Json => Ok(Box::new(JsonStateStore::new(path))),
        #[cfg(feature = "sqlite")]
        StateBackend::Sqlite => {
            use crate::adapters::sqlite_state_store::SqliteStateStore;
            Ok(Box::new(SqliteStateStore::open(path)?))
        }
        #[cfg(not(feature = "sqlite"))]
        StateBackend::Sqlite => Err(TicktraderError::config_invalid(
            "state",
            "backend",
            "sqlite backend requires the sqlite feature",
        )),
    }
}

pub fn format_report(report: &RunReport) -> String {
    let range = match (report.first_tick_id, report.last_tick_id) {
        (Some(first), Some(last)) => format!("ticks {}..={}", first, last),
        _ => "no ticks".to_string(),
    };
    format!(
        "{} completed={} decisions={} strategy_failures={} simulated={} sent={} failed={}{}",
        range,
        report.ticks_completed,
        report.metrics.decisions_made,
        report.metrics.strategy_failures,
        report.metrics.executions_simulated,
        report.metrics.executions_sent,
        report.metrics.executions_failed,
        if report.stopped_early { " (stopped early)" } else { "" }
    )
}

fn to_u64(section: &str, key: &str, value: i64) -> Result<u64, TicktraderError> {
    u64::try_from(value)
        .map_err(|_| TicktraderError::config_invalid(section, key, "must not be negative"))
}

fn uint(config: &dyn ConfigPort, section: &str, key: &str, default: u64) -> Result<u64, TicktraderError> {
    match read_int(config, section, key)? {
        Some(v) => to_u64(section, key, v),
        None => Ok(default),
    }
}

fn size(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TicktraderError> {
    let value = uint(config, section, key, default as u64)?;
    usize::try_from(value).map_err(|_| TicktraderError::config_invalid(section, key, "too large"))
}

fn double(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, TicktraderError> {
    Ok(read_double(config, section, key)?.unwrap_or(default))
}
