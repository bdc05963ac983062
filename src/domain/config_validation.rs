//! Configuration file validation.
//!
//! Checks the raw INI values before a [`PipelineConfig`] is built from them.
//! Keys that are absent fall back to defaults; keys that are present must
//! parse and be in range.
//!
//! [`PipelineConfig`]: crate::domain::config::PipelineConfig

use crate::domain::config::{repeated_window, StateBackend, VenueKind};
use crate::domain::error::TicktraderError;
use crate::domain::orchestrator::DecisionPolicy;
use crate::domain::strategy::parse_strategy_list;
use crate::domain::symbol::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    validate_pipeline_section(config)?;
    validate_indicators(config)?;
    validate_market(config)?;
    validate_strategies(config)?;
    validate_execution(config)?;
    validate_state(config)?;
    validate_warmup(config)?;
    Ok(())
}

/// A present integer key, parsed; `None` when absent.
pub fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, TicktraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            TicktraderError::config_invalid(section, key, format!("{:?} is not an integer", raw))
        }),
    }
}

/// A present float key, parsed; `None` when absent.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, TicktraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(TicktraderError::config_invalid(
                section,
                key,
                format!("{:?} is not a number", raw),
            )),
        },
    }
}

/// A present boolean key (`true/yes/on/1`, `false/no/off/0`); `None` when absent.
pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, TicktraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(TicktraderError::config_invalid(
                section,
                key,
                format!("{:?} is not a boolean", raw),
            )),
        },
    }
}

fn at_least(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    min: i64,
) -> Result<Option<i64>, TicktraderError> {
    let value = read_int(config, section, key)?;
    if let Some(v) = value {
        if v < min {
            return Err(TicktraderError::config_invalid(
                section,
                key,
                format!("{} must be at least {}", key, min),
            ));
        }
    }
    Ok(value)
}

fn validate_pipeline_section(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    if let Some(env) = config.get_string("pipeline", "environment") {
        if env.trim().is_empty() {
            return Err(TicktraderError::config_invalid(
                "pipeline",
                "environment",
                "environment must not be empty",
            ));
        }
    }
    if let Some(symbols) = config.get_string("pipeline", "symbols") {
        let parsed = parse_symbols(&symbols).map_err(|e| {
            TicktraderError::config_invalid("pipeline", "symbols", e.to_string())
        })?;
        if parsed.is_empty() {
            return Err(TicktraderError::config_invalid(
                "pipeline",
                "symbols",
                "at least one symbol is required",
            ));
        }
    }
    at_least(config, "pipeline", "max_ticks", 1)?;
    at_least(config, "pipeline", "tick_sleep_ms", 0)?;
    at_least(config, "pipeline", "seed", 0)?;
    at_least(config, "pipeline", "stats_interval", 0)?;

    if let Some(price) = read_double(config, "pipeline", "base_price")? {
        if price <= 0.0 {
            return Err(TicktraderError::config_invalid(
                "pipeline",
                "base_price",
                "base_price must be positive",
            ));
        }
    }
    if let Some(vol) = read_double(config, "pipeline", "volatility_pct")? {
        if vol < 0.0 {
            return Err(TicktraderError::config_invalid(
                "pipeline",
                "volatility_pct",
                "volatility_pct must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let fast = at_least(config, "indicators", "fast_interval", 1)?.unwrap_or(1);
    let medium = at_least(config, "indicators", "medium_interval", 1)?.unwrap_or(3);
    let heavy = at_least(config, "indicators", "heavy_interval", 1)?.unwrap_or(5);
    if fast > medium || medium > heavy {
        return Err(TicktraderError::config_invalid(
            "indicators",
            "medium_interval",
            format!(
                "intervals must satisfy fast <= medium <= heavy (got {}/{}/{})",
                fast, medium, heavy
            ),
        ));
    }
    for key in [
        "fast_window",
        "medium_window",
        "heavy_window",
        "ema_period",
        "rsi_period",
    ] {
        at_least(config, "indicators", key, 1)?;
    }
    let windows = [
        ("fast_window", read_int(config, "indicators", "fast_window")?.unwrap_or(5)),
        ("medium_window", read_int(config, "indicators", "medium_window")?.unwrap_or(20)),
        ("heavy_window", read_int(config, "indicators", "heavy_window")?.unwrap_or(100)),
    ];
    if let Some(key) = repeated_window(windows) {
        return Err(TicktraderError::config_invalid(
            "indicators",
            key,
            format!(
                "fast/medium/heavy windows must differ (got {}/{}/{})",
                windows[0].1, windows[1].1, windows[2].1
            ),
        ));
    }
    Ok(())
}

fn validate_market(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    read_bool(config, "market", "order_flow")?;
    for key in ["orderbook_depth", "trades_history", "bar_window"] {
        at_least(config, "market", key, 1)?;
    }
    Ok(())
}

fn validate_strategies(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    if let Some(enabled) = config.get_string("strategies", "enabled") {
        parse_strategy_list(&enabled)
            .map_err(|reason| TicktraderError::config_invalid("strategies", "enabled", reason))?;
    }
    if let Some(policy) = config.get_string("strategies", "policy") {
        policy
            .parse::<DecisionPolicy>()
            .map_err(|reason| TicktraderError::config_invalid("strategies", "policy", reason))?;
    }

    let oversold = read_double(config, "strategies", "rsi_oversold")?.unwrap_or(30.0);
    let overbought = read_double(config, "strategies", "rsi_overbought")?.unwrap_or(70.0);
    if !(0.0..=100.0).contains(&oversold)
        || !(0.0..=100.0).contains(&overbought)
        || oversold >= overbought
    {
        return Err(TicktraderError::config_invalid(
            "strategies",
            "rsi_oversold",
            "need 0 <= rsi_oversold < rsi_overbought <= 100",
        ));
    }
    if let Some(threshold) = read_double(config, "strategies", "crossover_threshold_pct")? {
        if threshold < 0.0 {
            return Err(TicktraderError::config_invalid(
                "strategies",
                "crossover_threshold_pct",
                "crossover_threshold_pct must be non-negative",
            ));
        }
    }
    if let Some(budget) = read_double(config, "strategies", "order_budget")? {
        if budget <= 0.0 {
            return Err(TicktraderError::config_invalid(
                "strategies",
                "order_budget",
                "order_budget must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    if let Some(venue) = config.get_string("execution", "venue") {
        venue
            .parse::<VenueKind>()
            .map_err(|reason| TicktraderError::config_invalid("execution", "venue", reason))?;
    }
    at_least(config, "execution", "max_attempts", 1)?;
    at_least(config, "execution", "timeout_ms", 1)?;
    Ok(())
}

fn validate_state(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    if let Some(backend) = config.get_string("state", "backend") {
        let backend = backend
            .parse::<StateBackend>()
            .map_err(|reason| TicktraderError::config_invalid("state", "backend", reason))?;
        if backend == StateBackend::Sqlite && !cfg!(feature = "sqlite") {
            return Err(TicktraderError::config_invalid(
                "state",
                "backend",
                "sqlite backend requires the sqlite feature",
            ));
        }
    }
    if let Some(path) = config.get_string("state", "path") {
        if path.trim().is_empty() {
            return Err(TicktraderError::config_invalid(
                "state",
                "path",
                "path must not be empty when set",
            ));
        }
    }
    at_least(config, "state", "snapshot_interval", 0)?;
    Ok(())
}

fn validate_warmup(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let bars = at_least(config, "warmup", "bars", 0)?;
    if bars == Some(0) && config.has_key("warmup", "history_dir") {
        return Err(TicktraderError::config_invalid(
            "warmup",
            "bars",
            "bars must be at least 1 when history_dir is set",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(content: &str) -> (String, String) {
        match validate_pipeline_config(&make_config(content)).unwrap_err() {
            TicktraderError::ConfigInvalid { section, key, .. } => (section, key),
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert!(validate_pipeline_config(&make_config("")).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[pipeline]
environment = staging
symbols = BTC/USDT, ETH/USDT
max_ticks = 50
tick_sleep_ms = 0
seed = 7
base_price = 250.0
volatility_pct = 0.5
stats_interval = 5

[indicators]
fast_interval = 1
medium_interval = 2
heavy_interval = 4
fast_window = 3
medium_window = 10
heavy_window = 50
ema_period = 9
rsi_period = 7

[strategies]
enabled = cyclic, ma_crossover, rsi_reversion
policy = highest_confidence
rsi_oversold = 25
rsi_overbought = 75
order_budget = 50

[execution]
venue = simulated
max_attempts = 2
timeout_ms = 500

[state]
backend = json
path = /tmp/ticktrader
snapshot_interval = 10

[warmup]
history_dir = /tmp/history
bars = 30
"#,
        );
        assert!(validate_pipeline_config(&config).is_ok());
    }

    #[test]
    fn max_ticks_zero_fails() {
        assert_eq!(
            invalid_key("[pipeline]\nmax_ticks = 0\n"),
            ("pipeline".into(), "max_ticks".into())
        );
    }

    #[test]
    fn non_numeric_max_ticks_fails() {
        assert_eq!(
            invalid_key("[pipeline]\nmax_ticks = lots\n"),
            ("pipeline".into(), "max_ticks".into())
        );
    }

    #[test]
    fn negative_sleep_fails() {
        assert_eq!(
            invalid_key("[pipeline]\ntick_sleep_ms = -5\n"),
            ("pipeline".into(), "tick_sleep_ms".into())
        );
    }

    #[test]
    fn malformed_symbol_fails() {
        assert_eq!(
            invalid_key("[pipeline]\nsymbols = BTCUSDT\n"),
            ("pipeline".into(), "symbols".into())
        );
    }

    #[test]
    fn duplicate_symbol_fails() {
        assert_eq!(
            invalid_key("[pipeline]\nsymbols = BTC/USDT, btc/usdt\n"),
            ("pipeline".into(), "symbols".into())
        );
    }

    #[test]
    fn empty_symbol_list_fails() {
        assert!(validate_pipeline_config(&make_config("[pipeline]\nsymbols = ,\n")).is_err());
    }

    #[test]
    fn cadence_order_enforced() {
        assert_eq!(
            invalid_key("[indicators]\nfast_interval = 4\nmedium_interval = 2\n"),
            ("indicators".into(), "medium_interval".into())
        );
    }

    #[test]
    fn zero_window_fails() {
        assert_eq!(
            invalid_key("[indicators]\nheavy_window = 0\n"),
            ("indicators".into(), "heavy_window".into())
        );
    }

    #[test]
    fn shared_window_fails() {
        assert_eq!(
            invalid_key("[indicators]\nfast_window = 5\nmedium_window = 5\n"),
            ("indicators".into(), "medium_window".into())
        );
        assert_eq!(
            invalid_key("[indicators]\nheavy_window = 20\n"),
            ("indicators".into(), "heavy_window".into())
        );
    }

    #[test]
    fn market_section_checked() {
        assert!(validate_pipeline_config(&make_config(
            "[market]\norder_flow = off\norderbook_depth = 5\nbar_window = 10\n"
        ))
        .is_ok());
        assert_eq!(
            invalid_key("[market]\norder_flow = maybe\n"),
            ("market".into(), "order_flow".into())
        );
        assert_eq!(
            invalid_key("[market]\ntrades_history = 0\n"),
            ("market".into(), "trades_history".into())
        );
    }

    #[test]
    fn unknown_strategy_fails() {
        assert_eq!(
            invalid_key("[strategies]\nenabled = cyclic, moon\n"),
            ("strategies".into(), "enabled".into())
        );
    }

    #[test]
    fn unknown_policy_fails() {
        assert_eq!(
            invalid_key("[strategies]\npolicy = random\n"),
            ("strategies".into(), "policy".into())
        );
    }

    #[test]
    fn inverted_rsi_bounds_fail() {
        assert_eq!(
            invalid_key("[strategies]\nrsi_oversold = 80\nrsi_overbought = 20\n"),
            ("strategies".into(), "rsi_oversold".into())
        );
    }

    #[test]
    fn zero_attempts_fails() {
        assert_eq!(
            invalid_key("[execution]\nmax_attempts = 0\n"),
            ("execution".into(), "max_attempts".into())
        );
    }

    #[test]
    fn unknown_backend_fails() {
        assert_eq!(
            invalid_key("[state]\nbackend = redis\n"),
            ("state".into(), "backend".into())
        );
    }

    #[test]
    fn snapshot_interval_zero_allowed() {
        assert!(validate_pipeline_config(&make_config("[state]\nsnapshot_interval = 0\n")).is_ok());
    }

    #[test]
    fn warmup_bars_required_with_history() {
        assert_eq!(
            invalid_key("[warmup]\nhistory_dir = /tmp/h\nbars = 0\n"),
            ("warmup".into(), "bars".into())
        );
    }

    #[test]
    fn read_helpers() {
        let config = make_config("[pipeline]\nseed = 9\nbase_price = 1.5\n");
        assert_eq!(read_int(&config, "pipeline", "seed").unwrap(), Some(9));
        assert_eq!(read_int(&config, "pipeline", "missing").unwrap(), None);
        assert_eq!(read_double(&config, "pipeline", "base_price").unwrap(), Some(1.5));
    }
}
