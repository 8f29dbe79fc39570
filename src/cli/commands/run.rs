//! Run command implementation.

use anyhow::{Context, Result};
use replay_config::{load_config, AppConfig};
use replay_engine::ReplaySession;
use replay_monitor::EventLog;
use replay_strategies::StrategyRegistry;
use std::path::Path;
use tracing::{info, warn};

use crate::cli::{OutputFormat, RunArgs};

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let mut config = load_config(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let registry = StrategyRegistry::new();
    let strategy = registry
        .create(
            &config.strategy.name,
            config.strategy.params.clone(),
            config.data.symbols.clone(),
        )
        .context("Failed to create strategy")?;

    let request = config.series_request()?;
    let session_config = config.session_config()?;
    info!(
        symbols = ?request.symbols,
        timeframe = %request.timeframe,
        trades = request.include_trades,
        "Loading historical data"
    );
    let series = replay_data::load_series(config.data_directory(), request)
        .await
        .context("Failed to load historical data")?;
    info!(
        bars = series.bar_count(),
        ticks = series.tick_count(),
        "Historical data loaded"
    );

    let session = ReplaySession::new(series, session_config)
        .with_strategy(strategy)
        .with_event_handler(EventLog::new());

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping replay");
            stop.stop();
        }
    });

    let report = session.run().await.context("Replay failed")?;

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Report saved to {:?}", save_path);
    }
    if let Some(csv_path) = &args.fills_csv {
        std::fs::write(csv_path, report.fills_to_csv())
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("Fills saved to {:?}", csv_path);
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(strategy) = &args.strategy {
        config.strategy.name = strategy.clone();
    }
    if !args.symbols.is_empty() {
        config.data.symbols = args.symbols.clone();
    }
    if let Some(speed) = args.speed {
        config.replay.speed = Some(speed);
    }
    if let Some(source) = args.match_source {
        config.replay.match_source = source;
        if source != replay_engine::MatchSource::Bars {
            config.data.exclude_trades = false;
        }
    }
}
