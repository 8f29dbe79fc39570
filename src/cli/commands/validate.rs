//! Validate configuration command.

use anyhow::Result;
use replay_config::load_config;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match load_config(config_path).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Symbols: {}", config.data.symbols.join(", "));
    println!("Timeframe: {}", config.data.timeframe);
    println!("Match source: {}", config.replay.match_source);
    match config.replay.speed {
        Some(speed) => println!("Speed: {}x", speed),
        None => println!("Speed: unbounded"),
    }
    println!("Strategy: {}", config.strategy.name);

    Ok(())
}
