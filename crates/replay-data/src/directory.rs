//! Resolution of per-symbol data files.

use replay_core::error::DataError;
use replay_core::types::Timeframe;
use std::path::{Path, PathBuf};

/// Locations of the bar and trade file directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    ohlcvt_dir: PathBuf,
    trades_dir: PathBuf,
}

impl DataDirectory {
    /// Create a directory layout.
    pub fn new(ohlcvt_dir: impl Into<PathBuf>, trades_dir: impl Into<PathBuf>) -> Self {
        Self {
            ohlcvt_dir: ohlcvt_dir.into(),
            trades_dir: trades_dir.into(),
        }
    }

    /// `<ohlcvt_dir>/<SYMBOL>_<minutes>.csv`
    pub fn bars_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.ohlcvt_dir
            .join(format!("{}_{}.csv", symbol, timeframe.as_minutes()))
    }

    /// `<trades_dir>/<SYMBOL>.csv`
    pub fn trades_path(&self, symbol: &str) -> PathBuf {
        self.trades_dir.join(format!("{symbol}.csv"))
    }

    /// Existing bar file for a symbol.
    pub fn require_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<PathBuf, DataError> {
        require(symbol, self.bars_path(symbol, timeframe))
    }

    /// Existing trade file for a symbol.
    pub fn require_trades(&self, symbol: &str) -> Result<PathBuf, DataError> {
        require(symbol, self.trades_path(symbol))
    }

    /// Bar file directory.
    pub fn ohlcvt_dir(&self) -> &Path {
        &self.ohlcvt_dir
    }

    /// Trade file directory.
    pub fn trades_dir(&self) -> &Path {
        &self.trades_dir
    }
}

fn require(symbol: &str, path: PathBuf) -> Result<PathBuf, DataError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(DataError::FileNotFound {
            symbol: symbol.to_string(),
            path,
        })
    }
}
