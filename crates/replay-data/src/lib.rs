//! Historical data loading.
//!
//! Reads headerless per-symbol bar (`<SYMBOL>_<minutes>.csv`) and trade
//! (`<SYMBOL>.csv`) files and merges them into one time-ordered
//! [`HistoricalSeries`].

mod csv_source;
mod directory;
mod series;

pub use csv_source::{parse_timestamp, read_bars, read_trades};
pub use directory::DataDirectory;
pub use series::{HistoricalSeries, SeriesRequest};

use replay_core::error::DataError;

/// Load and merge every file a request names, off the async runtime.
pub async fn load_series(
    directory: DataDirectory,
    request: SeriesRequest,
) -> Result<HistoricalSeries, DataError> {
    tokio::task::spawn_blocking(move || HistoricalSeries::load(&directory, &request))
        .await
        .map_err(|e| DataError::Io(std::io::Error::other(e.to_string())))?
}
