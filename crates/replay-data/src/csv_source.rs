//! Headerless CSV readers for bar and trade files.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use replay_core::error::DataError;
use replay_core::types::{Bar, Tick, Timeframe};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Bar file row: `timestamp, open, high, low, close, volume, trade_count`.
#[derive(Debug, Deserialize)]
struct OhlcvtRecord {
    timestamp: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    #[serde(default)]
    trades: Option<u64>,
}

/// Trade file row: `timestamp, price, amount`.
#[derive(Debug, Deserialize)]
struct TradeRecord {
    timestamp: String,
    price: Decimal,
    amount: Decimal,
}

/// Read a bar file. Rows are validated and returned in file order.
pub fn read_bars(path: &Path, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, e))?;

    let mut bars = Vec::new();
    for (index, result) in reader.deserialize().enumerate() {
        let record: OhlcvtRecord = result.map_err(|e| parse_error(path, e))?;
        let timestamp = timestamp_field(path, index, &record.timestamp)?;

        let mut bar = Bar::new(
            symbol,
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
        .with_timeframe(timeframe);
        bar.trade_count = record.trades;
        bar.validate()?;
        bars.push(bar);
    }

    Ok(bars)
}

/// Read a trade file. Rows are validated and returned in file order.
pub fn read_trades(path: &Path, symbol: &str) -> Result<Vec<Tick>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, e))?;

    let mut ticks = Vec::new();
    for (index, result) in reader.deserialize().enumerate() {
        let record: TradeRecord = result.map_err(|e| parse_error(path, e))?;
        let timestamp = timestamp_field(path, index, &record.timestamp)?;

        let tick = Tick::new(symbol, timestamp, record.price, record.amount);
        tick.validate()?;
        ticks.push(tick);
    }

    Ok(ticks)
}

/// Parse a timestamp into Unix milliseconds.
///
/// Accepts Unix seconds (fractional allowed), RFC 3339, and a few
/// date/datetime layouts. Seconds that do not fit in `i64` milliseconds
/// are rejected.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<i64>() {
        return secs.checked_mul(1000);
    }

    if let Ok(secs) = value.parse::<Decimal>() {
        return secs
            .checked_mul(Decimal::ONE_THOUSAND)
            .and_then(|ms| ms.round().to_i64());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }

    let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d", "%Y/%m/%d"];
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
        if let Ok(d) = NaiveDate::parse_from_str(value, format) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }

    None
}

fn timestamp_field(path: &Path, index: usize, value: &str) -> Result<i64, DataError> {
    parse_timestamp(value).ok_or_else(|| DataError::Parse {
        path: path.to_path_buf(),
        record: index as u64 + 1,
        message: format!("could not parse timestamp: {value}"),
    })
}

fn parse_error(path: &Path, err: csv::Error) -> DataError {
    let record = err.position().map(|p| p.record() + 1).unwrap_or(0);
    DataError::Parse {
        path: path.to_path_buf(),
        record,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1705312800"), Some(1_705_312_800_000));
        assert_eq!(parse_timestamp("-86400"), Some(-86_400_000));
        assert_eq!(parse_timestamp("1705312800.25"), Some(1_705_312_800_250));
        assert_eq!(parse_timestamp("2024-01-15"), Some(1_705_276_800_000));
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z"), Some(1_705_314_600_000));
        assert!(parse_timestamp("2024-01-15 10:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_timestamp_out_of_range() {
        assert!(parse_timestamp("-9223372036854775807").is_none());
        assert!(parse_timestamp("9223372036854776").is_none());
        assert!(parse_timestamp("79228162514264337593543950335").is_none());

        let file = write_file("-9223372036854775807,100,1\n");
        match read_trades(file.path(), "XBTUSD") {
            Err(DataError::Parse { record, .. }) => assert_eq!(record, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_bars() {
        let file = write_file("1700000000,10,12,9,11,5,3\n1700000060,11,11.5,10.5,11.2,2.5,1\n");
        let bars = read_bars(file.path(), "XBTUSD", Timeframe::MINUTE_1).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 1_700_000_000_000);
        assert_eq!(bars[0].high, dec!(12));
        assert_eq!(bars[0].trade_count, Some(3));
        assert_eq!(bars[1].volume, dec!(2.5));
        assert_eq!(bars[1].timeframe, Some(Timeframe::MINUTE_1));
    }

    #[test]
    fn test_read_bars_rejects_broken_ohlc() {
        let file = write_file("1700000000,10,9,8,11,5,3\n");
        let err = read_bars(file.path(), "XBTUSD", Timeframe::MINUTE_1).unwrap_err();
        assert!(matches!(err, DataError::InvalidRecord { .. }));
    }

    #[test]
    fn test_read_trades() {
        let file = write_file("1700000000.5,100.5,0.25\n1700000001,101,1\n");
        let ticks = read_trades(file.path(), "XBTUSD").unwrap();

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].timestamp, 1_700_000_000_500);
        assert_eq!(ticks[0].price, dec!(100.5));
        assert_eq!(ticks[1].amount, dec!(1));
    }

    #[test]
    fn test_read_trades_reports_bad_row() {
        let file = write_file("1700000000,100,1\nnot-a-time,100,1\n");
        match read_trades(file.path(), "XBTUSD") {
            Err(DataError::Parse { record, .. }) => assert_eq!(record, 2),
            other => panic!("expected parse error, got {other:?}"),
        }

        let file = write_file("1700000000,abc,1\n");
        assert!(matches!(
            read_trades(file.path(), "XBTUSD"),
            Err(DataError::Parse { .. })
        ));
    }
}
