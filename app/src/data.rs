use anyhow::{Context, Result};
use core_types::Candle;
use std::path::Path;

/// Loads candles from a CSV file with columns
/// `timestamp_ms,open,high,low,close,volume`. A header row and blank or
/// `#`-prefixed lines are skipped. The result is sorted by timestamp.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read candle file {}", path.display()))?;

    let mut candles = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("timestamp") {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 6 {
            anyhow::bail!("line {}: expected 6 columns, got {}", number + 1, fields.len());
        }
        let parse = |i: usize, name: &str| {
            fields[i]
                .trim()
                .parse()
                .with_context(|| format!("line {}: bad {name} value {:?}", number + 1, fields[i]))
        };
        candles.push(Candle {
            timestamp_ms: fields[0]
                .trim()
                .parse()
                .with_context(|| format!("line {}: bad timestamp {:?}", number + 1, fields[0]))?,
            open: parse(1, "open")?,
            high: parse(2, "high")?,
            low: parse(3, "low")?,
            close: parse(4, "close")?,
            volume: parse(5, "volume")?,
        });
    }

    if candles.is_empty() {
        anyhow::bail!("no candles found in {}", path.display());
    }
    candles.sort_by_key(|c| c.timestamp_ms);
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_csv_with_header_and_sorts() {
        let mut file = tempfile_path("candles.csv");
        writeln!(file.1, "timestamp_ms,open,high,low,close,volume").unwrap();
        writeln!(file.1, "120000,101,103,100,102,10").unwrap();
        writeln!(file.1, "60000,100,102,99,101,12").unwrap();
        file.1.flush().unwrap();

        let candles = load_candles_csv(&file.0).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp_ms, 60_000);
        assert_eq!(candles[1].timestamp_ms, 120_000);
        std::fs::remove_file(&file.0).ok();
    }

    #[test]
    fn rejects_short_rows() {
        let mut file = tempfile_path("bad.csv");
        writeln!(file.1, "60000,100,102").unwrap();
        file.1.flush().unwrap();

        assert!(load_candles_csv(&file.0).is_err());
        std::fs::remove_file(&file.0).ok();
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("aegis-test-{}-{}", std::process::id(), name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
