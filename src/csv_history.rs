use crate::data_structures::PriceSample;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum CsvHistoryError {
    Parse(csv::Error),
    NotFound(String),
}

impl From<csv::Error> for CsvHistoryError {
    fn from(error: csv::Error) -> Self {
        CsvHistoryError::Parse(error)
    }
}

/// One row of a local history file: `date,close` with an ISO date.
#[derive(Debug, Deserialize)]
struct HistoryRow {
    date: NaiveDate,
    close: f64,
}

/// Reads per-instrument daily closes from `<data_dir>/<CODE>.csv`.
///
/// Offline stand-in for the J-Quants client during development, selected by
/// setting `CSV_DATA_DIR`. Output contract matches the client: date-filtered,
/// oldest first.
pub struct CsvHistoryStore {
    data_dir: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn file_path(&self, code: &str) -> PathBuf {
        // Codes arrive from the URL path; strip anything that could escape
        // the data directory
        let safe: String = code
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        self.data_dir.join(format!("{}.csv", safe))
    }

    pub fn daily_history(
        &self,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceSample>, CsvHistoryError> {
        let path = self.file_path(code);
        if !path.exists() {
            return Err(CsvHistoryError::NotFound(code.to_string()));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut samples = Vec::new();
        for row in reader.deserialize() {
            let row: HistoryRow = row?;
            if row.date >= from && row.date <= to {
                samples.push(PriceSample {
                    date: row.date,
                    close: row.close,
                });
            }
        }

        samples.sort_by_key(|s| s.date);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with_file(test_name: &str, code: &str, content: &str) -> CsvHistoryStore {
        let dir = std::env::temp_dir()
            .join("stock-buddy-tests")
            .join(test_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.csv", code)), content).unwrap();
        CsvHistoryStore::new(dir)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_loads_and_filters_by_date() {
        let store = store_with_file(
            "loads_and_filters",
            "7203",
            "date,close\n2025-06-30,2450.0\n2025-07-01,2480.0\n2025-07-02,2505.5\n",
        );

        let samples = store
            .daily_history("7203", date("2025-07-01"), date("2025-07-31"))
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date, date("2025-07-01"));
        assert_eq!(samples[1].close, 2505.5);
    }

    #[test]
    fn test_missing_code_is_not_found() {
        let store = CsvHistoryStore::new(std::env::temp_dir().join("stock-buddy-tests-empty"));
        let result = store.daily_history("9999", date("2025-07-01"), date("2025-07-31"));
        assert!(matches!(result, Err(CsvHistoryError::NotFound(_))));
    }

    #[test]
    fn test_path_traversal_is_stripped() {
        let store = CsvHistoryStore::new("/data");
        assert_eq!(
            store.file_path("../../etc/passwd"),
            PathBuf::from("/data/etcpasswd.csv")
        );
    }

    #[test]
    fn test_malformed_row_is_a_parse_error() {
        let store = store_with_file(
            "malformed_row",
            "7203",
            "date,close\n2025-07-01,not-a-number\n",
        );
        let result = store.daily_history("7203", date("2025-07-01"), date("2025-07-31"));
        assert!(matches!(result, Err(CsvHistoryError::Parse(_))));
    }
}
