//! On-disk clue persistence: one row per clue in a tabular file with
//! columns `count`, `local_time`, `headers_encoded` (a JSON array of
//! `[name, value]` pairs -- a language-neutral literal form, replacing the
//! original's `eval()`-based header column).

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::core::clue::{Clue, HeaderField};
use crate::error::{HalberdError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct ClueRow {
    count: i64,
    local_time: f64,
    headers_encoded: String,
}

/// Save clues to `path`, truncating any existing file.
pub fn save_clues(path: &Path, clues: &[Clue]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;

    for clue in clues {
        let headers_encoded = serde_json::to_string(&clue.headers)
            .map_err(|e| HalberdError::InvalidClueFile(e.to_string()))?;
        writer.serialize(ClueRow {
            count: clue.count as i64,
            local_time: clue.local as f64,
            headers_encoded,
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Load clues from `path`, reparsing each row's headers to rebuild the
/// digest/diff fields. Any row that fails validation fails the whole load.
pub fn load_clues(path: &Path) -> Result<Vec<Clue>> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_path(path)?;

    let ignored = HashSet::new();
    let mut clues = Vec::new();

    for record in reader.deserialize::<ClueRow>() {
        let row: ClueRow = record.map_err(|e| HalberdError::InvalidClueFile(e.to_string()))?;

        if row.count < 0 {
            return Err(HalberdError::InvalidClueFile(format!(
                "negative count: {}",
                row.count
            )));
        }
        if !row.local_time.is_finite() {
            return Err(HalberdError::InvalidClueFile(format!(
                "non-numeric local_time: {}",
                row.local_time
            )));
        }

        let headers: Vec<HeaderField> = serde_json::from_str(&row.headers_encoded)
            .map_err(|e| HalberdError::InvalidClueFile(format!("bad headers column: {}", e)))?;
        if headers.is_empty() {
            return Err(HalberdError::InvalidClueFile(
                "headers column is empty".to_string(),
            ));
        }

        let mut clue = Clue::parse(row.local_time as i64, headers, &ignored)?;
        clue.count = row.count as u32;
        clues.push(clue);
    }

    Ok(clues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_clue() -> Clue {
        Clue::parse(
            1000,
            vec![
                ("Server".into(), "nginx".into()),
                ("Date".into(), "Tue, 24 Feb 2004 17:09:05 GMT".into()),
            ],
            &HashSet::new(),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_count_and_headers() {
        let tmp = NamedTempFile::new().unwrap();
        let mut clue = sample_clue();
        clue.count = 7;
        save_clues(tmp.path(), &[clue.clone()]).unwrap();

        let loaded = load_clues(tmp.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].count, 7);
        assert_eq!(loaded[0].digest, clue.digest);
        assert_eq!(loaded[0].diff, clue.diff);
    }

    #[test]
    fn rejects_empty_headers() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "1,1000,[]\n").unwrap();
        assert!(load_clues(tmp.path()).is_err());
    }

    #[test]
    fn rejects_negative_count() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "-1,1000,\"[[\"\"Server\"\",\"\"x\"\"]]\"\n").unwrap();
        assert!(load_clues(tmp.path()).is_err());
    }
}
