//! Persisted artifacts.
//!
//! Assembled tables are written one CSV per `table_id` under the interim
//! directory; the joined dataset is written under the processed directory
//! next to a JSON sidecar recording the fingerprint of the table artifacts
//! it was built from. Both carry `geographic_id` as their only text column;
//! every other column is numeric. Integers are written plainly and floats always carry a
//! decimal point, so reloading restores the same values and variants.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    assemble::AssembledTable,
    data::{Number, parse_number_literal},
    error::{Error, Result},
    io_utils,
    join::{JoinedDataset, JoinedRow},
};

pub const GEOGRAPHIC_ID_COLUMN: &str = "geographic_id";
const TABLES_DIR: &str = "tables";
const SIDECAR_VERSION: u32 = 1;

pub fn table_path(interim_dir: &Path, table_id: &str) -> PathBuf {
    interim_dir.join(TABLES_DIR).join(format!("{table_id}.csv"))
}

pub fn dataset_path(processed_dir: &Path, dataset_name: &str) -> PathBuf {
    processed_dir.join(format!("{dataset_name}.csv"))
}

pub fn sidecar_path(processed_dir: &Path, dataset_name: &str) -> PathBuf {
    processed_dir.join(format!("{dataset_name}.meta.json"))
}

pub fn save_table(table: &AssembledTable, path: &Path) -> Result<()> {
    let context = format!("writing {path:?}");
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push(GEOGRAPHIC_ID_COLUMN.to_string());
    header.extend(table.columns.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| Error::csv(&context, e))?;
    for (id, values) in &table.rows {
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(id.clone());
        record.extend(values.iter().map(Number::as_display));
        writer
            .write_record(&record)
            .map_err(|e| Error::csv(&context, e))?;
    }
    writer.flush().map_err(|e| Error::io(&context, e))?;
    debug!("Wrote {} row(s) to {:?}", table.len(), path);
    Ok(())
}

pub fn load_table(table_id: &str, path: &Path) -> Result<AssembledTable> {
    let context = format!("cached table {path:?}");
    let (columns, rows) = read_numeric_csv(path, &context)?;
    let mut table = AssembledTable::new(table_id, columns);
    for (id, values) in rows {
        let values = values
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::parse(&context, "assembled rows cannot be empty")))
            .collect::<Result<Vec<_>>>()?;
        table.rows.insert(id, values);
    }
    Ok(table)
}

pub fn save_dataset(dataset: &JoinedDataset, path: &Path) -> Result<()> {
    let context = format!("writing {path:?}");
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    let mut header = Vec::with_capacity(dataset.columns.len() + 1);
    header.push(GEOGRAPHIC_ID_COLUMN.to_string());
    header.extend(dataset.columns.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| Error::csv(&context, e))?;
    for (id, row) in &dataset.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(id.clone());
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|n| n.as_display()).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .map_err(|e| Error::csv(&context, e))?;
    }
    writer.flush().map_err(|e| Error::io(&context, e))?;
    info!(
        "Wrote joined dataset ({} row(s) x {} column(s)) to {:?}",
        dataset.row_count(),
        dataset.columns.len(),
        path
    );
    Ok(())
}

/// Reloads a joined dataset. The artifact does not record states, so every
/// row comes back with `state: None`.
pub fn load_dataset(path: &Path) -> Result<JoinedDataset> {
    let context = format!("joined dataset {path:?}");
    let (columns, rows) = read_numeric_csv(path, &context)?;
    let rows = rows
        .into_iter()
        .map(|(id, values)| {
            (
                id,
                JoinedRow {
                    state: None,
                    values,
                },
            )
        })
        .collect();
    Ok(JoinedDataset { columns, rows })
}

type NumericRows = Vec<(String, Vec<Option<Number>>)>;

/// Reads a CSV keyed by a leading `geographic_id` column whose remaining
/// columns are numeric.
fn read_numeric_csv(path: &Path, context: &str) -> Result<(Vec<String>, NumericRows)> {
    let file = File::open(path).map_err(|e| Error::io(format!("opening {path:?}"), e))?;
    let mut reader =
        io_utils::open_csv_reader(BufReader::new(file), io_utils::DEFAULT_CSV_DELIMITER, true);
    let headers = reader
        .headers()
        .map_err(|e| Error::csv(context, e))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    if headers.first().map(String::as_str) != Some(GEOGRAPHIC_ID_COLUMN) {
        return Err(Error::parse(
            context,
            format!("expected leading '{GEOGRAPHIC_ID_COLUMN}' column"),
        ));
    }
    let columns = headers[1..].to_vec();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line_context = format!("{context} line {}", idx + 2);
        let record = record.map_err(|e| Error::csv(&line_context, e))?;
        if record.len() != headers.len() {
            return Err(Error::parse(
                line_context,
                format!("expected {} fields, found {}", headers.len(), record.len()),
            ));
        }
        let id = record.get(0).unwrap_or_default().to_string();
        let values = record
            .iter()
            .skip(1)
            .map(|raw| {
                parse_number_literal(raw).map_err(|err| match err {
                    Error::Parse { message, .. } => Error::parse(&line_context, message),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((id, values));
    }
    Ok((columns, rows))
}

/// SHA-256 over each file's name and contents, in the given order.
pub fn fingerprint(paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        let bytes = fs::read(path).map_err(|e| Error::io(format!("reading {path:?}"), e))?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Provenance stored next to the joined dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSidecar {
    pub version: u32,
    pub fingerprint: String,
    pub tables: Vec<String>,
    pub null_threshold: usize,
    pub states_only: bool,
    pub rows: usize,
    pub columns: usize,
    pub built_at: DateTime<Utc>,
}

impl DatasetSidecar {
    pub fn new(
        fingerprint: String,
        tables: Vec<String>,
        null_threshold: usize,
        states_only: bool,
        dataset: &JoinedDataset,
    ) -> Self {
        DatasetSidecar {
            version: SIDECAR_VERSION,
            fingerprint,
            tables,
            null_threshold,
            states_only,
            rows: dataset.row_count(),
            columns: dataset.columns.len(),
            built_at: Utc::now(),
        }
    }

    /// Whether a dataset built under this sidecar can be reused.
    pub fn matches(&self, fingerprint: &str, null_threshold: usize, states_only: bool) -> bool {
        self.version == SIDECAR_VERSION
            && self.fingerprint == fingerprint
            && self.null_threshold == null_threshold
            && self.states_only == states_only
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io_utils::ensure_parent_dir(path)?;
        let file = File::create(path).map_err(|e| Error::io(format!("creating {path:?}"), e))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::parse(format!("sidecar {path:?}"), e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(format!("opening {path:?}"), e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::parse(format!("sidecar {path:?}"), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_path_is_keyed_by_table_id() {
        let path = table_path(Path::new("data/interim"), "B01001");
        assert_eq!(path, Path::new("data/interim/tables/B01001.csv"));
    }

    #[test]
    fn dataset_round_trips_missing_values() {
        let dir = tempdir().unwrap();
        let mut dataset = JoinedDataset::from_universe([
            ("02013000100".to_string(), None::<String>),
            ("72001956300".to_string(), None),
        ]);
        dataset.columns = vec!["a".to_string()];
        for (row, value) in dataset
            .rows
            .values_mut()
            .zip([Some(Number::Float(1.5)), None])
        {
            row.values = vec![value];
        }
        let path = dir.path().join("joined.csv");
        save_dataset(&dataset, &path).unwrap();
        assert_eq!(load_dataset(&path).unwrap(), dataset);
    }

    #[test]
    fn dataset_artifact_has_no_state_column() {
        let dir = tempdir().unwrap();
        let mut dataset =
            JoinedDataset::from_universe([("02013000100".to_string(), "AK".to_string())]);
        dataset.columns = vec!["age__b01001__total".to_string()];
        for row in dataset.rows.values_mut() {
            row.values = vec![Some(Number::Integer(3214))];
        }
        let path = dir.path().join("joined.csv");
        save_dataset(&dataset, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("\"geographic_id\",\"age__b01001__total\""));
        assert_eq!(lines.next(), Some("\"02013000100\",\"3214\""));

        let reloaded = load_dataset(&path).unwrap();
        assert_eq!(reloaded.rows["02013000100"].state, None);
        assert_eq!(
            reloaded.value("02013000100", "age__b01001__total"),
            Some(Number::Integer(3214))
        );
    }

    #[test]
    fn fingerprint_changes_with_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "one").unwrap();
        let first = fingerprint(&[path.clone()]).unwrap();
        assert_eq!(first, fingerprint(&[path.clone()]).unwrap());
        fs::write(&path, "two").unwrap();
        assert_ne!(first, fingerprint(&[path]).unwrap());
    }

    #[test]
    fn sidecar_matches_on_fingerprint_and_filter_settings() {
        let sidecar = DatasetSidecar::new(
            "abc".to_string(),
            vec!["B01001".to_string()],
            0,
            true,
            &JoinedDataset::default(),
        );
        assert!(sidecar.matches("abc", 0, true));
        assert!(!sidecar.matches("abd", 0, true));
        assert!(!sidecar.matches("abc", 1, true));
    }
}
