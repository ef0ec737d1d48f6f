//! User-curated table manifest.
//!
//! The manifest lists candidate tables, one per row, with a `get` column the
//! user marks to select a table. Lines starting with `#` are comments. Blank
//! cells inherit the value of the previous data row so a table definition can
//! span several lines.

use std::{collections::HashSet, fs, path::Path};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    io_utils,
};

pub const TABLE_ID_COLUMN: &str = "table_id";
pub const TABLE_TITLE_COLUMN: &str = "table_title";
pub const SUBJECT_AREA_COLUMN: &str = "subject_area";
pub const GET_COLUMN: &str = "get";

/// Fixed ACS subject taxonomy: free-text subject area to short code.
const SUBJECT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Age-Sex", "age"),
    ("Race", "race"),
    ("Hispanic or Latino Origin", "hisp"),
    ("Ancestry", "anc"),
    ("Foreign Birth", "fb"),
    ("Place of Birth - Native", "pob"),
    ("Residence Last Year - Migration", "mig"),
    ("Journey to Work", "jtw"),
    ("Children - Relationship", "chld"),
    ("Households - Families", "hh"),
    ("Marital Status", "mar"),
    ("Fertility", "fert"),
    ("School Enrollment", "enr"),
    ("Educational Attainment", "edu"),
    ("Language", "lang"),
    ("Poverty", "pov"),
    ("Disability", "dis"),
    ("Income", "inc"),
    ("Earnings", "earn"),
    ("Veteran Status", "vet"),
    ("Transfer Programs", "xfer"),
    ("Employment Status", "emp"),
    ("Industry-Occupation-Class of Worker", "ind"),
    ("Housing", "hsg"),
    ("Group Quarters", "gq"),
    ("Health Insurance", "hins"),
    ("Grandparents-Grandchildren", "gp"),
    ("Imputations", "imp"),
    ("Unweighted Count", "unw"),
    ("Computer and Internet Use", "net"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifestEntry {
    pub table_id: String,
    pub table_title: String,
    pub subject_area: String,
    pub subject_abbreviation: String,
    pub selected: bool,
}

/// Short code for a subject area; unmapped areas pass through unchanged.
pub fn subject_abbreviation(subject_area: &str) -> String {
    let trimmed = subject_area.trim();
    SUBJECT_ABBREVIATIONS
        .iter()
        .find(|(area, _)| area.eq_ignore_ascii_case(trimmed))
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Lower-cases a header and turns spaces into underscores.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// Whether a `get` cell marks the row as selected.
pub fn is_selection_marker(value: &str) -> bool {
    let trimmed = value.trim();
    if let Ok(number) = trimmed.parse::<f64>() {
        return number == 1.0;
    }
    matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "x" | "y" | "yes" | "true"
    )
}

pub fn load_manifest(path: &Path) -> Result<Vec<TableManifestEntry>> {
    let raw = fs::read(path).map_err(|e| Error::io(format!("reading manifest {path:?}"), e))?;
    let text = io_utils::decode_bytes(&raw, encoding_rs::UTF_8, &format!("manifest {path:?}"))
        .or_else(|_| {
            io_utils::decode_bytes(&raw, io_utils::legacy_encoding(), &format!("manifest {path:?}"))
        })?;
    let delimiter = io_utils::resolve_input_delimiter(path);
    let entries = parse_manifest(&text, delimiter, &format!("manifest {path:?}"))?;
    info!(
        "Selected {} table(s) from manifest {:?}",
        entries.len(),
        path
    );
    Ok(entries)
}

/// Parses manifest text and returns the selected entries in file order.
pub fn parse_manifest(
    text: &str,
    delimiter: u8,
    context: &str,
) -> Result<Vec<TableManifestEntry>> {
    let body = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#') && !line.trim().is_empty())
        .collect::<Vec<_>>();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let joined = body.join("\n");
    let mut reader = io_utils::open_csv_reader(joined.as_bytes(), delimiter, true);

    let headers = reader
        .headers()
        .map_err(|e| Error::csv(context, e))?
        .iter()
        .map(normalize_header)
        .collect::<Vec<_>>();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::parse(context, format!("missing column '{name}'")))
    };
    let table_id_idx = position(TABLE_ID_COLUMN)?;
    let title_idx = position(TABLE_TITLE_COLUMN)?;
    let subject_idx = position(SUBJECT_AREA_COLUMN)?;
    let get_idx = position(GET_COLUMN)?;

    let mut previous: Vec<String> = vec![String::new(); headers.len()];
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv(format!("{context} row {}", idx + 1), e))?;
        let mut row = Vec::with_capacity(headers.len());
        for col in 0..headers.len() {
            let value = record.get(col).map(str::trim).unwrap_or("");
            if value.is_empty() {
                row.push(previous[col].clone());
            } else {
                row.push(value.to_string());
            }
        }
        previous = row.clone();

        if !is_selection_marker(&row[get_idx]) {
            continue;
        }
        let table_id = row[table_id_idx].clone();
        if table_id.is_empty() || !seen.insert(table_id.clone()) {
            debug!("Skipping repeated manifest row for table '{table_id}'");
            continue;
        }
        let subject_area = row[subject_idx].clone();
        entries.push(TableManifestEntry {
            subject_abbreviation: subject_abbreviation(&subject_area),
            table_id,
            table_title: row[title_idx].clone(),
            subject_area,
            selected: true,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_markers_accept_string_and_numeric_forms() {
        for marker in ["1", "1.0", " 1 ", "x", "X", "yes", "True"] {
            assert!(is_selection_marker(marker), "{marker}");
        }
        for marker in ["", "0", "0.0", "no", "2"] {
            assert!(!is_selection_marker(marker), "{marker}");
        }
    }

    #[test]
    fn unmapped_subject_areas_pass_through() {
        assert_eq!(subject_abbreviation("Age-Sex"), "age");
        assert_eq!(subject_abbreviation("Brand New Topic"), "Brand New Topic");
    }

    #[test]
    fn parse_manifest_filters_comments_and_forward_fills() {
        let text = "\
# tables for the tract model
Table ID\tTable Title\tSubject Area\tGet
B01001\tSEX BY AGE\tAge-Sex\t1
#B01002\tMEDIAN AGE BY SEX\tAge-Sex\t1
B19013\tMEDIAN HOUSEHOLD INCOME\tIncome\t
B25001\tHOUSING UNITS\t\tx
";
        let entries = parse_manifest(text, b'\t', "test").unwrap();
        let ids = entries.iter().map(|e| e.table_id.as_str()).collect::<Vec<_>>();
        // B19013 inherits the previous row's `get` marker.
        assert_eq!(ids, vec!["B01001", "B19013", "B25001"]);
        assert_eq!(entries[2].subject_area, "Income");
        assert_eq!(entries[2].subject_abbreviation, "inc");
        assert!(entries.iter().all(|e| e.selected));
    }

    #[test]
    fn parse_manifest_requires_get_column() {
        let err = parse_manifest("table_id,table_title,subject_area\nB1,T,S\n", b',', "test")
            .unwrap_err();
        assert!(err.to_string().contains("get"));
    }

    #[test]
    fn repeated_table_ids_keep_first_row() {
        let text = "table_id,table_title,subject_area,get\nB1,FIRST,Race,1\n,SECOND,,\n";
        let entries = parse_manifest(text, b',', "test").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_title, "FIRST");
    }
}
