//! Sequence/table lookup index.
//!
//! The lookup file lists, for every published table, which sequence file holds
//! it, where its columns start, and one row per cell. A table block begins at a
//! row carrying both a `Table Title` and a `Total Cells in Table`. Cell rows
//! that follow carry an integer `Line Number`, and their label sits in the
//! `Table Title` column. That positional quirk is preserved as-is: there is
//! no other column holding cell labels, and column naming depends on it.

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    io_utils,
};

pub const TABLE_TITLE: &str = "Table Title";
pub const TOTAL_CELLS: &str = "Total Cells in Table";
pub const SEQUENCE_NUMBER: &str = "Sequence Number";
pub const START_POSITION: &str = "Start Position";
pub const LINE_NUMBER: &str = "Line Number";
pub const TABLE_ID: &str = "Table ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub title: String,
    pub subject_area: String,
    pub sequence_number: Option<u32>,
    /// 1-based field offset of the first cell within a data row.
    pub start_position: Option<usize>,
    pub cells: Vec<String>,
    pub table_id: Option<String>,
}

impl TableDescriptor {
    pub fn unresolved(title: &str, subject_area: &str) -> Self {
        TableDescriptor {
            title: title.to_string(),
            subject_area: subject_area.to_string(),
            sequence_number: None,
            start_position: None,
            cells: Vec::new(),
            table_id: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sequence_number.is_some()
    }
}

#[derive(Debug, Clone, Default)]
struct LookupRow {
    line: usize,
    table_id: String,
    title: String,
    total_cells: String,
    sequence_number: String,
    start_position: String,
    line_number: String,
}

/// Parsed lookup file, held immutable for a whole run.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    rows: Vec<LookupRow>,
}

struct ColumnPositions {
    title: usize,
    total_cells: usize,
    sequence_number: usize,
    start_position: usize,
    line_number: usize,
    table_id: Option<usize>,
}

impl ColumnPositions {
    fn from_headers(headers: &[String], context: &str) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::parse(context, format!("missing column '{name}'")))
        };
        Ok(ColumnPositions {
            title: require(TABLE_TITLE)?,
            total_cells: require(TOTAL_CELLS)?,
            sequence_number: require(SEQUENCE_NUMBER)?,
            start_position: require(START_POSITION)?,
            line_number: require(LINE_NUMBER)?,
            table_id: find(TABLE_ID),
        })
    }
}

impl LookupIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = io_utils::open_legacy_reader(path, io_utils::legacy_encoding())?;
        let context = format!("lookup file {path:?}");
        let index = Self::from_reader(reader, &context)?;
        info!("Loaded {} lookup row(s) from {:?}", index.rows.len(), path);
        Ok(index)
    }

    pub fn from_reader<R: std::io::Read>(reader: R, context: &str) -> Result<Self> {
        let mut reader =
            io_utils::open_csv_reader(reader, io_utils::DEFAULT_CSV_DELIMITER, true);
        let headers = reader
            .headers()
            .map_err(|e| Error::csv(context, e))?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let positions = ColumnPositions::from_headers(&headers, context)?;

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let line = idx + 2;
            let record = record.map_err(|e| Error::csv(format!("{context} line {line}"), e))?;
            let field = |pos: usize| record.get(pos).unwrap_or("").trim().to_string();
            rows.push(LookupRow {
                line,
                table_id: positions.table_id.map(|pos| field(pos)).unwrap_or_default(),
                title: field(positions.title),
                total_cells: field(positions.total_cells),
                sequence_number: field(positions.sequence_number),
                start_position: field(positions.start_position),
                line_number: field(positions.line_number),
            });
        }
        Ok(LookupIndex { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolves a table title to its sequence number, start position, and
    /// cell labels. An unknown title yields a descriptor with
    /// `sequence_number == None`.
    pub fn resolve(&self, table_title: &str, subject_area: &str) -> Result<TableDescriptor> {
        let mut descriptor = TableDescriptor::unresolved(table_title, subject_area);
        let mut current_title: Option<&str> = None;

        for row in &self.rows {
            if !row.title.is_empty() && !row.total_cells.is_empty() {
                current_title = Some(row.title.as_str());
                if row.title == table_title && descriptor.table_id.is_none() {
                    descriptor.table_id = Some(row.table_id.clone()).filter(|id| !id.is_empty());
                }
            }
            if current_title != Some(table_title) {
                continue;
            }
            if !row.start_position.is_empty() && descriptor.start_position.is_none() {
                let context = format!("lookup line {}", row.line);
                let sequence_number = row.sequence_number.parse::<u32>().map_err(|_| {
                    Error::parse(
                        &context,
                        format!("invalid sequence number '{}'", row.sequence_number),
                    )
                })?;
                let start_position = row.start_position.parse::<usize>().map_err(|_| {
                    Error::parse(
                        &context,
                        format!("invalid start position '{}'", row.start_position),
                    )
                })?;
                if start_position == 0 {
                    return Err(Error::parse(context, "start position must be 1-based"));
                }
                descriptor.sequence_number = Some(sequence_number);
                descriptor.start_position = Some(start_position);
            }
            if row.line_number.parse::<i64>().is_ok() {
                descriptor.cells.push(row.title.clone());
            }
        }

        if descriptor.is_resolved() && descriptor.cells.is_empty() {
            return Err(Error::parse(
                format!("lookup table '{table_title}'"),
                "table declares no cells",
            ));
        }
        debug!(
            "Resolved '{}' -> sequence {:?}, start {:?}, {} cell(s)",
            table_title,
            descriptor.sequence_number,
            descriptor.start_position,
            descriptor.cells.len()
        );
        Ok(descriptor)
    }
}
