//! Record decoder.
//!
//! For one resolved table, every data member whose name encodes the table's
//! sequence number is sliced at the table's field range. Cells are coerced to
//! numbers and keyed by `(state, logical record number)`.
//!
//! Coercion is per row. Each token is first parsed as an integer and kept only
//! when strictly positive; `.` and empty tokens are absent. A zero count is
//! therefore indistinguishable from "not applicable" and is dropped. This is
//! a known lossy policy kept so persisted artifacts stay comparable. If any
//! token is not an integer, the whole row is parsed as floats instead and
//! values `>= 0` are kept.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::{
    archive::{Archive, ArchiveSet, DATA_PREFIX, data_member_suffix},
    data::Number,
    error::{Error, Result},
    geography::GeoKey,
    io_utils,
    keyed::KeyedTable,
    lookup::TableDescriptor,
};

/// Tokens the summary file uses for "no value".
const MISSING_SENTINELS: [&str; 2] = ["", "."];

/// Fields preceding the estimates: file id, file type, state, char iter,
/// sequence, logical record number.
const MIN_DATA_FIELDS: usize = 6;

pub type DecodedCellRow = BTreeMap<String, Number>;
pub type DecodedTable = KeyedTable<GeoKey, DecodedCellRow>;

fn is_missing(token: &str) -> bool {
    MISSING_SENTINELS.contains(&token)
}

/// Coerces one row's tokens, returning `None` for absent cells.
pub fn coerce_cells(tokens: &[&str]) -> Result<Vec<Option<Number>>> {
    let as_integers = tokens
        .iter()
        .map(|token| {
            if is_missing(token) {
                Ok(None)
            } else {
                token.parse::<i64>().map(Some)
            }
        })
        .collect::<std::result::Result<Vec<_>, _>>();

    match as_integers {
        Ok(values) => Ok(values
            .into_iter()
            .map(|value| value.filter(|v| *v > 0).map(Number::Integer))
            .collect()),
        Err(_) => tokens
            .iter()
            .map(|token| -> Result<Option<Number>> {
                if is_missing(token) {
                    return Ok(None);
                }
                let parsed = token.parse::<f64>().map_err(|_| {
                    Error::parse("data row", format!("'{token}' is not numeric"))
                })?;
                Ok((parsed >= 0.0).then_some(Number::Float(parsed)))
            })
            .collect(),
    }
}

/// Builds the cell map for one row. Later columns sharing a label overwrite
/// earlier present values; an absent later value leaves the earlier one.
pub fn cell_row(cells: &[String], values: Vec<Option<Number>>) -> DecodedCellRow {
    let mut row = DecodedCellRow::new();
    for (label, value) in cells.iter().zip(values) {
        if let Some(value) = value {
            row.insert(label.clone(), value);
        }
    }
    row
}

pub fn decode(descriptor: &TableDescriptor, archives: &ArchiveSet) -> Result<DecodedTable> {
    let sequence_number = descriptor
        .sequence_number
        .ok_or_else(|| Error::TableNotFound {
            title: descriptor.title.clone(),
        })?;
    let suffix = data_member_suffix(sequence_number);
    let mut table = DecodedTable::new();
    let mut members = 0usize;
    for (archive, member) in archives.members_matching(DATA_PREFIX, &suffix) {
        decode_member(&mut table, descriptor, archive, member)?;
        members += 1;
    }
    info!(
        "Decoded '{}' (sequence {}): {} row(s) from {} member(s)",
        descriptor.title,
        sequence_number,
        table.len(),
        members
    );
    Ok(table)
}

fn decode_member(
    table: &mut DecodedTable,
    descriptor: &TableDescriptor,
    archive: &Archive,
    member: &str,
) -> Result<()> {
    info!("Parsing data for {member}");
    let bytes = archive.read_member(member)?;
    let rows = decode_member_bytes(table, descriptor, &bytes, member)?;
    debug!("{member}: {rows} row(s)");
    Ok(())
}

/// Decodes one data member's raw bytes into `table`, returning the number of
/// rows read.
pub fn decode_member_bytes(
    table: &mut DecodedTable,
    descriptor: &TableDescriptor,
    bytes: &[u8],
    member: &str,
) -> Result<usize> {
    let start = descriptor
        .start_position
        .ok_or_else(|| Error::TableNotFound {
            title: descriptor.title.clone(),
        })?;
    let first = start - 1;
    let end = first + descriptor.cells.len();

    let encoding = io_utils::legacy_encoding();
    let mut reader = io_utils::open_csv_reader(bytes, io_utils::DEFAULT_CSV_DELIMITER, false);
    let mut rows = 0usize;
    for (idx, record) in reader.byte_records().enumerate() {
        let context = format!("{member} line {}", idx + 1);
        let record = record.map_err(|e| Error::csv(&context, e))?;
        let row = io_utils::decode_record(&record, encoding, &context)?;
        if row.len() < MIN_DATA_FIELDS.max(end) {
            return Err(Error::parse(
                context,
                format!(
                    "expected at least {} fields for '{}', found {}",
                    MIN_DATA_FIELDS.max(end),
                    descriptor.title,
                    row.len()
                ),
            ));
        }
        let key = GeoKey::new(row[2].trim().to_uppercase(), row[5].trim());
        let tokens = row[first..end].iter().map(|t| t.trim()).collect::<Vec<_>>();
        let values = coerce_cells(&tokens).map_err(|err| match err {
            Error::Parse { message, .. } => Error::parse(&context, message),
            other => other,
        })?;
        table.upsert(key, cell_row(&descriptor.cells, values));
        rows += 1;
    }
    Ok(rows)
}
