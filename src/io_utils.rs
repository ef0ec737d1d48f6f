//! I/O utilities for delimited reading, writing, and legacy text decoding.
//!
//! Summary-file members and the sequence lookup file are published in a
//! single-byte legacy encoding (ISO-8859-1). `encoding_rs` maps that label to
//! WINDOWS_1252, which assigns a character to every byte, so decoding never
//! fails on high-byte place names. Everything the crate writes is UTF-8.
//!
//! - **Delimiter resolution** from the file extension (`.tsv`/`.txt` → tab).
//! - **Reader/writer construction**: `open_csv_reader`, `open_legacy_reader`,
//!   `open_csv_writer`.
//! - **Decoding**: `decode_bytes` / `decode_record` with typed errors.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, WINDOWS_1252};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::{Error, Result};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Encoding of every summary-file member and of the sequence lookup file.
pub fn legacy_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Tab for `.tsv` and `.txt` files, comma otherwise.
pub fn resolve_input_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => {
            DEFAULT_TSV_DELIMITER
        }
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Opens a file whose bytes are transcoded from `encoding` to UTF-8 while read.
pub fn open_legacy_reader(path: &Path, encoding: &'static Encoding) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::io(format!("opening {path:?}"), e))?;
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(BufReader::new(file));
    Ok(Box::new(decoder))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| Error::io(format!("creating {path:?}"), e))?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(BufWriter::new(file)))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("creating directory {parent:?}"), e))?;
    }
    Ok(())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding, context: &str) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(Error::Encoding {
            context: context.to_string(),
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    context: &str,
) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding, context))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    #[test]
    fn legacy_encoding_decodes_high_bytes() {
        let bytes = b"Do\xf1a Ana County";
        let decoded = decode_bytes(bytes, legacy_encoding(), "test").unwrap();
        assert_eq!(decoded, "Doña Ana County");
    }

    #[test]
    fn utf8_rejects_invalid_sequences() {
        let err = decode_bytes(b"Do\xf1a", UTF_8, "member g1.csv").unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn iso_8859_1_label_resolves_to_legacy_encoding() {
        let encoding = Encoding::for_label(b"iso-8859-1").unwrap();
        assert_eq!(encoding, legacy_encoding());
    }

    #[test]
    fn tab_delimited_extensions() {
        assert_eq!(resolve_input_delimiter(Path::new("2018_5y_lookup.txt")), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("tables.TSV")), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("tables.csv")), b',');
    }
}
