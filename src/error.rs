//! Error taxonomy for the extraction pipeline.
//!
//! Building the lookup index, the geography registry, or the archive set can
//! only fail fatally. Decoding and assembling a single table can fail with any
//! variant, and the pipeline driver isolates those failures per table.

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Table '{title}' was not found in the lookup index")]
    TableNotFound { title: String },

    #[error("Failed to decode {context} as {encoding}")]
    Encoding {
        context: String,
        encoding: &'static str,
    },

    #[error("Consistency error: {message}")]
    Consistency { message: String },

    #[error("Failed to read archive {path:?}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
}

impl Error {
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Error::Consistency {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Error::Csv {
            context: context.into(),
            source,
        }
    }

    /// Whether the error only means the requested table is absent.
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound { .. })
    }
}
