use std::fmt;

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A decoded cell value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Text form that reloads into the same variant: floats always carry a
    /// decimal point or exponent.
    pub fn as_display(&self) -> String {
        match self {
            Number::Integer(i) => i.to_string(),
            Number::Float(f) => format!("{f:?}"),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a persisted cell. Empty text is a missing value.
pub fn parse_number_literal(value: &str) -> Result<Option<Number>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(Some(Number::Integer(parsed)));
    }
    trimmed
        .parse::<f64>()
        .map(|parsed| Some(Number::Float(parsed)))
        .map_err(|_| Error::parse("persisted cell", format!("'{trimmed}' is not numeric")))
}

/// Lower-cases a label and strips punctuation, joining words with `_`.
pub fn normalize_label(label: &str) -> String {
    let normalized = label.to_snake_case();
    if normalized.is_empty() {
        "column".to_string()
    } else {
        normalized
    }
}

/// Column name of a cell in the joined dataset:
/// `{subject_abbreviation}__{table_id}__{cell_label}`.
pub fn namespaced_column(subject_abbreviation: &str, table_id: &str, cell_label: &str) -> String {
    format!(
        "{}__{}__{}",
        normalize_label(subject_abbreviation),
        normalize_label(table_id),
        normalize_label(cell_label)
    )
}
