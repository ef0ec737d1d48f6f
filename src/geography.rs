//! Geography registry.
//!
//! Every geography member (`g*.csv`) of every archive is parsed into a map
//! from [`GeoKey`] to [`GeoRecord`], keeping tract-level records only.

use std::collections::{BTreeMap, btree_map::Entry};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    archive::{Archive, ArchiveSet, GEOGRAPHY_EXTENSION, GEOGRAPHY_PREFIX},
    error::{Error, Result},
    io_utils,
};

/// Length of a census-tract geographic identifier.
pub const TRACT_ID_LENGTH: usize = 11;

/// Field count below which a geography row cannot be addressed.
const MIN_GEOGRAPHY_FIELDS: usize = 6;

/// Marker separating the summary-level prefix from the identifier in a GEOID.
const GEOID_MARKER: &str = "US";

/// USPS abbreviations that carry a state-level designation (50 states + DC).
pub const STATE_ABBREVIATIONS: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// `(state abbreviation, logical record number)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeoKey {
    pub state: String,
    pub logical_record_number: String,
}

impl GeoKey {
    pub fn new(state: impl Into<String>, logical_record_number: impl Into<String>) -> Self {
        GeoKey {
            state: state.into(),
            logical_record_number: logical_record_number.into(),
        }
    }
}

impl std::fmt::Display for GeoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.state, self.logical_record_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub geo_key: GeoKey,
    pub geographic_id: String,
    pub geo_label: String,
}

/// Returns the state-level designation for an abbreviation, if it has one.
pub fn state_designation(abbreviation: &str) -> Option<&'static str> {
    let upper = abbreviation.trim().to_ascii_uppercase();
    STATE_ABBREVIATIONS
        .iter()
        .copied()
        .find(|candidate| *candidate == upper)
}

/// Strips the summary-level prefix (`14000US`) from a GEOID field.
pub fn strip_geoid_prefix(geoid: &str) -> &str {
    match geoid.find(GEOID_MARKER) {
        Some(idx) => &geoid[idx + GEOID_MARKER.len()..],
        None => geoid,
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeoRegistry {
    records: BTreeMap<GeoKey, GeoRecord>,
}

impl GeoRegistry {
    pub fn build(archives: &ArchiveSet) -> Result<Self> {
        let mut registry = GeoRegistry::default();
        for (archive, member) in archives.members_matching(GEOGRAPHY_PREFIX, GEOGRAPHY_EXTENSION) {
            registry.ingest_member(archive, member)?;
        }
        info!(
            "Geography registry holds {} tract record(s) from {} archive(s)",
            registry.len(),
            archives.len()
        );
        Ok(registry)
    }

    fn ingest_member(&mut self, archive: &Archive, member: &str) -> Result<()> {
        info!("Parsing geography data for {member}");
        let bytes = archive.read_member(member)?;
        let kept = self.ingest_bytes(&bytes, member)?;
        debug!("{member}: kept {kept} tract record(s)");
        Ok(())
    }

    /// Parses one geography member's raw bytes, returning the number of
    /// tract records kept.
    pub fn ingest_bytes(&mut self, bytes: &[u8], member: &str) -> Result<usize> {
        let encoding = io_utils::legacy_encoding();
        let mut reader = io_utils::open_csv_reader(bytes, io_utils::DEFAULT_CSV_DELIMITER, false);
        let mut kept = 0usize;
        for (idx, record) in reader.byte_records().enumerate() {
            let context = format!("{member} line {}", idx + 1);
            let record = record.map_err(|e| Error::csv(&context, e))?;
            let row = io_utils::decode_record(&record, encoding, &context)?;
            if let Some(geo) = parse_geography_row(&row, &context)? {
                self.insert(geo)?;
                kept += 1;
            }
        }
        Ok(kept)
    }

    /// Adds a record. A repeated key must describe the same geography.
    pub fn insert(&mut self, record: GeoRecord) -> Result<()> {
        match self.records.entry(record.geo_key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(existing) => {
                if existing.get() != &record {
                    return Err(Error::consistency(format!(
                        "geography key {} maps to both {} and {}",
                        record.geo_key,
                        existing.get().geographic_id,
                        record.geographic_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &GeoKey) -> Option<&GeoRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoRecord> {
        self.records.values()
    }

    /// Every known geographic id with the state abbreviation of its record,
    /// sorted by id.
    pub fn universe(&self) -> BTreeMap<String, String> {
        self.records
            .values()
            .map(|r| (r.geographic_id.clone(), r.geo_key.state.clone()))
            .collect()
    }
}

fn parse_geography_row(row: &[String], context: &str) -> Result<Option<GeoRecord>> {
    if row.len() < MIN_GEOGRAPHY_FIELDS {
        return Err(Error::parse(
            context,
            format!(
                "expected at least {MIN_GEOGRAPHY_FIELDS} fields, found {}",
                row.len()
            ),
        ));
    }
    let geoid_field = row[row.len() - 5].trim();
    let geographic_id = strip_geoid_prefix(geoid_field);
    if geographic_id.chars().count() != TRACT_ID_LENGTH {
        return Ok(None);
    }
    Ok(Some(GeoRecord {
        geo_key: GeoKey::new(row[1].trim(), row[4].trim()),
        geographic_id: geographic_id.to_string(),
        geo_label: row[row.len() - 4].trim().to_string(),
    }))
}
