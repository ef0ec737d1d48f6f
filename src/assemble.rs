//! Table assembly.
//!
//! Turns a decoded table (rows keyed by [`GeoKey`]) into an
//! [`AssembledTable`] indexed by geographic id, with namespaced column names.

use std::collections::{BTreeMap, HashMap, HashSet, hash_map::Entry};

use log::{debug, info};

use crate::{
    data::{Number, namespaced_column},
    decoder::DecodedTable,
    error::{Error, Result},
    geography::{GeoKey, GeoRegistry},
    lookup::TableDescriptor,
    selector::TableManifestEntry,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTable {
    pub table_id: String,
    pub columns: Vec<String>,
    /// One complete row per geographic id.
    pub rows: BTreeMap<String, Vec<Number>>,
}

impl AssembledTable {
    pub fn new(table_id: impl Into<String>, columns: Vec<String>) -> Self {
        AssembledTable {
            table_id: table_id.into(),
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(geographic_id, column, value)` triples in row then column order.
    pub fn triples(&self) -> Vec<(&str, &str, Number)> {
        self.rows
            .iter()
            .flat_map(|(id, values)| {
                self.columns
                    .iter()
                    .zip(values.iter())
                    .map(move |(column, value)| (id.as_str(), column.as_str(), *value))
            })
            .collect()
    }
}

/// Unique cell labels in first-seen order.
pub fn unique_labels(cells: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    cells
        .iter()
        .filter(|label| seen.insert(label.as_str()))
        .cloned()
        .collect()
}

pub fn assemble(
    entry: &TableManifestEntry,
    descriptor: &TableDescriptor,
    mut decoded: DecodedTable,
    registry: &GeoRegistry,
) -> Result<AssembledTable> {
    let labels = unique_labels(&descriptor.cells);
    let columns = labels
        .iter()
        .map(|label| namespaced_column(&entry.subject_abbreviation, &entry.table_id, label))
        .collect::<Vec<_>>();

    let decoded_rows = decoded.len();
    let incomplete = decoded.retain_complete(|key, row| {
        registry.get(key).is_some() && labels.iter().all(|label| row.contains_key(label))
    });

    let mut table = AssembledTable::new(entry.table_id.clone(), columns);
    let mut owners: HashMap<String, GeoKey> = HashMap::new();
    for (key, row) in decoded {
        let Some(record) = registry.get(&key) else {
            continue;
        };
        match owners.entry(record.geographic_id.clone()) {
            Entry::Occupied(owner) => {
                return Err(Error::consistency(format!(
                    "table {}: geographic id {} is claimed by both {} and {}",
                    entry.table_id,
                    record.geographic_id,
                    owner.get(),
                    key
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
            }
        }
        let values = labels
            .iter()
            .filter_map(|label| row.get(label).copied())
            .collect::<Vec<_>>();
        table.rows.insert(record.geographic_id.clone(), values);
    }

    debug!(
        "{}: {} decoded row(s), {} dropped as non-tract or incomplete",
        entry.table_id, decoded_rows, incomplete
    );
    info!(
        "Assembled {} with {} row(s) x {} column(s)",
        entry.table_id,
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decoder::DecodedCellRow, geography::GeoRecord};

    fn entry() -> TableManifestEntry {
        TableManifestEntry {
            table_id: "B01001".to_string(),
            table_title: "SEX BY AGE".to_string(),
            subject_area: "Age-Sex".to_string(),
            subject_abbreviation: "age".to_string(),
            selected: true,
        }
    }

    fn registry(records: &[(&str, &str, &str)]) -> GeoRegistry {
        let mut registry = GeoRegistry::default();
        for (state, logrecno, id) in records {
            registry
                .insert(GeoRecord {
                    geo_key: GeoKey::new(*state, *logrecno),
                    geographic_id: id.to_string(),
                    geo_label: format!("Tract {id}"),
                })
                .unwrap();
        }
        registry
    }

    fn descriptor(cells: &[&str]) -> TableDescriptor {
        TableDescriptor {
            cells: cells.iter().map(|c| c.to_string()).collect(),
            ..TableDescriptor::unresolved("SEX BY AGE", "Age-Sex")
        }
    }

    fn row(values: &[(&str, i64)]) -> DecodedCellRow {
        values
            .iter()
            .map(|(label, value)| (label.to_string(), Number::Integer(*value)))
            .collect()
    }

    #[test]
    fn assemble_drops_incomplete_and_unknown_rows() {
        let registry = registry(&[
            ("AK", "1", "02013000100"),
            ("AK", "2", "02013000200"),
        ]);
        let mut decoded = DecodedTable::new();
        decoded.upsert(GeoKey::new("AK", "1"), row(&[("Total:", 10), ("Male:", 4)]));
        decoded.upsert(GeoKey::new("AK", "2"), row(&[("Total:", 10)]));
        decoded.upsert(GeoKey::new("AK", "9"), row(&[("Total:", 1), ("Male:", 1)]));
        let table = assemble(&entry(), &descriptor(&["Total:", "Male:"]), decoded, &registry)
            .unwrap();
        assert_eq!(table.columns, vec!["age__b01001__total", "age__b01001__male"]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.rows.get("02013000100"),
            Some(&vec![Number::Integer(10), Number::Integer(4)])
        );
    }

    #[test]
    fn geographic_id_collisions_are_consistency_errors() {
        let registry = registry(&[
            ("AK", "1", "02013000100"),
            ("AK", "2", "02013000100"),
        ]);
        let mut decoded = DecodedTable::new();
        decoded.upsert(GeoKey::new("AK", "1"), row(&[("Total:", 1)]));
        decoded.upsert(GeoKey::new("AK", "2"), row(&[("Total:", 2)]));
        let err = assemble(&entry(), &descriptor(&["Total:"]), decoded, &registry).unwrap_err();
        assert!(matches!(err, Error::Consistency { .. }));
    }

    #[test]
    fn unique_labels_keep_first_seen_order() {
        let cells = ["b", "a", "b"].map(String::from);
        assert_eq!(unique_labels(&cells), vec!["b", "a"]);
    }
}
