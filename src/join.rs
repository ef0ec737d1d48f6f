use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::{assemble::AssembledTable, data::Number};

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub state: Option<String>,
    pub values: Vec<Option<Number>>,
}

/// One row per geographic id, columns gathered from every joined table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedDataset {
    pub columns: Vec<String>,
    pub rows: BTreeMap<String, JoinedRow>,
}

impl JoinedDataset {
    /// Empty dataset over a universe of `geographic_id -> state` pairs.
    pub fn from_universe<I, S>(universe: I) -> Self
    where
        I: IntoIterator<Item = (String, S)>,
        S: Into<Option<String>>,
    {
        let rows = universe
            .into_iter()
            .map(|(id, state)| {
                (
                    id,
                    JoinedRow {
                        state: state.into(),
                        values: Vec::new(),
                    },
                )
            })
            .collect();
        JoinedDataset {
            columns: Vec::new(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, geographic_id: &str, column: &str) -> Option<Number> {
        let idx = self.column_index(column)?;
        self.rows
            .get(geographic_id)
            .and_then(|row| row.values.get(idx).copied().flatten())
    }

    /// Sets each row's state from `states`, keyed by geographic id. Rows
    /// absent from `states` end up with no state.
    pub fn assign_states(&mut self, states: &BTreeMap<String, String>) {
        for (id, row) in self.rows.iter_mut() {
            row.state = states.get(id).cloned();
        }
    }

    /// Missing-value count per column, in column order.
    pub fn column_null_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.columns.len()];
        for row in self.rows.values() {
            for (idx, value) in row.values.iter().enumerate() {
                if value.is_none() {
                    counts[idx] += 1;
                }
            }
        }
        counts
    }

    /// Left-joins `table` on geographic id. Columns whose name is already
    /// present are skipped, so an earlier table keeps its values.
    pub fn left_join(&mut self, table: &AssembledTable) -> usize {
        let existing: HashSet<&str> = self.columns.iter().map(|c| c.as_str()).collect();
        let mut seen_in_table = HashSet::new();
        let taken = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                !existing.contains(name.as_str()) && seen_in_table.insert(name.as_str())
            })
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let skipped = table.columns.len() - taken.len();
        if skipped > 0 {
            debug!(
                "{}: skipped {} column(s) already present",
                table.table_id, skipped
            );
        }

        let new_columns = taken
            .iter()
            .map(|idx| table.columns[*idx].clone())
            .collect::<Vec<_>>();
        for (id, row) in self.rows.iter_mut() {
            let source = table.rows.get(id);
            row.values.extend(
                taken
                    .iter()
                    .map(|idx| source.and_then(|values| values.get(*idx).copied())),
            );
        }
        self.columns.extend(new_columns);
        taken.len()
    }
}

/// Joins every table, in order, onto the geography universe.
pub fn join_all<'a, I, T>(universe: I, tables: T) -> JoinedDataset
where
    I: IntoIterator<Item = (String, String)>,
    T: IntoIterator<Item = &'a AssembledTable>,
{
    let mut dataset = JoinedDataset::from_universe(universe);
    let mut joined_tables = 0usize;
    for table in tables {
        let added = dataset.left_join(table);
        debug!("Joined {} ({} column(s))", table.table_id, added);
        joined_tables += 1;
    }
    info!(
        "Joined {} table(s): {} row(s) x {} column(s)",
        joined_tables,
        dataset.row_count(),
        dataset.columns.len()
    );
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str, columns: &[&str], rows: &[(&str, &[i64])]) -> AssembledTable {
        let mut table = AssembledTable::new(id, columns.iter().map(|c| c.to_string()).collect());
        for (geo, values) in rows {
            table.rows.insert(
                geo.to_string(),
                values.iter().map(|v| Number::Integer(*v)).collect(),
            );
        }
        table
    }

    fn universe(ids: &[&str]) -> Vec<(String, String)> {
        ids.iter().map(|id| (id.to_string(), "AK".to_string())).collect()
    }

    #[test]
    fn join_all_unions_disjoint_columns() {
        let a = table("A", &["x__a__one"], &[("02013000100", &[1])]);
        let b = table("B", &["x__b__two"], &[("02013000100", &[2]), ("02013000200", &[3])]);
        let joined = join_all(universe(&["02013000100", "02013000200"]), [&a, &b]);

        assert_eq!(joined.columns, vec!["x__a__one", "x__b__two"]);
        assert_eq!(joined.value("02013000100", "x__a__one"), Some(Number::Integer(1)));
        assert_eq!(joined.value("02013000100", "x__b__two"), Some(Number::Integer(2)));
        assert_eq!(joined.value("02013000200", "x__a__one"), None);
        assert_eq!(joined.value("02013000200", "x__b__two"), Some(Number::Integer(3)));
    }

    #[test]
    fn assign_states_follows_the_given_map() {
        let mut dataset = JoinedDataset::from_universe([
            ("02013000100".to_string(), None::<String>),
            ("72001956300".to_string(), None),
        ]);
        let states = BTreeMap::from([("02013000100".to_string(), "AK".to_string())]);
        dataset.assign_states(&states);
        assert_eq!(dataset.rows["02013000100"].state.as_deref(), Some("AK"));
        assert_eq!(dataset.rows["72001956300"].state, None);
    }

    #[test]
    fn first_writer_wins_on_repeated_columns() {
        let a = table("A", &["x__a__one"], &[("02013000100", &[1])]);
        let again = table("A", &["x__a__one"], &[("02013000100", &[99])]);
        let joined = join_all(universe(&["02013000100"]), [&a, &again]);
        assert_eq!(joined.columns.len(), 1);
        assert_eq!(joined.value("02013000100", "x__a__one"), Some(Number::Integer(1)));
    }

    #[test]
    fn ids_outside_universe_are_not_added() {
        let a = table("A", &["x__a__one"], &[("99999999999", &[1])]);
        let joined = join_all(universe(&["02013000100"]), [&a]);
        assert_eq!(joined.row_count(), 1);
        assert_eq!(joined.column_null_counts(), vec![1]);
    }
}
