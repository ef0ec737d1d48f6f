//! Post-join filtering of the joined dataset.

use log::info;

use crate::{geography::state_designation, join::JoinedDataset};

/// Drops columns whose missing count exceeds `null_threshold` (a count equal
/// to the threshold is kept). With `states_only`, drops rows that lack a
/// state-level designation.
pub fn filter(
    mut dataset: JoinedDataset,
    null_threshold: usize,
    states_only: bool,
) -> JoinedDataset {
    if states_only {
        let before = dataset.row_count();
        dataset.rows.retain(|_, row| {
            row.state
                .as_deref()
                .and_then(state_designation)
                .is_some()
        });
        info!(
            "Dropped {} row(s) without a state designation",
            before - dataset.row_count()
        );
    }

    let keep = dataset
        .column_null_counts()
        .into_iter()
        .map(|count| count <= null_threshold)
        .collect::<Vec<_>>();

    let JoinedDataset { columns, mut rows } = dataset;
    let kept_columns = columns
        .into_iter()
        .zip(keep.iter())
        .filter(|(_, keep)| **keep)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    for row in rows.values_mut() {
        let values = std::mem::take(&mut row.values);
        row.values = values
            .into_iter()
            .zip(keep.iter())
            .filter(|(_, keep)| **keep)
            .map(|(value, _)| value)
            .collect();
    }
    info!(
        "Kept {} of {} column(s) at null threshold {}",
        kept_columns.len(),
        keep.len(),
        null_threshold
    );

    JoinedDataset {
        columns: kept_columns,
        rows,
    }
}
