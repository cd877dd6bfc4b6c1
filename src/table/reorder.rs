//! Column reordering against a reference table
//!
//! Given several dense tables that share the same column-key set in
//! different orders, permute every table's columns to exactly match a
//! chosen reference table's order. The reference table itself passes
//! through unchanged, and a subsequent [`super::union::union_rows`] of
//! the result succeeds.
//!
//! A non-reference table whose column-key set differs from the
//! reference's fails fast; this helper never guesses at partial
//! alignments.

use std::collections::HashMap;

use crate::error::{GvkitError, Result};
use crate::table::DenseTable;

/// Reorder every table's columns to match `tables[reference_index]`.
pub fn reorder_columns(tables: Vec<DenseTable>, reference_index: usize) -> Result<Vec<DenseTable>> {
    if reference_index >= tables.len() {
        return Err(GvkitError::ReferenceIndexOutOfRange {
            index: reference_index,
            len: tables.len(),
        });
    }

    let reference_cols = tables[reference_index].metadata.cols.clone();
    let target_of: HashMap<&str, usize> = reference_cols
        .iter()
        .enumerate()
        .map(|(position, key)| (key.as_str(), position))
        .collect();

    let mut reordered = Vec::with_capacity(tables.len());
    for (index, table) in tables.into_iter().enumerate() {
        if index == reference_index {
            reordered.push(table);
            continue;
        }
        reordered.push(reorder_one(table, index, &reference_cols, &target_of)?);
    }
    Ok(reordered)
}

fn reorder_one(
    table: DenseTable,
    index: usize,
    reference_cols: &[String],
    target_of: &HashMap<&str, usize>,
) -> Result<DenseTable> {
    if table.metadata.cols.len() != reference_cols.len() {
        return Err(GvkitError::ColumnKeyMismatch { index });
    }

    // source_of[target position] = source column index
    let mut source_of = vec![usize::MAX; reference_cols.len()];
    for (source, key) in table.metadata.cols.iter().enumerate() {
        let Some(&target) = target_of.get(key.as_str()) else {
            return Err(GvkitError::ColumnKeyMismatch { index });
        };
        if source_of[target] != usize::MAX {
            return Err(GvkitError::ColumnKeyMismatch { index });
        }
        source_of[target] = source;
    }

    if source_of == (0..reference_cols.len()).collect::<Vec<_>>() {
        return Ok(table); // already aligned
    }

    let mut result = table;
    result.metadata.cols = reference_cols.to_vec();
    for row in &mut result.rows {
        let entries = std::mem::take(&mut row.entries);
        row.entries = source_of
            .iter()
            .map(|&source| entries[source].clone())
            .collect();
    }
    Ok(result)
}
