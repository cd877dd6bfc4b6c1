//! Row- and column-wise union of dense tables
//!
//! `union_rows` stacks tables that share an identical column order: the
//! output row count is the sum of the inputs' and the column count is
//! unchanged. `union_cols` is the symmetric operation for tables sharing
//! identical row keys. Both fail fast on any key mismatch; reorder
//! columns first (see [`super::reorder`]) when inputs agree on the column
//! set but not the order.

use tracing::info;

use crate::error::{GvkitError, Result};
use crate::table::DenseTable;

fn check_nonempty(tables: &[DenseTable]) -> Result<&DenseTable> {
    tables.first().ok_or_else(|| {
        GvkitError::IncompatibleInputs("no tables to combine".to_string())
    })
}

fn check_same_reference(tables: &[DenseTable]) -> Result<()> {
    let reference = tables[0].metadata.reference_genome;
    if let Some(odd) = tables
        .iter()
        .find(|t| t.metadata.reference_genome != reference)
    {
        return Err(GvkitError::IncompatibleInputs(format!(
            "mixed reference genomes ({} and {})",
            reference, odd.metadata.reference_genome
        )));
    }
    Ok(())
}

/// Stack `tables` row-wise. Column keys must match exactly, order
/// included.
pub fn union_rows(tables: &[DenseTable]) -> Result<DenseTable> {
    let first = check_nonempty(tables)?;
    check_same_reference(tables)?;
    for (index, table) in tables.iter().enumerate().skip(1) {
        if table.metadata.cols != first.metadata.cols {
            return Err(GvkitError::IncompatibleInputs(format!(
                "table {index} has different column keys than table 0 \
                 (reorder columns first if only the order differs)"
            )));
        }
    }

    let mut merged = DenseTable::new(first.metadata.reference_genome, first.metadata.cols.clone());
    merged.metadata.was_split = tables.iter().all(|t| t.metadata.was_split);
    merged.metadata.adjusted = tables.iter().all(|t| t.metadata.adjusted);
    merged.metadata.keyed_by_sample = first.metadata.keyed_by_sample;
    for table in tables {
        merged.rows.extend(table.rows.iter().cloned());
    }
    merged.sort_rows();
    info!(
        inputs = tables.len(),
        rows = merged.count_rows(),
        cols = merged.count_cols(),
        "row union complete"
    );
    Ok(merged)
}

/// Join `tables` column-wise. Row keys must match exactly, order
/// included, and column keys must stay unique across inputs.
pub fn union_cols(tables: &[DenseTable]) -> Result<DenseTable> {
    let first = check_nonempty(tables)?;
    check_same_reference(tables)?;

    let reference_keys: Vec<_> = first.rows.iter().map(|r| r.key()).collect();
    for (index, table) in tables.iter().enumerate().skip(1) {
        let keys: Vec<_> = table.rows.iter().map(|r| r.key()).collect();
        if keys != reference_keys {
            return Err(GvkitError::IncompatibleInputs(format!(
                "table {index} has different row keys than table 0"
            )));
        }
    }

    let mut cols = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for table in tables {
        for col in &table.metadata.cols {
            if !seen.insert(col.clone()) {
                return Err(GvkitError::IncompatibleInputs(format!(
                    "sample '{col}' appears in more than one input"
                )));
            }
            cols.push(col.clone());
        }
    }

    let mut merged = DenseTable::new(first.metadata.reference_genome, cols);
    merged.metadata.was_split = tables.iter().all(|t| t.metadata.was_split);
    merged.metadata.adjusted = tables.iter().all(|t| t.metadata.adjusted);
    merged.metadata.keyed_by_sample = first.metadata.keyed_by_sample;
    for (row_idx, reference_row) in first.rows.iter().enumerate() {
        let mut row = reference_row.clone();
        row.entries = Vec::new();
        // QC aggregates are per-cohort; they do not survive widening.
        row.info = None;
        for table in tables {
            row.entries.extend(table.rows[row_idx].entries.iter().cloned());
        }
        merged.rows.push(row);
    }
    info!(
        inputs = tables.len(),
        rows = merged.count_rows(),
        cols = merged.count_cols(),
        "column union complete"
    );
    Ok(merged)
}
