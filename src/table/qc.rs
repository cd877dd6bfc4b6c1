//! Genotype annotation, multi-allelic splitting and variant QC
//!
//! Adjusted genotypes follow the gnomAD definition: GQ of at least 20,
//! depth of at least 10, and for heterozygous calls an allele balance of
//! at least 0.2 for each alternate allele. Multi-allelic splitting emits
//! one row per alternate allele, downcoding other alternates to the
//! reference. Variant QC aggregates AC/AN/AF and call rate per row, with
//! AC and AF reported for the first alternate allele as in the exported
//! INFO fields.

use tracing::info;

use crate::error::{GvkitError, Result};
use crate::table::{DenseTable, Entry, RowInfo, TableRow};

const ADJ_MIN_GQ: u32 = 20;
const ADJ_MIN_DP: u32 = 10;
const ADJ_MIN_AB: f64 = 0.2;

fn entry_is_adj(entry: &Entry) -> bool {
    let Some((a, b)) = entry.gt else {
        return false;
    };
    if entry.gq.is_none_or(|gq| gq < ADJ_MIN_GQ) {
        return false;
    }
    if entry.dp.is_none_or(|dp| dp < ADJ_MIN_DP) {
        return false;
    }
    if a != b {
        // Heterozygous: every non-reference allele must carry at least
        // 20% of the reads.
        let Some(ad) = &entry.ad else {
            return false;
        };
        let dp = entry.dp.unwrap_or(0);
        if dp == 0 {
            return false;
        }
        for allele in [a, b] {
            if allele == 0 {
                continue;
            }
            let depth = ad.get(allele).copied().unwrap_or(0);
            if (depth as f64) / (dp as f64) < ADJ_MIN_AB {
                return false;
            }
        }
    }
    true
}

/// Annotate every entry with its adjusted-genotype flag.
pub fn annotate_adj(table: &mut DenseTable) {
    for row in &mut table.rows {
        for entry in &mut row.entries {
            entry.adj = Some(entry_is_adj(entry));
        }
    }
    table.metadata.adjusted = true;
    info!(rows = table.count_rows(), "annotated adjusted genotypes");
}

/// Set non-adjusted entries to no-calls. Requires a prior
/// [`annotate_adj`] pass.
pub fn filter_adj_entries(table: &mut DenseTable) -> Result<()> {
    if !table.metadata.adjusted {
        return Err(GvkitError::IncompatibleInputs(
            "table does not contain adjusted genotypes".to_string(),
        ));
    }
    let mut filtered = 0usize;
    for row in &mut table.rows {
        for entry in &mut row.entries {
            if entry.adj != Some(true) && entry.gt.is_some() {
                *entry = Entry {
                    adj: Some(false),
                    ..Entry::no_call()
                };
                filtered += 1;
            }
        }
    }
    info!(filtered, "filtered entries to adjusted genotypes");
    Ok(())
}

fn split_entry(entry: &Entry, alt: usize) -> Entry {
    let recode = |allele: usize| usize::from(allele == alt);
    Entry {
        gt: entry.gt.map(|(a, b)| (recode(a), recode(b))),
        dp: entry.dp,
        gq: entry.gq,
        ad: entry.ad.as_ref().map(|ad| {
            let alt_depth = ad.get(alt).copied().unwrap_or(0);
            let total: u32 = ad.iter().sum();
            vec![total - alt_depth, alt_depth]
        }),
        adj: entry.adj,
    }
}

/// Split multi-allelic rows into one biallelic row per alternate allele.
///
/// Genotype alleles equal to the split alternate become 1; the reference
/// and every other alternate are downcoded to 0. Already-biallelic rows
/// pass through unchanged.
pub fn split_multi(table: DenseTable) -> DenseTable {
    let mut result = DenseTable::new(table.metadata.reference_genome, table.metadata.cols.clone());
    result.metadata = table.metadata.clone();
    result.rows = Vec::with_capacity(table.rows.len());

    let mut split = 0usize;
    for row in table.rows {
        if row.alts.len() <= 1 {
            result.rows.push(row);
            continue;
        }
        split += 1;
        for (offset, alt) in row.alts.iter().enumerate() {
            let global_alt = offset + 1;
            result.rows.push(TableRow {
                chrom: row.chrom.clone(),
                pos: row.pos,
                ref_allele: row.ref_allele.clone(),
                alts: vec![alt.clone()],
                info: None,
                entries: row
                    .entries
                    .iter()
                    .map(|entry| split_entry(entry, global_alt))
                    .collect(),
            });
        }
    }
    result.metadata.was_split = true;
    result.sort_rows();
    info!(split, rows = result.count_rows(), "split multi-allelic rows");
    result
}

/// Compute per-row AC/AN/AF and call rate into [`TableRow::info`].
pub fn variant_qc(table: &mut DenseTable) {
    let n_cols = table.metadata.cols.len();
    for row in &mut table.rows {
        let mut called = 0u32;
        let mut ac = 0u32;
        for entry in &row.entries {
            if let Some((a, b)) = entry.gt {
                called += 1;
                ac += u32::from(a == 1) + u32::from(b == 1);
            }
        }
        let an = called * 2;
        row.info = Some(RowInfo {
            ac,
            an,
            af: if an > 0 { f64::from(ac) / f64::from(an) } else { 0.0 },
            call_rate: if n_cols > 0 {
                f64::from(called) / n_cols as f64
            } else {
                0.0
            },
        });
    }
    info!(rows = table.count_rows(), "computed variant QC");
}

/// Drop rows whose alternate allele count is below `min_ac`. A threshold
/// of 0 disables the filter. Requires a prior [`variant_qc`] pass.
pub fn filter_min_ac(table: &mut DenseTable, min_ac: u32) -> Result<()> {
    if min_ac == 0 {
        return Ok(());
    }
    if table.rows.iter().any(|row| row.info.is_none()) {
        return Err(GvkitError::IncompatibleInputs(
            "minimum-AC filter requires variant QC aggregates".to_string(),
        ));
    }
    let before = table.rows.len();
    table
        .rows
        .retain(|row| row.info.is_some_and(|info| info.ac >= min_ac));
    info!(
        removed = before - table.rows.len(),
        kept = table.rows.len(),
        min_ac,
        "filtered rows by alternate allele count"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ReferenceGenome;
    use test_case::test_case;

    fn entry(gt: Option<(usize, usize)>, dp: u32, gq: u32, ad: Vec<u32>) -> Entry {
        Entry {
            gt,
            dp: Some(dp),
            gq: Some(gq),
            ad: Some(ad),
            adj: None,
        }
    }

    fn one_row_table(entries: Vec<Entry>, alts: Vec<&str>) -> DenseTable {
        let cols = (0..entries.len()).map(|i| format!("s{i}")).collect();
        let mut table = DenseTable::new(ReferenceGenome::Grch38, cols);
        table.rows.push(TableRow {
            chrom: "chr1".to_string(),
            pos: 100,
            ref_allele: "A".to_string(),
            alts: alts.into_iter().map(str::to_string).collect(),
            info: None,
            entries,
        });
        table
    }

    #[test_case(entry(Some((0, 1)), 30, 50, vec![15, 15]), true; "good het")]
    #[test_case(entry(Some((0, 1)), 30, 10, vec![15, 15]), false; "low gq")]
    #[test_case(entry(Some((0, 1)), 5, 50, vec![3, 2]), false; "low dp")]
    #[test_case(entry(Some((0, 1)), 30, 50, vec![27, 3]), false; "skewed balance")]
    #[test_case(entry(Some((1, 1)), 30, 50, vec![0, 30]), true; "hom alt ignores balance")]
    #[test_case(entry(None, 30, 50, vec![30, 0]), false; "no call")]
    fn adj_definition(entry: Entry, expected: bool) {
        assert_eq!(entry_is_adj(&entry), expected);
    }

    #[test]
    fn filter_adj_requires_annotation() {
        let mut table = one_row_table(vec![entry(Some((0, 1)), 30, 50, vec![15, 15])], vec!["T"]);
        assert!(filter_adj_entries(&mut table).is_err());

        annotate_adj(&mut table);
        filter_adj_entries(&mut table).unwrap();
        assert_eq!(table.rows[0].entries[0].gt, Some((0, 1)));
    }

    #[test]
    fn filter_adj_no_calls_bad_entries() {
        let mut table = one_row_table(
            vec![
                entry(Some((0, 1)), 30, 50, vec![15, 15]),
                entry(Some((0, 1)), 30, 10, vec![15, 15]),
            ],
            vec!["T"],
        );
        annotate_adj(&mut table);
        filter_adj_entries(&mut table).unwrap();
        assert!(table.rows[0].entries[0].gt.is_some());
        assert!(table.rows[0].entries[1].gt.is_none());
    }

    #[test]
    fn split_multi_produces_one_row_per_alt() {
        let table = one_row_table(
            vec![entry(Some((1, 2)), 30, 50, vec![0, 14, 16])],
            vec!["T", "G"],
        );
        let split = split_multi(table);
        assert!(split.metadata.was_split);
        assert_eq!(split.count_rows(), 2);

        // First alt T: the G allele downcodes to ref.
        assert_eq!(split.rows[0].alts, vec!["T"]);
        assert_eq!(split.rows[0].entries[0].gt, Some((1, 0)));
        assert_eq!(split.rows[0].entries[0].ad, Some(vec![16, 14]));
        // Second alt G, symmetric.
        assert_eq!(split.rows[1].alts, vec!["G"]);
        assert_eq!(split.rows[1].entries[0].gt, Some((0, 1)));
        assert_eq!(split.rows[1].entries[0].ad, Some(vec![14, 16]));
    }

    #[test]
    fn qc_counts_first_alt_alleles() {
        let mut table = one_row_table(
            vec![
                entry(Some((0, 1)), 30, 50, vec![15, 15]),
                entry(Some((1, 1)), 30, 50, vec![0, 30]),
                Entry::no_call(),
            ],
            vec!["T"],
        );
        variant_qc(&mut table);
        let info = table.rows[0].info.unwrap();
        assert_eq!(info.ac, 3);
        assert_eq!(info.an, 4);
        assert!((info.af - 0.75).abs() < 1e-9);
        assert!((info.call_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn min_ac_filter_drops_rows() {
        let mut table = one_row_table(vec![entry(Some((0, 0)), 30, 50, vec![30, 0])], vec!["T"]);
        variant_qc(&mut table);
        filter_min_ac(&mut table, 1).unwrap();
        assert_eq!(table.count_rows(), 0);
    }

    #[test]
    fn zero_threshold_disables_filter() {
        let mut table = one_row_table(vec![entry(Some((0, 0)), 30, 50, vec![30, 0])], vec!["T"]);
        filter_min_ac(&mut table, 0).unwrap();
        assert_eq!(table.count_rows(), 1);
    }
}
