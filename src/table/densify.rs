//! Dense materialization of a variant dataset
//!
//! Turns the two substructures of a variant dataset into one
//! samples-by-variants matrix. For every site, a sample contributes
//! either its variant call (local alleles converted to global `GT`
//! through the call's `LA` mapping), a homozygous-reference entry
//! synthesized from a covering reference block, or a no-call when neither
//! exists.

use tracing::info;

use crate::dataset::{RefBlock, VariantDataset};
use crate::error::Result;
use crate::table::{DenseTable, Entry, TableRow};

/// Materialize `dataset` into a dense table.
pub fn vds_to_dense(dataset: &VariantDataset) -> Result<DenseTable> {
    dataset.validate()?;

    let n_samples = dataset.count_samples();
    let mut per_sample_blocks: Vec<Vec<&RefBlock>> = vec![Vec::new(); n_samples];
    for block in &dataset.blocks {
        per_sample_blocks[block.sample].push(block);
    }

    let mut table = DenseTable::new(
        dataset.metadata.reference_genome,
        dataset.metadata.samples.clone(),
    );
    for site in &dataset.sites {
        let n_alleles = 1 + site.alts.len();
        let mut entries = Vec::with_capacity(n_samples);
        for (sample, call) in site.calls.iter().enumerate() {
            let entry = match call {
                Some(call) => {
                    // LGT -> GT through the local-to-global mapping.
                    let gt = call.lgt.map(|(a, b)| (call.la[a], call.la[b]));
                    let ad = call.ad.as_ref().map(|local_ad| {
                        let mut global_ad = vec![0; n_alleles];
                        for (local, depth) in local_ad.iter().enumerate() {
                            if let Some(&global) = call.la.get(local) {
                                global_ad[global] += depth;
                            }
                        }
                        global_ad
                    });
                    Entry {
                        gt,
                        dp: call.dp,
                        gq: call.gq,
                        ad,
                        adj: None,
                    }
                }
                None => reference_entry(&per_sample_blocks[sample], site, n_alleles),
            };
            entries.push(entry);
        }
        table.rows.push(TableRow {
            chrom: site.chrom.clone(),
            pos: site.pos,
            ref_allele: site.ref_allele.clone(),
            alts: site.alts.clone(),
            info: None,
            entries,
        });
    }

    table.sort_rows();
    info!(
        rows = table.count_rows(),
        cols = table.count_cols(),
        "densified variant dataset"
    );
    Ok(table)
}

fn reference_entry(
    blocks: &[&RefBlock],
    site: &crate::dataset::VariantSite,
    n_alleles: usize,
) -> Entry {
    match blocks.iter().find(|b| b.covers(&site.chrom, site.pos)) {
        Some(block) => {
            let ad = block.min_dp.map(|dp| {
                let mut ad = vec![0; n_alleles];
                ad[0] = dp;
                ad
            });
            Entry {
                gt: Some((0, 0)),
                dp: block.min_dp,
                gq: block.gq,
                ad,
                adj: None,
            }
        }
        None => Entry::no_call(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{union_datasets, RefBlock, VariantCall, VariantSite};
    use crate::session::ReferenceGenome;

    fn two_sample_dataset() -> VariantDataset {
        let mut a = VariantDataset::empty(ReferenceGenome::Grch38);
        a.metadata.samples.push("s1".to_string());
        a.sites.push(VariantSite {
            chrom: "chr1".to_string(),
            pos: 1000,
            ref_allele: "A".to_string(),
            alts: vec!["T".to_string()],
            calls: vec![Some(VariantCall {
                lgt: Some((0, 1)),
                la: vec![0, 1],
                dp: Some(30),
                gq: Some(55),
                ad: Some(vec![14, 16]),
            })],
        });

        let mut b = VariantDataset::empty(ReferenceGenome::Grch38);
        b.metadata.samples.push("s2".to_string());
        b.blocks.push(RefBlock {
            sample: 0,
            chrom: "chr1".to_string(),
            start: 900,
            end: 1100,
            min_dp: Some(25),
            gq: Some(60),
        });

        union_datasets(&[a, b]).unwrap()
    }

    #[test]
    fn fills_reference_entries_from_covering_blocks() {
        let table = vds_to_dense(&two_sample_dataset()).unwrap();
        assert_eq!(table.count_rows(), 1);
        assert_eq!(table.count_cols(), 2);

        let row = &table.rows[0];
        assert_eq!(row.entries[0].gt, Some((0, 1)));
        assert_eq!(row.entries[0].ad, Some(vec![14, 16]));
        // s2 has no variant call but its block covers the site.
        assert_eq!(row.entries[1].gt, Some((0, 0)));
        assert_eq!(row.entries[1].dp, Some(25));
        assert_eq!(row.entries[1].ad, Some(vec![25, 0]));
    }

    #[test]
    fn uncovered_sample_becomes_no_call() {
        let mut dataset = two_sample_dataset();
        dataset.blocks.clear();
        let table = vds_to_dense(&dataset).unwrap();
        assert_eq!(table.rows[0].entries[1], Entry::no_call());
    }

    #[test]
    fn local_alleles_map_to_merged_globals() {
        // Two samples with different alts at the same locus: the second
        // sample's local alt 1 must densify to global allele 2.
        let mut a = VariantDataset::empty(ReferenceGenome::Grch38);
        a.metadata.samples.push("s1".to_string());
        a.sites.push(VariantSite {
            chrom: "chr1".to_string(),
            pos: 1000,
            ref_allele: "A".to_string(),
            alts: vec!["T".to_string()],
            calls: vec![Some(VariantCall {
                lgt: Some((0, 1)),
                la: vec![0, 1],
                dp: None,
                gq: None,
                ad: None,
            })],
        });
        let mut b = a.clone();
        b.metadata.samples = vec!["s2".to_string()];
        b.sites[0].alts = vec!["G".to_string()];

        let merged = union_datasets(&[a, b]).unwrap();
        let table = vds_to_dense(&merged).unwrap();
        let row = &table.rows[0];
        assert_eq!(row.alts, vec!["T", "G"]);
        assert_eq!(row.entries[0].gt, Some((0, 1)));
        assert_eq!(row.entries[1].gt, Some((0, 2)));
    }
}
