//! Cohort VCF export
//!
//! Writes a dense table as a multi-sample VCF 4.2 text stream compressed
//! with gzip, the interchange form downstream tools ingest. Rows must
//! carry QC aggregates (AF, AC, AN, call rate); the `mt2vcf` pipeline
//! computes them right before exporting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use crate::error::{GvkitError, Result};
use crate::paths::check_vcf_export_path;
use crate::table::{DenseTable, Entry};

const FIXED_HEADER: &str = "\
##fileformat=VCFv4.2\n\
##source=gvkit\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Alternate allele frequency\">\n\
##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Alternate allele count\">\n\
##INFO=<ID=AN,Number=1,Type=Integer,Description=\"Total number of called alleles\">\n\
##INFO=<ID=CR,Number=1,Type=Float,Description=\"Fraction of samples with a called genotype\">\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">\n\
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">\n\
##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allele depths\">\n";

/// Export `table` to a gzip-compressed VCF at `path` (must end in
/// `.vcf.bgz`).
pub fn export_vcf(table: &DenseTable, path: &Path) -> Result<()> {
    check_vcf_export_path(path)?;
    if let Some(row) = table.rows.iter().find(|row| row.info.is_none()) {
        return Err(GvkitError::IncompatibleInputs(format!(
            "row {}:{} has no QC aggregates; run variant QC before exporting",
            row.chrom, row.pos
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));
    writer.write_all(FIXED_HEADER.as_bytes())?;
    writer.write_all(b"##reference=")?;
    writer.write_all(table.metadata.reference_genome.to_string().as_bytes())?;
    writer.write_all(b"\n")?;

    write!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
    for col in &table.metadata.cols {
        write!(writer, "\t{col}")?;
    }
    writer.write_all(b"\n")?;

    for row in &table.rows {
        let Some(info) = row.info else {
            continue;
        };
        write!(
            writer,
            "{}\t{}\t.\t{}\t{}\t.\t.\tAF={:.6};AC={};AN={};CR={:.4}\tGT:DP:GQ:AD",
            row.chrom,
            row.pos,
            row.ref_allele,
            row.alts.join(","),
            info.af,
            info.ac,
            info.an,
            info.call_rate
        )?;
        for entry in &row.entries {
            write!(writer, "\t{}", format_entry(entry))?;
        }
        writer.write_all(b"\n")?;
    }

    writer.into_inner().map_err(|e| e.into_error())?.finish()?;
    info!(
        path = %path.display(),
        rows = table.count_rows(),
        samples = table.count_cols(),
        "exported cohort VCF"
    );
    Ok(())
}

fn format_entry(entry: &Entry) -> String {
    let gt = match entry.gt {
        Some((a, b)) => format!("{a}/{b}"),
        None => "./.".to_string(),
    };
    let dp = entry.dp.map_or_else(|| ".".to_string(), |v| v.to_string());
    let gq = entry.gq.map_or_else(|| ".".to_string(), |v| v.to_string());
    let ad = entry.ad.as_ref().map_or_else(
        || ".".to_string(),
        |ad| {
            ad.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",")
        },
    );
    format!("{gt}:{dp}:{gq}:{ad}")
}
