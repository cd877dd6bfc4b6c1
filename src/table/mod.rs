//! Dense table (MT) model and on-disk format
//!
//! A dense table is a fully materialized samples-by-variants matrix: a
//! directory ending in `.mt` with `metadata.json`, row shards under
//! `rows/part-NNNNN.jsonl` and a `_SUCCESS` marker at the root. Each row
//! carries the variant, optional QC info, and exactly one entry per
//! column (sample), aligned with the column keys in the metadata.

pub mod densify;
pub mod qc;
pub mod reorder;
pub mod union;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{contig_rank, FORMAT_VERSION, METADATA_FILE, SUCCESS_MARKER};
use crate::error::{GvkitError, Result};
use crate::session::{ReferenceGenome, Session};

/// Subdirectory holding the row shards.
pub const ROWS_DIR: &str = "rows";
/// Shard count used when none is requested.
pub const DEFAULT_PARTITIONS: usize = 1;

/// Root metadata of a dense table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtMetadata {
    /// Format version, for forward-compatibility checks.
    pub format_version: u32,
    /// Reference genome the table was written under.
    pub reference_genome: ReferenceGenome,
    /// Ordered column keys (sample ids); entries are aligned to this.
    pub cols: Vec<String>,
    /// Shard count the rows are written across.
    pub n_partitions: usize,
    /// Set once multi-allelic rows have been split.
    pub was_split: bool,
    /// Set once entries carry adjusted-genotype annotations.
    pub adjusted: bool,
    /// Set when columns are keyed by sample id.
    pub keyed_by_sample: bool,
}

/// Per-row QC aggregates in VCF-compatible form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowInfo {
    /// Alternate allele count (first alternate).
    pub ac: u32,
    /// Total called alleles.
    pub an: u32,
    /// Alternate allele frequency (first alternate).
    pub af: f64,
    /// Fraction of columns with a called genotype.
    pub call_rate: f64,
}

/// One genotype entry in global-allele representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Genotype as indices into `[ref] + alts`; `None` is a no-call.
    pub gt: Option<(usize, usize)>,
    /// Read depth.
    pub dp: Option<u32>,
    /// Genotype quality.
    pub gq: Option<u32>,
    /// Allele depths aligned with `[ref] + alts`.
    pub ad: Option<Vec<u32>>,
    /// Adjusted-genotype flag; present only after annotation.
    pub adj: Option<bool>,
}

impl Entry {
    /// Entry with no call and no depth information.
    pub fn no_call() -> Self {
        Self {
            gt: None,
            dp: None,
            gq: None,
            ad: None,
            adj: None,
        }
    }
}

/// One variant row with its per-column entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    /// Contig name.
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate alleles.
    pub alts: Vec<String>,
    /// QC aggregates, present after [`qc::variant_qc`].
    pub info: Option<RowInfo>,
    /// One entry per column, aligned with [`MtMetadata::cols`].
    pub entries: Vec<Entry>,
}

impl TableRow {
    /// Row identity used by column-union and validation: the variant
    /// without its entries.
    pub fn key(&self) -> (String, u64, String, Vec<String>) {
        (
            self.chrom.clone(),
            self.pos,
            self.ref_allele.clone(),
            self.alts.clone(),
        )
    }
}

/// In-memory dense table.
#[derive(Debug, Clone)]
pub struct DenseTable {
    /// Root metadata.
    pub metadata: MtMetadata,
    /// Rows sorted by (contig, position, ref allele).
    pub rows: Vec<TableRow>,
}

impl DenseTable {
    /// Table with the given columns and no rows.
    pub fn new(reference_genome: ReferenceGenome, cols: Vec<String>) -> Self {
        Self {
            metadata: MtMetadata {
                format_version: FORMAT_VERSION,
                reference_genome,
                cols,
                n_partitions: DEFAULT_PARTITIONS,
                was_split: false,
                adjusted: false,
                keyed_by_sample: false,
            },
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn count_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn count_cols(&self) -> usize {
        self.metadata.cols.len()
    }

    /// Mark the table as keyed by sample id. Column keys must be unique
    /// for the keying to be meaningful.
    pub fn key_cols_by_sample(&mut self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for col in &self.metadata.cols {
            if !seen.insert(col) {
                return Err(GvkitError::IncompatibleInputs(format!(
                    "duplicate sample id '{col}' while keying columns"
                )));
            }
        }
        self.metadata.keyed_by_sample = true;
        Ok(())
    }

    /// Change the shard count used by the next write.
    pub fn repartition(&mut self, n_partitions: usize) {
        self.metadata.n_partitions = n_partitions.max(1);
    }

    pub(crate) fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| {
            (contig_rank(&a.chrom), a.pos, &a.ref_allele, &a.alts)
                .cmp(&(contig_rank(&b.chrom), b.pos, &b.ref_allele, &b.alts))
        });
    }

    /// Structural validation: entry vectors aligned with columns, allele
    /// indices within each row's alleles.
    pub fn validate(&self) -> Result<()> {
        for row in &self.rows {
            if row.entries.len() != self.metadata.cols.len() {
                return Err(GvkitError::DatasetFormat {
                    path: std::path::PathBuf::new(),
                    reason: format!(
                        "row {}:{} has {} entries for {} columns",
                        row.chrom,
                        row.pos,
                        row.entries.len(),
                        self.metadata.cols.len()
                    ),
                });
            }
            let n_alleles = 1 + row.alts.len();
            for entry in &row.entries {
                if let Some((a, b)) = entry.gt {
                    if a >= n_alleles || b >= n_alleles {
                        return Err(GvkitError::DatasetFormat {
                            path: std::path::PathBuf::new(),
                            reason: format!(
                                "row {}:{} has GT outside {} alleles",
                                row.chrom, row.pos, n_alleles
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Write a dense table to `path` across its configured shard count.
pub fn write_mt(session: &Session, table: &DenseTable, path: &Path, overwrite: bool) -> Result<()> {
    if table.metadata.reference_genome != session.reference_genome() {
        return Err(GvkitError::IncompatibleInputs(format!(
            "table was built for {}, session uses {}",
            table.metadata.reference_genome,
            session.reference_genome()
        )));
    }
    table.validate()?;
    crate::dataset::prepare_output_dir(path, overwrite)?;

    let metadata_file = File::create(path.join(METADATA_FILE))?;
    serde_json::to_writer_pretty(BufWriter::new(metadata_file), &table.metadata)?;

    let rows_dir = path.join(ROWS_DIR);
    fs::create_dir_all(&rows_dir)?;
    let partitions = table.metadata.n_partitions.max(1);
    let chunk = table.rows.len().div_ceil(partitions).max(1);
    for (index, rows) in table.rows.chunks(chunk).enumerate() {
        let shard = rows_dir.join(format!("part-{index:05}.jsonl"));
        let mut writer = BufWriter::new(File::create(shard)?);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    fs::write(path.join(SUCCESS_MARKER), b"")?;
    info!(
        path = %path.display(),
        rows = table.count_rows(),
        cols = table.count_cols(),
        partitions,
        "wrote dense table"
    );
    Ok(())
}

/// Read a dense table from `path`. The table's reference genome must
/// match the session's.
pub fn read_mt(session: &Session, path: &Path) -> Result<DenseTable> {
    crate::paths::check_directory(path)?;
    if !path.join(SUCCESS_MARKER).is_file() {
        return Err(GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason: format!("missing {SUCCESS_MARKER} marker"),
        });
    }
    let metadata_path = path.join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason: format!("missing {METADATA_FILE}"),
        });
    }
    let metadata: MtMetadata = serde_json::from_reader(BufReader::new(File::open(metadata_path)?))?;
    if metadata.format_version != FORMAT_VERSION {
        return Err(GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", metadata.format_version),
        });
    }
    if metadata.reference_genome != session.reference_genome() {
        return Err(GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason: format!(
                "table uses {}, session uses {}",
                metadata.reference_genome,
                session.reference_genome()
            ),
        });
    }

    let rows_dir = path.join(ROWS_DIR);
    let mut shards: Vec<_> = fs::read_dir(&rows_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    shards.sort();

    let mut rows = Vec::new();
    for shard in shards {
        let reader = BufReader::new(File::open(shard)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(&line)?);
        }
    }

    let table = DenseTable { metadata, rows };
    table.validate().map_err(|err| match err {
        GvkitError::DatasetFormat { reason, .. } => GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    debug!(path = %path.display(), rows = table.count_rows(), "read dense table");
    Ok(table)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Small table with one entry per (row, column) and unit genotypes.
    pub fn table_with(
        cols: &[&str],
        rows: &[(&str, u64, &str, &str)],
        gt: Option<(usize, usize)>,
    ) -> DenseTable {
        let mut table = DenseTable::new(
            ReferenceGenome::Grch38,
            cols.iter().map(|c| c.to_string()).collect(),
        );
        for (chrom, pos, ref_allele, alt) in rows {
            table.rows.push(TableRow {
                chrom: chrom.to_string(),
                pos: *pos,
                ref_allele: ref_allele.to_string(),
                alts: vec![alt.to_string()],
                info: None,
                entries: cols
                    .iter()
                    .map(|_| Entry {
                        gt,
                        dp: Some(20),
                        gq: Some(50),
                        ad: None,
                        adj: None,
                    })
                    .collect(),
            });
        }
        table
    }
}
