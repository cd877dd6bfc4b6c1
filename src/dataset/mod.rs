//! Variant dataset (VDS) model and on-disk format
//!
//! A variant dataset is a directory ending in `.vds` with two
//! substructures: `reference_data/` holds per-sample reference-confirmed
//! intervals, `variant_data/` holds genuine variant sites. Each
//! substructure is a set of JSON-lines shards plus a `_SUCCESS` marker;
//! `metadata.json` at the root records the format version, the reference
//! genome and the ordered sample ids.
//!
//! Genotypes inside a dataset use local alleles: a call stores `LGT`
//! indices into its own `LA` mapping rather than indices into the merged
//! site alleles. Densification converts them to global `GT`.

pub mod combiner;
pub mod gvcf;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GvkitError, Result};
use crate::session::{ReferenceGenome, Session};

/// On-disk format version written into every metadata file.
pub const FORMAT_VERSION: u32 = 1;
/// Marker file written last into every completed substructure.
pub const SUCCESS_MARKER: &str = "_SUCCESS";
/// Metadata file name at a dataset root.
pub const METADATA_FILE: &str = "metadata.json";
/// Substructure holding reference-confirmed intervals.
pub const REFERENCE_DATA_DIR: &str = "reference_data";
/// Substructure holding variant sites.
pub const VARIANT_DATA_DIR: &str = "variant_data";

/// Root metadata of a variant dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdsMetadata {
    /// Format version, for forward-compatibility checks.
    pub format_version: u32,
    /// Reference genome the dataset was written under.
    pub reference_genome: ReferenceGenome,
    /// Ordered sample ids; call vectors are aligned to this order.
    pub samples: Vec<String>,
}

/// One reference-confirmed interval of one sample (closed interval,
/// 1-based coordinates as in the source GVCF).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefBlock {
    /// Index into [`VdsMetadata::samples`].
    pub sample: usize,
    /// Contig name.
    pub chrom: String,
    /// First covered position.
    pub start: u64,
    /// Last covered position.
    pub end: u64,
    /// Minimum read depth across the block.
    pub min_dp: Option<u32>,
    /// Genotype quality of the reference call.
    pub gq: Option<u32>,
}

impl RefBlock {
    /// Whether the block covers `pos` on `chrom`.
    pub fn covers(&self, chrom: &str, pos: u64) -> bool {
        self.chrom == chrom && self.start <= pos && pos <= self.end
    }
}

/// A genotype call in local-allele representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCall {
    /// Local genotype: indices into `la`. `None` is a no-call.
    pub lgt: Option<(usize, usize)>,
    /// Local-to-global allele mapping; `la[0]` is always 0 (the reference).
    pub la: Vec<usize>,
    /// Read depth.
    pub dp: Option<u32>,
    /// Genotype quality.
    pub gq: Option<u32>,
    /// Allele depths, aligned with `la`.
    pub ad: Option<Vec<u32>>,
}

/// One variant site across the cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSite {
    /// Contig name.
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate alleles (global allele indices 1..).
    pub alts: Vec<String>,
    /// One slot per sample, aligned with the dataset sample order.
    pub calls: Vec<Option<VariantCall>>,
}

/// In-memory variant dataset.
#[derive(Debug, Clone)]
pub struct VariantDataset {
    /// Root metadata.
    pub metadata: VdsMetadata,
    /// Reference-confirmed intervals, sorted by (sample, contig, start).
    pub blocks: Vec<RefBlock>,
    /// Variant sites, sorted by (contig, position, ref allele).
    pub sites: Vec<VariantSite>,
}

/// Sort key for contig names: chr1..chr22 numerically, then X, Y, M,
/// then anything else lexicographically. Accepts names with or without
/// the `chr` prefix.
pub fn contig_rank(chrom: &str) -> (u8, u32, String) {
    let name = chrom.strip_prefix("chr").unwrap_or(chrom);
    if let Ok(n) = name.parse::<u32>() {
        return (0, n, String::new());
    }
    match name {
        "X" => (1, 0, String::new()),
        "Y" => (2, 0, String::new()),
        "M" | "MT" => (3, 0, String::new()),
        other => (4, 0, other.to_string()),
    }
}

impl VariantDataset {
    /// Dataset with no samples, sites or blocks.
    pub fn empty(reference_genome: ReferenceGenome) -> Self {
        Self {
            metadata: VdsMetadata {
                format_version: FORMAT_VERSION,
                reference_genome,
                samples: Vec::new(),
            },
            blocks: Vec::new(),
            sites: Vec::new(),
        }
    }

    /// Number of samples.
    pub fn count_samples(&self) -> usize {
        self.metadata.samples.len()
    }

    /// Number of variant sites.
    pub fn count_sites(&self) -> usize {
        self.sites.len()
    }

    fn sort(&mut self) {
        self.sites.sort_by(|a, b| {
            (contig_rank(&a.chrom), a.pos, &a.ref_allele)
                .cmp(&(contig_rank(&b.chrom), b.pos, &b.ref_allele))
        });
        self.blocks.sort_by(|a, b| {
            (a.sample, contig_rank(&a.chrom), a.start)
                .cmp(&(b.sample, contig_rank(&b.chrom), b.start))
        });
    }

    /// Structural validation: unique samples, aligned call vectors,
    /// in-range local-allele mappings, well-formed blocks, sorted sites.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| GvkitError::DatasetFormat {
            path: std::path::PathBuf::new(),
            reason,
        };

        let mut seen = std::collections::HashSet::new();
        for sample in &self.metadata.samples {
            if !seen.insert(sample) {
                return Err(fail(format!("duplicate sample id '{sample}'")));
            }
        }

        for site in &self.sites {
            if site.calls.len() != self.metadata.samples.len() {
                return Err(fail(format!(
                    "site {}:{} has {} call slots for {} samples",
                    site.chrom,
                    site.pos,
                    site.calls.len(),
                    self.metadata.samples.len()
                )));
            }
            let n_alleles = 1 + site.alts.len();
            for call in site.calls.iter().flatten() {
                if call.la.first() != Some(&0) {
                    return Err(fail(format!(
                        "site {}:{} has a call whose local allele 0 is not the reference",
                        site.chrom, site.pos
                    )));
                }
                if call.la.iter().any(|&g| g >= n_alleles) {
                    return Err(fail(format!(
                        "site {}:{} has a local allele mapping outside {} alleles",
                        site.chrom, site.pos, n_alleles
                    )));
                }
                if let Some((a, b)) = call.lgt {
                    if a >= call.la.len() || b >= call.la.len() {
                        return Err(fail(format!(
                            "site {}:{} has LGT indices outside its LA mapping",
                            site.chrom, site.pos
                        )));
                    }
                }
            }
        }

        for window in self.sites.windows(2) {
            let a = (contig_rank(&window[0].chrom), window[0].pos);
            let b = (contig_rank(&window[1].chrom), window[1].pos);
            if a > b {
                return Err(fail(format!(
                    "sites out of order at {}:{}",
                    window[1].chrom, window[1].pos
                )));
            }
        }

        for block in &self.blocks {
            if block.start > block.end {
                return Err(fail(format!(
                    "reference block {}:{}-{} has start after end",
                    block.chrom, block.start, block.end
                )));
            }
            if block.sample >= self.metadata.samples.len() {
                return Err(fail(format!(
                    "reference block {}:{} names sample index {} of {}",
                    block.chrom,
                    block.start,
                    block.sample,
                    self.metadata.samples.len()
                )));
            }
        }

        Ok(())
    }
}

/// Union several datasets into one: sample sets must be disjoint, sites
/// are merged by (contig, position, ref allele) with alternate alleles
/// unified and local-allele mappings rewritten against the merged site.
pub fn union_datasets(datasets: &[VariantDataset]) -> Result<VariantDataset> {
    let Some(first) = datasets.first() else {
        return Err(GvkitError::IncompatibleInputs(
            "no datasets to combine".to_string(),
        ));
    };
    let reference_genome = first.metadata.reference_genome;
    if let Some(odd) = datasets
        .iter()
        .find(|d| d.metadata.reference_genome != reference_genome)
    {
        return Err(GvkitError::IncompatibleInputs(format!(
            "mixed reference genomes ({} and {})",
            reference_genome, odd.metadata.reference_genome
        )));
    }

    let mut merged = VariantDataset::empty(reference_genome);
    let mut sample_offsets = Vec::with_capacity(datasets.len());
    let mut seen = std::collections::HashSet::new();
    for dataset in datasets {
        sample_offsets.push(merged.metadata.samples.len());
        for sample in &dataset.metadata.samples {
            if !seen.insert(sample.clone()) {
                return Err(GvkitError::IncompatibleInputs(format!(
                    "sample '{sample}' appears in more than one input"
                )));
            }
            merged.metadata.samples.push(sample.clone());
        }
    }
    let total_samples = merged.metadata.samples.len();

    // (contig, pos, ref) -> index into merged.sites
    let mut site_index: std::collections::HashMap<(String, u64, String), usize> =
        std::collections::HashMap::new();

    for (dataset, &offset) in datasets.iter().zip(&sample_offsets) {
        for block in &dataset.blocks {
            let mut block = block.clone();
            block.sample += offset;
            merged.blocks.push(block);
        }

        for site in &dataset.sites {
            let key = (site.chrom.clone(), site.pos, site.ref_allele.clone());
            let target = match site_index.get(&key) {
                Some(&i) => i,
                None => {
                    merged.sites.push(VariantSite {
                        chrom: site.chrom.clone(),
                        pos: site.pos,
                        ref_allele: site.ref_allele.clone(),
                        alts: Vec::new(),
                        calls: vec![None; total_samples],
                    });
                    site_index.insert(key, merged.sites.len() - 1);
                    merged.sites.len() - 1
                }
            };

            // Map this dataset's global allele indices into the merged
            // allele list before rewriting each call's LA.
            let mut allele_map = Vec::with_capacity(1 + site.alts.len());
            allele_map.push(0);
            for alt in &site.alts {
                let merged_site = &mut merged.sites[target];
                let global = match merged_site.alts.iter().position(|a| a == alt) {
                    Some(i) => i + 1,
                    None => {
                        merged_site.alts.push(alt.clone());
                        merged_site.alts.len()
                    }
                };
                allele_map.push(global);
            }

            for (sample_idx, call) in site.calls.iter().enumerate() {
                if let Some(call) = call {
                    let mut rewritten = call.clone();
                    rewritten.la = call.la.iter().map(|&g| allele_map[g]).collect();
                    merged.sites[target].calls[offset + sample_idx] = Some(rewritten);
                }
            }
        }
    }

    merged.sort();
    debug!(
        samples = merged.count_samples(),
        sites = merged.count_sites(),
        "dataset union complete"
    );
    Ok(merged)
}

fn write_jsonl<T: Serialize>(dir: &Path, records: &[T]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut writer = BufWriter::new(File::create(dir.join("part-00000.jsonl"))?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    fs::write(dir.join(SUCCESS_MARKER), b"")?;
    Ok(())
}

fn read_jsonl<T: for<'de> Deserialize<'de>>(dir: &Path, dataset: &Path) -> Result<Vec<T>> {
    if !dir.join(SUCCESS_MARKER).is_file() {
        return Err(GvkitError::DatasetFormat {
            path: dataset.to_path_buf(),
            reason: format!(
                "missing {} marker under {}",
                SUCCESS_MARKER,
                dir.file_name().unwrap_or_default().to_string_lossy()
            ),
        });
    }
    let mut records = Vec::new();
    let mut shards: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    shards.sort();
    for shard in shards {
        let reader = BufReader::new(File::open(shard)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
    }
    Ok(records)
}

/// Replace `path` with a freshly written directory tree, honoring the
/// overwrite flag.
pub(crate) fn prepare_output_dir(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            return Err(GvkitError::OutputExists(path.to_path_buf()));
        }
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Write a variant dataset to `path`, stamping it with the session's
/// reference genome metadata.
pub fn write_vds(
    session: &Session,
    dataset: &VariantDataset,
    path: &Path,
    overwrite: bool,
) -> Result<()> {
    if dataset.metadata.reference_genome != session.reference_genome() {
        return Err(GvkitError::IncompatibleInputs(format!(
            "dataset was built for {}, session uses {}",
            dataset.metadata.reference_genome,
            session.reference_genome()
        )));
    }
    prepare_output_dir(path, overwrite)?;

    let metadata_file = File::create(path.join(METADATA_FILE))?;
    serde_json::to_writer_pretty(BufWriter::new(metadata_file), &dataset.metadata)?;
    write_jsonl(&path.join(REFERENCE_DATA_DIR), &dataset.blocks)?;
    write_jsonl(&path.join(VARIANT_DATA_DIR), &dataset.sites)?;
    info!(
        path = %path.display(),
        samples = dataset.count_samples(),
        sites = dataset.count_sites(),
        "wrote variant dataset"
    );
    Ok(())
}

/// Read a variant dataset from `path`. The dataset's reference genome
/// must match the session's.
pub fn read_vds(session: &Session, path: &Path) -> Result<VariantDataset> {
    crate::paths::check_directory(path)?;
    let metadata_path = path.join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(GvkitError::DatasetFormat {
            path: path.to_path_buf(),
            reason: format!("missing {METADATA_FILE}"),
        });
    }
    let metadata: VdsMetadata = serde_json::from_reader(BufReader::new(File::open(metadata_path)?))?;
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
                "dataset uses {}, session uses {}",
                metadata.reference_genome,
                session.reference_genome()
            ),
        });
    }

    let blocks = read_jsonl(&path.join(REFERENCE_DATA_DIR), path)?;
    let sites = read_jsonl(&path.join(VARIANT_DATA_DIR), path)?;
    debug!(path = %path.display(), "read variant dataset");
    Ok(VariantDataset {
        metadata,
        blocks,
        sites,
    })
}
