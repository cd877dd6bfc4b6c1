//! Per-sample GVCF reader
//!
//! Reads one sample's gzipped GVCF text: the `#CHROM` header line names
//! the sample, `<NON_REF>`-only records with an `END` info key are
//! reference-confirmed blocks, everything else is a variant site (with a
//! trailing `<NON_REF>` alternate dropped). Only the genotype fields the
//! combiner needs are kept: GT, DP, GQ, AD and MIN_DP.
//!
//! Tabix index files are required next to each input but are validated
//! for presence only, never parsed.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::dataset::{RefBlock, VariantCall, VariantDataset, VariantSite};
use crate::error::{GvkitError, Result};
use crate::session::ReferenceGenome;

const NON_REF: &str = "<NON_REF>";

/// One reference-confirmed block of the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    /// Contig name.
    pub chrom: String,
    /// First covered position.
    pub start: u64,
    /// Last covered position (`END` info key, defaults to the start).
    pub end: u64,
    /// Minimum depth across the block (`MIN_DP`, falling back to `DP`).
    pub min_dp: Option<u32>,
    /// Genotype quality of the reference call.
    pub gq: Option<u32>,
}

/// One variant record of the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSite {
    /// Contig name.
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate alleles with the `<NON_REF>` placeholder removed.
    pub alts: Vec<String>,
    /// Genotype as indices into `[ref] + alts`; `None` is a no-call.
    pub gt: Option<(usize, usize)>,
    /// Read depth.
    pub dp: Option<u32>,
    /// Genotype quality.
    pub gq: Option<u32>,
    /// Allele depths aligned with `[ref] + alts`.
    pub ad: Option<Vec<u32>>,
}

/// Fully parsed single-sample GVCF.
#[derive(Debug, Clone)]
pub struct GvcfSample {
    /// Sample id from the `#CHROM` header line.
    pub sample: String,
    /// Reference-confirmed blocks in file order.
    pub blocks: Vec<SampleBlock>,
    /// Variant records in file order.
    pub sites: Vec<SampleSite>,
}

impl GvcfSample {
    /// Lift this sample into a single-sample variant dataset with
    /// identity local-allele mappings.
    pub fn into_dataset(self, reference_genome: ReferenceGenome) -> VariantDataset {
        let mut vds = VariantDataset::empty(reference_genome);
        vds.metadata.samples.push(self.sample);
        for block in self.blocks {
            vds.blocks.push(RefBlock {
                sample: 0,
                chrom: block.chrom,
                start: block.start,
                end: block.end,
                min_dp: block.min_dp,
                gq: block.gq,
            });
        }
        for site in self.sites {
            let la = (0..=site.alts.len()).collect();
            vds.sites.push(VariantSite {
                chrom: site.chrom,
                pos: site.pos,
                ref_allele: site.ref_allele,
                alts: site.alts,
                calls: vec![Some(VariantCall {
                    lgt: site.gt,
                    la,
                    dp: site.dp,
                    gq: site.gq,
                    ad: site.ad,
                })],
            });
        }
        vds
    }
}

fn format_err(path: &Path, reason: impl Into<String>) -> GvkitError {
    GvkitError::GvcfFormat {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read and parse a gzipped single-sample GVCF.
pub fn read_gvcf(path: &Path) -> Result<GvcfSample> {
    let file = File::open(path).map_err(|_| GvkitError::NotReadable(path.to_path_buf()))?;
    let reader = BufReader::new(MultiGzDecoder::new(file));

    let mut sample: Option<String> = None;
    let mut blocks = Vec::new();
    let mut sites = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|_| format_err(path, "input is not valid gzip-compressed text"))?;
        if line.starts_with("##") || line.trim().is_empty() {
            continue;
        }
        if line.starts_with("#CHROM") {
            let columns: Vec<&str> = line.split('\t').collect();
            match columns.len() {
                0..=9 => return Err(format_err(path, "header names no sample column")),
                10 => sample = Some(columns[9].to_string()),
                _ => {
                    return Err(format_err(
                        path,
                        format!("expected one sample column, found {}", columns.len() - 9),
                    ))
                }
            }
            continue;
        }

        if sample.is_none() {
            return Err(format_err(path, "record before #CHROM header"));
        }
        parse_record(path, line_no + 1, &line, &mut blocks, &mut sites)?;
    }

    let sample = sample.ok_or_else(|| format_err(path, "no #CHROM header line"))?;
    debug!(
        path = %path.display(),
        sample = %sample,
        blocks = blocks.len(),
        sites = sites.len(),
        "parsed GVCF"
    );
    Ok(GvcfSample {
        sample,
        blocks,
        sites,
    })
}

fn parse_record(
    path: &Path,
    line_no: usize,
    line: &str,
    blocks: &mut Vec<SampleBlock>,
    sites: &mut Vec<SampleSite>,
) -> Result<()> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 10 {
        return Err(format_err(
            path,
            format!("line {line_no}: expected 10 columns, found {}", fields.len()),
        ));
    }
    let chrom = fields[0].to_string();
    let pos: u64 = fields[1]
        .parse()
        .map_err(|_| format_err(path, format!("line {line_no}: bad position '{}'", fields[1])))?;
    let ref_allele = fields[3].to_string();
    let info = parse_info(fields[7]);
    let values = parse_sample_fields(fields[8], fields[9]);

    if fields[4] == NON_REF {
        let end = match info.get("END") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format_err(path, format!("line {line_no}: bad END '{raw}'")))?,
            None => pos,
        };
        if end < pos {
            return Err(format_err(
                path,
                format!("line {line_no}: END {end} before position {pos}"),
            ));
        }
        blocks.push(SampleBlock {
            chrom,
            start: pos,
            end,
            min_dp: parse_u32(values.get("MIN_DP")).or_else(|| parse_u32(values.get("DP"))),
            gq: parse_u32(values.get("GQ")),
        });
        return Ok(());
    }

    let alts: Vec<String> = fields[4]
        .split(',')
        .filter(|alt| *alt != NON_REF)
        .map(str::to_string)
        .collect();
    if alts.is_empty() {
        return Err(format_err(
            path,
            format!("line {line_no}: variant record with no alternate allele"),
        ));
    }

    let n_alleles = 1 + alts.len();
    // Genotypes pointing at the dropped <NON_REF> placeholder degrade to
    // a no-call rather than an index past the kept alleles.
    let gt = values
        .get("GT")
        .and_then(|raw| parse_gt(raw))
        .filter(|&(a, b)| a < n_alleles && b < n_alleles);
    let ad = values.get("AD").map(|raw| {
        raw.split(',')
            .take(n_alleles)
            .map(|v| v.parse().unwrap_or(0))
            .collect()
    });

    sites.push(SampleSite {
        chrom,
        pos,
        ref_allele,
        alts,
        gt,
        dp: parse_u32(values.get("DP")),
        gq: parse_u32(values.get("GQ")),
        ad,
    });
    Ok(())
}

fn parse_info(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|item| {
            let mut parts = item.splitn(2, '=');
            Some((parts.next()?.to_string(), parts.next().unwrap_or("").to_string()))
        })
        .collect()
}

fn parse_sample_fields<'a>(format: &'a str, sample: &'a str) -> HashMap<&'a str, &'a str> {
    format.split(':').zip(sample.split(':')).collect()
}

fn parse_u32(raw: Option<&&str>) -> Option<u32> {
    raw.and_then(|v| v.parse().ok())
}

fn parse_gt(raw: &str) -> Option<(usize, usize)> {
    let mut parts = raw.split(['/', '|']);
    let a = parts.next()?.parse().ok()?;
    // Haploid calls (male chrX/chrY) carry a single allele; represent
    // them as homozygous.
    match parts.next() {
        Some(b) => Some((a, b.parse().ok()?)),
        None => Some((a, a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const HEADER: &str = "##fileformat=VCFv4.2\n\
        ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA001\n";

    fn write_gvcf(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(HEADER.as_bytes()).unwrap();
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn parses_blocks_and_sites() {
        let dir = tempfile::tempdir().unwrap();
        let body = "chr1\t1\t.\tA\t<NON_REF>\t.\t.\tEND=999\tGT:DP:GQ:MIN_DP\t0/0:22:50:18\n\
            chr1\t1000\t.\tA\tT,<NON_REF>\t60\t.\t.\tGT:DP:GQ:AD\t0/1:30:55:14,16,0\n";
        let path = write_gvcf(dir.path(), "na001.g.vcf.gz", body);

        let parsed = read_gvcf(&path).unwrap();
        assert_eq!(parsed.sample, "NA001");
        assert_eq!(
            parsed.blocks,
            vec![SampleBlock {
                chrom: "chr1".to_string(),
                start: 1,
                end: 999,
                min_dp: Some(18),
                gq: Some(50),
            }]
        );
        assert_eq!(parsed.sites.len(), 1);
        let site = &parsed.sites[0];
        assert_eq!(site.alts, vec!["T"]);
        assert_eq!(site.gt, Some((0, 1)));
        // The <NON_REF> AD column is dropped with its allele.
        assert_eq!(site.ad, Some(vec![14, 16]));
    }

    #[test]
    fn non_ref_genotype_degrades_to_no_call() {
        let dir = tempfile::tempdir().unwrap();
        let body = "chr1\t500\t.\tC\tG,<NON_REF>\t10\t.\t.\tGT\t0/2\n";
        let path = write_gvcf(dir.path(), "na001.g.vcf.gz", body);

        let parsed = read_gvcf(&path).unwrap();
        assert_eq!(parsed.sites[0].gt, None);
    }

    #[test]
    fn haploid_genotype_reads_as_homozygous() {
        let dir = tempfile::tempdir().unwrap();
        let body = "chrX\t500\t.\tC\tG,<NON_REF>\t40\t.\t.\tGT:DP\t1:18\n";
        let path = write_gvcf(dir.path(), "na001.g.vcf.gz", body);

        let parsed = read_gvcf(&path).unwrap();
        assert_eq!(parsed.sites[0].gt, Some((1, 1)));
    }

    #[test]
    fn missing_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.g.vcf.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        encoder.finish().unwrap();

        let err = read_gvcf(&path).unwrap_err();
        assert!(matches!(err, GvkitError::GvcfFormat { .. }));
    }

    #[test]
    fn end_before_start_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = "chr1\t1000\t.\tA\t<NON_REF>\t.\t.\tEND=10\tGT\t0/0\n";
        let path = write_gvcf(dir.path(), "na001.g.vcf.gz", body);

        let err = read_gvcf(&path).unwrap_err();
        assert!(matches!(err, GvkitError::GvcfFormat { .. }));
    }

    #[test]
    fn sample_dataset_conversion_keeps_identity_local_alleles() {
        let dir = tempfile::tempdir().unwrap();
        let body = "chr1\t1000\t.\tA\tT,G,<NON_REF>\t60\t.\t.\tGT:DP\t1/2:25\n";
        let path = write_gvcf(dir.path(), "na001.g.vcf.gz", body);

        let vds = read_gvcf(&path)
            .unwrap()
            .into_dataset(ReferenceGenome::Grch38);
        assert_eq!(vds.metadata.samples, vec!["NA001"]);
        let call = vds.sites[0].calls[0].as_ref().unwrap();
        assert_eq!(call.la, vec![0, 1, 2]);
        assert_eq!(call.lgt, Some((1, 2)));
        assert!(vds.validate().is_ok());
    }
}
