//! End-to-end pipeline tests driving the command layer the way the CLI
//! does: combine GVCFs into a variant dataset, densify it, and export a
//! cohort VCF, plus the dense-table combiner paths.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use flate2::write::GzEncoder;
use flate2::Compression;

use gvkit::archive::{compress_dir, decompress_archive};
use gvkit::commands::combine_gvcfs::{self, CombineGvcfsArgs};
use gvkit::commands::mt2vcf::{self, Mt2VcfArgs};
use gvkit::commands::mts_combiner::{self, CombineBy, MtsCombinerArgs};
use gvkit::commands::vds2mt::{self, Vds2MtArgs};
use gvkit::commands::vds_combiner::{self, VdsCombinerArgs};
use gvkit::commands::SessionArgs;
use gvkit::dataset::{read_vds, REFERENCE_DATA_DIR, SUCCESS_MARKER, VARIANT_DATA_DIR};
use gvkit::table::read_mt;
use gvkit::{ReferenceGenome, Session, SessionConfig};

/// One engine session per process: serialize tests that open one.
fn session_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn session_args() -> SessionArgs {
    SessionArgs {
        n_cpus: 4,
        driver_memory: "8g".to_string(),
        reference_genome: ReferenceGenome::Grch38,
    }
}

/// Write a gzipped single-sample GVCF plus an (empty) tabix index next
/// to it: one reference block followed by two variant records.
fn write_gvcf_fixture(dir: &Path, sample: &str, alt: &str) -> PathBuf {
    let header = format!(
        "##fileformat=VCFv4.2\n\
         ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{sample}\n"
    );
    let body = format!(
        "chr1\t1\t.\tA\t<NON_REF>\t.\t.\tEND=9999\tGT:DP:GQ:MIN_DP\t0/0:28:60:22\n\
         chr1\t1000\t.\tA\t{alt},<NON_REF>\t60\t.\t.\tGT:DP:GQ:AD\t0/1:30:55:14,16,0\n\
         chr1\t2000\t.\tC\tCT,G,<NON_REF>\t45\t.\t.\tGT:DP:GQ:AD\t1/2:26:48:0,12,14,0\n"
    );

    let path = dir.join(format!("{sample}.g.vcf.gz"));
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(header.as_bytes()).unwrap();
    encoder.write_all(body.as_bytes()).unwrap();
    encoder.finish().unwrap();

    File::create(dir.join(format!("{sample}.g.vcf.gz.tbi"))).unwrap();
    path
}

#[test]
fn combine_three_gvcfs_then_densify_then_export() {
    let _guard = session_lock();
    let scratch = tempfile::tempdir().unwrap();
    let gvcf_dir = scratch.path().join("gvcfs");
    std::fs::create_dir(&gvcf_dir).unwrap();
    for (sample, alt) in [("s1", "T"), ("s2", "G"), ("s3", "T")] {
        write_gvcf_fixture(&gvcf_dir, sample, alt);
    }

    // Combine the three samples into a variant dataset.
    let vds_path = scratch.path().join("cohort.vds");
    let plan_path = scratch.path().join("tmp/combiner_plan.json");
    combine_gvcfs::run(&CombineGvcfsArgs {
        gvcf_dir: Some(gvcf_dir.clone()),
        gvcf_manifest: None,
        output: vds_path.clone(),
        tmp_path: scratch.path().join("tmp"),
        vds_inputs: Vec::new(),
        plan_path: Some(plan_path.clone()),
        overwrite: false,
        session: session_args(),
    })
    .unwrap();

    assert!(vds_path.join(REFERENCE_DATA_DIR).join(SUCCESS_MARKER).is_file());
    assert!(vds_path.join(VARIANT_DATA_DIR).join(SUCCESS_MARKER).is_file());
    assert!(plan_path.is_file());

    {
        let session = Session::open(SessionConfig::default()).unwrap();
        let vds = read_vds(&session, &vds_path).unwrap();
        assert_eq!(vds.metadata.samples, vec!["s1", "s2", "s3"]);
        assert_eq!(vds.count_sites(), 2);
    }

    // Densify with adjusted genotypes and splitting enabled.
    let mt_path = scratch.path().join("cohort.mt");
    vds2mt::run(&Vds2MtArgs {
        vds_path: vds_path.clone(),
        output: mt_path.clone(),
        skip_split_multi: false,
        skip_adjust_genotypes: false,
        skip_key_by_cols: false,
        overwrite: false,
        session: session_args(),
    })
    .unwrap();

    assert!(mt_path.join(SUCCESS_MARKER).is_file());
    {
        let session = Session::open(SessionConfig::default()).unwrap();
        let table = read_mt(&session, &mt_path).unwrap();
        assert!(table.metadata.was_split);
        assert!(table.metadata.adjusted);
        assert_eq!(table.count_cols(), 3);
        // Both sites carry two alternates after the union (chr1:1000
        // collects T and G across samples), so splitting doubles them.
        assert_eq!(table.count_rows(), 4);
    }

    // Export with a minimum allele count of 1.
    let vcf_path = scratch.path().join("cohort.vcf.bgz");
    mt2vcf::run(&Mt2VcfArgs {
        mt_path: mt_path.clone(),
        vcf_path: vcf_path.clone(),
        filter_adj_genotypes: true,
        min_ac: 1,
        split_multi: true,
        overwrite: false,
        session: session_args(),
    })
    .unwrap();

    assert!(vcf_path.is_file());
    assert!(vcf_path.metadata().unwrap().len() > 0);
}

#[test]
fn vds_combiner_merges_dataset_directories() {
    let _guard = session_lock();
    let scratch = tempfile::tempdir().unwrap();

    // Two single-sample datasets under one container directory.
    let container = scratch.path().join("vdses");
    std::fs::create_dir(&container).unwrap();
    for sample in ["a", "b"] {
        let gvcf_dir = scratch.path().join(format!("gvcfs-{sample}"));
        std::fs::create_dir(&gvcf_dir).unwrap();
        write_gvcf_fixture(&gvcf_dir, sample, "T");
        combine_gvcfs::run(&CombineGvcfsArgs {
            gvcf_dir: Some(gvcf_dir),
            gvcf_manifest: None,
            output: container.join(format!("{sample}.vds")),
            tmp_path: scratch.path().join("tmp"),
            vds_inputs: Vec::new(),
            plan_path: None,
            overwrite: false,
            session: session_args(),
        })
        .unwrap();
    }

    let output = scratch.path().join("merged.vds");
    vds_combiner::run(&VdsCombinerArgs {
        vds_dir: container,
        output: output.clone(),
        validate: true,
        overwrite: false,
        session: session_args(),
    })
    .unwrap();

    let session = Session::open(SessionConfig::default()).unwrap();
    let merged = read_vds(&session, &output).unwrap();
    assert_eq!(merged.metadata.samples, vec!["a", "b"]);
}

#[test]
fn mts_combiner_stacks_rows_and_joins_cols() {
    let _guard = session_lock();
    let scratch = tempfile::tempdir().unwrap();

    // Build two dense tables from disjoint cohorts via the full pipeline.
    let container = scratch.path().join("mts");
    std::fs::create_dir(&container).unwrap();
    let mut row_counts = Vec::new();
    for (tag, samples) in [("x", ["x1", "x2"]), ("y", ["y1", "y2"])] {
        let gvcf_dir = scratch.path().join(format!("gvcfs-{tag}"));
        std::fs::create_dir(&gvcf_dir).unwrap();
        for sample in samples {
            write_gvcf_fixture(&gvcf_dir, sample, "T");
        }
        let vds_path = scratch.path().join(format!("{tag}.vds"));
        combine_gvcfs::run(&CombineGvcfsArgs {
            gvcf_dir: Some(gvcf_dir),
            gvcf_manifest: None,
            output: vds_path.clone(),
            tmp_path: scratch.path().join("tmp"),
            vds_inputs: Vec::new(),
            plan_path: None,
            overwrite: false,
            session: session_args(),
        })
        .unwrap();
        vds2mt::run(&Vds2MtArgs {
            vds_path,
            output: container.join(format!("{tag}.mt")),
            skip_split_multi: false,
            skip_adjust_genotypes: true,
            skip_key_by_cols: false,
            overwrite: false,
            session: session_args(),
        })
        .unwrap();

        let session = Session::open(SessionConfig::default()).unwrap();
        let table = read_mt(&session, &container.join(format!("{tag}.mt"))).unwrap();
        row_counts.push(table.count_rows());
    }

    // The two cohorts have disjoint samples, so joining along columns
    // widens the table.
    let cols_out = scratch.path().join("joined.mt");
    mts_combiner::run(&MtsCombinerArgs {
        mts_dir: container.clone(),
        output: cols_out.clone(),
        combine_by: CombineBy::Cols,
        n_partitions: Some(2),
        overwrite: false,
        session: session_args(),
    })
    .unwrap();
    {
        let session = Session::open(SessionConfig::default()).unwrap();
        let joined = read_mt(&session, &cols_out).unwrap();
        assert_eq!(joined.count_cols(), 4);
        assert_eq!(joined.count_rows(), row_counts[0]);
    }

    // Rows: stack two copies of the same cohort.
    let rows_container = scratch.path().join("mts-rows");
    std::fs::create_dir(&rows_container).unwrap();
    for copy in ["one", "two"] {
        decompress_then_copy(&container.join("x.mt"), &rows_container.join(format!("{copy}.mt")));
    }
    let rows_out = scratch.path().join("stacked.mt");
    mts_combiner::run(&MtsCombinerArgs {
        mts_dir: rows_container,
        output: rows_out.clone(),
        combine_by: CombineBy::Rows,
        n_partitions: None,
        overwrite: false,
        session: session_args(),
    })
    .unwrap();

    let session = Session::open(SessionConfig::default()).unwrap();
    let stacked = read_mt(&session, &rows_out).unwrap();
    assert_eq!(stacked.count_rows(), 2 * row_counts[0]);
    assert_eq!(stacked.count_cols(), 2);
}

/// Copy a table directory by zipping and unzipping it.
fn decompress_then_copy(source: &Path, target: &Path) {
    let archive = source.with_extension("mt.zip");
    compress_dir(source, &archive, false).unwrap();
    decompress_archive(&archive, target, true).unwrap();
}
