//! GVCF combiner
//!
//! Turns a validated manifest of per-sample GVCFs (plus optional
//! pre-existing variant datasets to merge in) into one combined variant
//! dataset. The plan (inputs, output, temp directory, reference genome)
//! can be saved as JSON before the run starts; a scheduler wrapping this
//! tool can re-submit the same plan after an interruption.
//!
//! The output is staged under the temp directory and moved into place
//! only once fully written, so a crashed run never leaves a half-written
//! dataset at the output path.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{self, gvcf, union_datasets, VariantDataset};
use crate::error::{GvkitError, Result};
use crate::session::{ReferenceGenome, Session};

/// Everything a combine run needs, in serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinerPlan {
    /// Validated per-sample GVCF paths.
    pub gvcf_paths: Vec<PathBuf>,
    /// Pre-existing variant datasets to merge into the result.
    pub vds_inputs: Vec<PathBuf>,
    /// Where the combined dataset will be written.
    pub output_path: PathBuf,
    /// Working directory for staging the output.
    pub temp_path: PathBuf,
    /// Reference genome the run is pinned to.
    pub reference_genome: ReferenceGenome,
}

impl CombinerPlan {
    /// Serialize the plan to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        info!(path = %path.display(), "saved combiner plan");
        Ok(())
    }

    /// Load a previously saved plan.
    pub fn load(path: &Path) -> Result<CombinerPlan> {
        crate::paths::check_file_readable(path)?;
        Ok(serde_json::from_reader(File::open(path)?)?)
    }
}

/// Run the combine described by `plan` and write the result to the plan's
/// output path.
pub fn run_combine(session: &Session, plan: &CombinerPlan, overwrite: bool) -> Result<()> {
    if plan.reference_genome != session.reference_genome() {
        return Err(GvkitError::IncompatibleInputs(format!(
            "plan is pinned to {}, session uses {}",
            plan.reference_genome,
            session.reference_genome()
        )));
    }
    if plan.gvcf_paths.is_empty() && plan.vds_inputs.is_empty() {
        return Err(GvkitError::IncompatibleInputs(
            "plan names no GVCFs and no datasets".to_string(),
        ));
    }
    if plan.output_path.exists() && !overwrite {
        return Err(GvkitError::OutputExists(plan.output_path.clone()));
    }
    fs::create_dir_all(&plan.temp_path)?;

    let mut inputs: Vec<VariantDataset> = Vec::new();
    for path in &plan.gvcf_paths {
        let parsed = gvcf::read_gvcf(path)?;
        info!(path = %path.display(), sample = %parsed.sample, "read GVCF");
        inputs.push(parsed.into_dataset(session.reference_genome()));
    }
    for path in &plan.vds_inputs {
        let vds = dataset::read_vds(session, path)?;
        info!(path = %path.display(), samples = vds.count_samples(), "read merge-in dataset");
        inputs.push(vds);
    }

    let combined = union_datasets(&inputs)?;
    combined.validate()?;
    info!(
        samples = combined.count_samples(),
        sites = combined.count_sites(),
        "combine complete"
    );

    stage_and_publish(session, &combined, plan, overwrite)
}

fn stage_and_publish(
    session: &Session,
    combined: &VariantDataset,
    plan: &CombinerPlan,
    overwrite: bool,
) -> Result<()> {
    let staging = staging_dir(&plan.temp_path, &plan.output_path);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    dataset::write_vds(session, combined, &staging, true)?;

    if plan.output_path.exists() {
        if !overwrite {
            return Err(GvkitError::OutputExists(plan.output_path.clone()));
        }
        fs::remove_dir_all(&plan.output_path)?;
    }
    if let Some(parent) = plan.output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Rename fails across filesystems; fall back to a recursive copy.
    if fs::rename(&staging, &plan.output_path).is_err() {
        copy_tree(&staging, &plan.output_path)?;
        fs::remove_dir_all(&staging)?;
    }
    info!(path = %plan.output_path.display(), "published combined dataset");
    Ok(())
}

fn staging_dir(temp_path: &Path, output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "combined.vds".to_string());
    temp_path.join(format!(".staging-{name}"))
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?.path();
        let dest = target.join(entry.file_name().unwrap_or_default());
        if entry.is_dir() {
            copy_tree(&entry, &dest)?;
        } else {
            fs::copy(&entry, &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{REFERENCE_DATA_DIR, SUCCESS_MARKER, VARIANT_DATA_DIR};
    use crate::session::SessionConfig;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gvcf(dir: &Path, sample: &str, pos: u64, alt: &str) -> PathBuf {
        let header = format!(
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{sample}\n"
        );
        let body = format!(
            "chr1\t1\t.\tA\t<NON_REF>\t.\t.\tEND={}\tGT:DP:GQ:MIN_DP\t0/0:25:50:20\n\
             chr1\t{pos}\t.\tA\t{alt},<NON_REF>\t60\t.\t.\tGT:DP:GQ:AD\t0/1:30:55:14,16,0\n",
            pos - 1
        );
        let path = dir.join(format!("{sample}.g.vcf.gz"));
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(header.as_bytes()).unwrap();
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    #[test]
    fn combines_gvcfs_and_publishes_markers() {
        let _guard = crate::session::lock_for_tests();
        let session = Session::open(SessionConfig::default()).unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let gvcfs = vec![
            write_gvcf(scratch.path(), "s1", 1000, "T"),
            write_gvcf(scratch.path(), "s2", 1000, "G"),
            write_gvcf(scratch.path(), "s3", 2000, "C"),
        ];

        let output = scratch.path().join("cohort.vds");
        let plan = CombinerPlan {
            gvcf_paths: gvcfs,
            vds_inputs: Vec::new(),
            output_path: output.clone(),
            temp_path: scratch.path().join("tmp"),
            reference_genome: ReferenceGenome::Grch38,
        };
        run_combine(&session, &plan, false).unwrap();

        assert!(output.join(REFERENCE_DATA_DIR).join(SUCCESS_MARKER).is_file());
        assert!(output.join(VARIANT_DATA_DIR).join(SUCCESS_MARKER).is_file());

        let combined = dataset::read_vds(&session, &output).unwrap();
        assert_eq!(combined.metadata.samples, vec!["s1", "s2", "s3"]);
        assert_eq!(combined.count_sites(), 2);
    }

    #[test]
    fn merges_existing_dataset_inputs() {
        let _guard = crate::session::lock_for_tests();
        let session = Session::open(SessionConfig::default()).unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let first_out = scratch.path().join("first.vds");
        let plan = CombinerPlan {
            gvcf_paths: vec![write_gvcf(scratch.path(), "s1", 1000, "T")],
            vds_inputs: Vec::new(),
            output_path: first_out.clone(),
            temp_path: scratch.path().join("tmp"),
            reference_genome: ReferenceGenome::Grch38,
        };
        run_combine(&session, &plan, false).unwrap();

        let second_out = scratch.path().join("second.vds");
        let plan = CombinerPlan {
            gvcf_paths: vec![write_gvcf(scratch.path(), "s2", 1500, "G")],
            vds_inputs: vec![first_out],
            output_path: second_out.clone(),
            temp_path: scratch.path().join("tmp"),
            reference_genome: ReferenceGenome::Grch38,
        };
        run_combine(&session, &plan, false).unwrap();

        let combined = dataset::read_vds(&session, &second_out).unwrap();
        assert_eq!(combined.count_samples(), 2);
        assert_eq!(combined.count_sites(), 2);
    }

    #[test]
    fn plan_round_trips_through_json() {
        let scratch = tempfile::tempdir().unwrap();
        let plan = CombinerPlan {
            gvcf_paths: vec![PathBuf::from("/data/s1.g.vcf.gz")],
            vds_inputs: Vec::new(),
            output_path: PathBuf::from("/data/cohort.vds"),
            temp_path: PathBuf::from("/tmp/work"),
            reference_genome: ReferenceGenome::Grch38,
        };
        let path = scratch.path().join("plan.json");
        plan.save(&path).unwrap();

        let loaded = CombinerPlan::load(&path).unwrap();
        assert_eq!(loaded.gvcf_paths, plan.gvcf_paths);
        assert_eq!(loaded.output_path, plan.output_path);
        assert_eq!(loaded.reference_genome, ReferenceGenome::Grch38);
    }

    #[test]
    fn refuses_existing_output_without_overwrite() {
        let _guard = crate::session::lock_for_tests();
        let session = Session::open(SessionConfig::default()).unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let output = scratch.path().join("cohort.vds");
        fs::create_dir_all(&output).unwrap();

        let plan = CombinerPlan {
            gvcf_paths: vec![write_gvcf(scratch.path(), "s1", 1000, "T")],
            vds_inputs: Vec::new(),
            output_path: output,
            temp_path: scratch.path().join("tmp"),
            reference_genome: ReferenceGenome::Grch38,
        };
        let err = run_combine(&session, &plan, false).unwrap_err();
        assert!(matches!(err, GvkitError::OutputExists(_)));
    }
}
