//! `combine-gvcfs`: combine per-sample GVCFs into a variant dataset.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::commands::SessionArgs;
use crate::dataset::combiner::{run_combine, CombinerPlan};
use crate::paths::{collect_gvcf_paths, read_gvcf_manifest};

/// Arguments of the `combine-gvcfs` subcommand.
#[derive(Debug, Args)]
pub struct CombineGvcfsArgs {
    /// Directory containing GVCF files and their .tbi index files.
    #[arg(short = 'd', long, required_unless_present = "gvcf_manifest", conflicts_with = "gvcf_manifest")]
    pub gvcf_dir: Option<PathBuf>,

    /// Manifest file listing one GVCF path per line.
    #[arg(short = 'm', long)]
    pub gvcf_manifest: Option<PathBuf>,

    /// Output path for the combined variant dataset.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Temporary directory with enough space to stage the output.
    #[arg(short = 't', long)]
    pub tmp_path: PathBuf,

    /// Pre-existing variant datasets to merge into the result.
    #[arg(long = "vds", value_name = "VDS")]
    pub vds_inputs: Vec<PathBuf>,

    /// Save the combiner plan as JSON before running.
    #[arg(long)]
    pub plan_path: Option<PathBuf>,

    /// Overwrite the output if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Run the `combine-gvcfs` subcommand.
pub fn run(args: &CombineGvcfsArgs) -> Result<()> {
    let session = args.session.open_session()?;

    let gvcf_paths = match (&args.gvcf_dir, &args.gvcf_manifest) {
        (Some(dir), None) => collect_gvcf_paths(dir)
            .with_context(|| format!("validating GVCF directory {}", dir.display()))?,
        (None, Some(manifest)) => read_gvcf_manifest(manifest)
            .with_context(|| format!("validating GVCF manifest {}", manifest.display()))?,
        // clap enforces exactly one of the two.
        _ => unreachable!("clap requires exactly one of --gvcf-dir / --gvcf-manifest"),
    };
    info!(count = gvcf_paths.len(), "validated GVCF paths");

    let plan = CombinerPlan {
        gvcf_paths,
        vds_inputs: args.vds_inputs.clone(),
        output_path: args.output.clone(),
        temp_path: args.tmp_path.clone(),
        reference_genome: session.reference_genome(),
    };
    if let Some(plan_path) = &args.plan_path {
        plan.save(plan_path)
            .with_context(|| format!("saving combiner plan to {}", plan_path.display()))?;
    }

    info!(output = %args.output.display(), "starting GVCF combination");
    run_combine(&session, &plan, args.overwrite).context("GVCF combination failed")?;
    info!(output = %args.output.display(), "successfully combined GVCFs");
    Ok(())
}
