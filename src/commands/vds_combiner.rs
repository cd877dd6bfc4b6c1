//! `vds-combiner`: merge variant dataset directories into one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::commands::SessionArgs;
use crate::dataset::{read_vds, union_datasets, write_vds};
use crate::paths::{collect_dataset_dirs, VDS_EXTENSION};

/// Arguments of the `vds-combiner` subcommand.
#[derive(Debug, Args)]
pub struct VdsCombinerArgs {
    /// Container directory holding the .vds directories to combine.
    #[arg(short = 'd', long)]
    pub vds_dir: PathBuf,

    /// Output path for the combined variant dataset.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Validate the combined dataset before writing it.
    #[arg(long)]
    pub validate: bool,

    /// Overwrite the output if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Run the `vds-combiner` subcommand.
pub fn run(args: &VdsCombinerArgs) -> Result<()> {
    let session = args.session.open_session()?;

    let inputs = collect_dataset_dirs(&args.vds_dir, VDS_EXTENSION)
        .with_context(|| format!("scanning {}", args.vds_dir.display()))?;
    info!(count = inputs.len(), "found variant datasets to combine");

    let mut datasets = Vec::with_capacity(inputs.len());
    for path in &inputs {
        datasets.push(
            read_vds(&session, path)
                .with_context(|| format!("reading dataset {}", path.display()))?,
        );
    }

    let combined = union_datasets(&datasets).context("dataset combination failed")?;
    if args.validate {
        combined.validate().context("combined dataset failed validation")?;
        info!("combined dataset validated");
    }

    write_vds(&session, &combined, &args.output, args.overwrite)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        samples = combined.count_samples(),
        "successfully combined variant datasets"
    );
    Ok(())
}
