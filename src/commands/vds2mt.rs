//! `vds2mt`: materialize a variant dataset as a dense table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::commands::SessionArgs;
use crate::dataset::read_vds;
use crate::table::densify::vds_to_dense;
use crate::table::qc::{annotate_adj, split_multi};
use crate::table::write_mt;

/// Arguments of the `vds2mt` subcommand.
#[derive(Debug, Args)]
pub struct Vds2MtArgs {
    /// Path to the input variant dataset.
    #[arg(short = 'v', long)]
    pub vds_path: PathBuf,

    /// Output path for the dense table.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Skip splitting multi-allelic variants.
    #[arg(long)]
    pub skip_split_multi: bool,

    /// Skip annotating entries with adjusted genotypes.
    #[arg(long)]
    pub skip_adjust_genotypes: bool,

    /// Skip keying the table columns by sample id.
    #[arg(long)]
    pub skip_key_by_cols: bool,

    /// Overwrite the output if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Run the `vds2mt` subcommand.
pub fn run(args: &Vds2MtArgs) -> Result<()> {
    let session = args.session.open_session()?;

    info!(path = %args.vds_path.display(), "reading variant dataset");
    let dataset = read_vds(&session, &args.vds_path)
        .with_context(|| format!("reading dataset {}", args.vds_path.display()))?;

    info!("converting to dense table");
    let mut table = vds_to_dense(&dataset).context("densification failed")?;

    if args.skip_adjust_genotypes {
        info!("skipping adjusted-genotype annotation");
    } else {
        info!("annotating adjusted genotypes");
        annotate_adj(&mut table);
    }

    if args.skip_split_multi {
        info!("skipping multi-allelic splitting");
    } else {
        info!("splitting multi-allelic variants");
        table = split_multi(table);
    }

    if args.skip_key_by_cols {
        info!("skipping column keying");
    } else {
        info!("keying columns by sample id");
        table.key_cols_by_sample().context("column keying failed")?;
    }

    write_mt(&session, &table, &args.output, args.overwrite)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        rows = table.count_rows(),
        cols = table.count_cols(),
        "dense table successfully written"
    );
    Ok(())
}
