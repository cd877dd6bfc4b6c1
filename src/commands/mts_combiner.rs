//! `mts-combiner`: combine dense table directories along rows or columns.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use crate::commands::SessionArgs;
use crate::paths::{collect_dataset_dirs, MT_EXTENSION};
use crate::table::reorder::reorder_columns;
use crate::table::union::{union_cols, union_rows};
use crate::table::{read_mt, write_mt};

/// Axis along which tables are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CombineBy {
    /// Stack rows; inputs must share the same column-key set.
    Rows,
    /// Join columns; inputs must share identical row keys.
    Cols,
}

/// Arguments of the `mts-combiner` subcommand.
#[derive(Debug, Args)]
pub struct MtsCombinerArgs {
    /// Container directory holding the .mt directories to combine.
    #[arg(short = 'i', long)]
    pub mts_dir: PathBuf,

    /// Output path for the combined dense table.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// The axis to combine the tables on.
    #[arg(short = 'c', long, value_enum)]
    pub combine_by: CombineBy,

    /// Number of partitions to use when writing the combined table.
    #[arg(short = 'p', long)]
    pub n_partitions: Option<usize>,

    /// Overwrite the output if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Run the `mts-combiner` subcommand.
pub fn run(args: &MtsCombinerArgs) -> Result<()> {
    let session = args.session.open_session()?;

    let inputs = collect_dataset_dirs(&args.mts_dir, MT_EXTENSION)
        .with_context(|| format!("scanning {}", args.mts_dir.display()))?;
    info!(count = inputs.len(), "found dense tables to combine");

    let mut tables = Vec::with_capacity(inputs.len());
    for path in &inputs {
        tables.push(
            read_mt(&session, path)
                .with_context(|| format!("reading table {}", path.display()))?,
        );
    }

    let mut combined = match args.combine_by {
        CombineBy::Rows => {
            // Inputs may list the same samples in different orders;
            // align them against the first table before stacking.
            let aligned = reorder_columns(tables, 0).context("aligning column orders failed")?;
            union_rows(&aligned).context("row combination failed")?
        }
        CombineBy::Cols => union_cols(&tables).context("column combination failed")?,
    };
    if let Some(n_partitions) = args.n_partitions {
        combined.repartition(n_partitions);
    }

    write_mt(&session, &combined, &args.output, args.overwrite)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        rows = combined.count_rows(),
        cols = combined.count_cols(),
        "successfully combined dense tables"
    );
    Ok(())
}
