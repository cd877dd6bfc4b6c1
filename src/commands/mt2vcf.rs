//! `mt2vcf`: export a dense table as a multi-sample cohort VCF.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::commands::SessionArgs;
use crate::export::export_vcf;
use crate::paths::check_vcf_export_path;
use crate::table::qc::{filter_adj_entries, filter_min_ac, split_multi, variant_qc};
use crate::table::read_mt;

/// Arguments of the `mt2vcf` subcommand.
#[derive(Debug, Args)]
pub struct Mt2VcfArgs {
    /// Path to the input dense table.
    #[arg(short = 'm', long)]
    pub mt_path: PathBuf,

    /// Output VCF path; must end in .vcf.bgz.
    #[arg(short = 'v', long)]
    pub vcf_path: PathBuf,

    /// Filter entries to adjusted genotypes before aggregating.
    #[arg(long)]
    pub filter_adj_genotypes: bool,

    /// Minimum alternate allele count for a variant to be retained.
    /// A value of 0 disables the filter.
    #[arg(long, default_value_t = 1)]
    pub min_ac: u32,

    /// Split multi-allelic variants before exporting.
    #[arg(long)]
    pub split_multi: bool,

    /// Overwrite the output if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Run the `mt2vcf` subcommand.
pub fn run(args: &Mt2VcfArgs) -> Result<()> {
    check_vcf_export_path(&args.vcf_path)?;
    if args.vcf_path.exists() && !args.overwrite {
        anyhow::bail!(
            "output '{}' already exists (pass --overwrite to replace it)",
            args.vcf_path.display()
        );
    }
    let session = args.session.open_session()?;

    info!(path = %args.mt_path.display(), "reading dense table");
    let mut table = read_mt(&session, &args.mt_path)
        .with_context(|| format!("reading table {}", args.mt_path.display()))?;

    if args.filter_adj_genotypes {
        info!("filtering entries to adjusted genotypes");
        filter_adj_entries(&mut table).context("adjusted-genotype filtering failed")?;
    } else {
        info!("skipping adjusted-genotype filtering");
    }

    if !args.split_multi {
        info!("skipping multi-allelic splitting: option disabled");
    } else if table.metadata.was_split {
        info!("skipping multi-allelic splitting: already split");
    } else {
        info!("splitting multi-allelic variants");
        table = split_multi(table);
    }

    info!("computing variant QC aggregates");
    variant_qc(&mut table);
    filter_min_ac(&mut table, args.min_ac).context("minimum-AC filtering failed")?;

    export_vcf(&table, &args.vcf_path)
        .with_context(|| format!("exporting {}", args.vcf_path.display()))?;
    info!(
        output = %args.vcf_path.display(),
        rows = table.count_rows(),
        "cohort VCF successfully written"
    );
    Ok(())
}
