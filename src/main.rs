use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use gvkit::commands::{combine_gvcfs, mt2vcf, mts_combiner, vds2mt, vds_combiner};

#[derive(Parser, Debug)]
#[command(
    name = "gvkit",
    version,
    about = "Combine per-sample GVCFs into variant datasets, merge dense tables, and export cohort VCFs"
)]
struct Cli {
    /// Logging verbosity (e.g. error, warn, info, debug).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Combine per-sample GVCFs into a combined variant dataset.
    CombineGvcfs(combine_gvcfs::CombineGvcfsArgs),
    /// Combine variant dataset directories into a single dataset.
    VdsCombiner(vds_combiner::VdsCombinerArgs),
    /// Combine dense table directories along rows or columns.
    MtsCombiner(mts_combiner::MtsCombinerArgs),
    /// Convert a variant dataset into a dense table.
    Vds2mt(vds2mt::Vds2MtArgs),
    /// Export a dense table as a multi-sample cohort VCF.
    Mt2vcf(mt2vcf::Mt2VcfArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match &cli.command {
        Commands::CombineGvcfs(args) => combine_gvcfs::run(args),
        Commands::VdsCombiner(args) => vds_combiner::run(args),
        Commands::MtsCombiner(args) => mts_combiner::run(args),
        Commands::Vds2mt(args) => vds2mt::run(args),
        Commands::Mt2vcf(args) => mt2vcf::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
