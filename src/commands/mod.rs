//! Command implementations behind the CLI
//!
//! Each submodule owns one subcommand: its argument struct (flattened
//! into the subcommand enum in `main.rs`) and a `run` function that
//! opens a session, validates inputs, sequences the engine calls and
//! logs each pipeline stage. Sessions are dropped (and the process-wide
//! slot released) on every exit path.

pub mod combine_gvcfs;
pub mod mt2vcf;
pub mod mts_combiner;
pub mod vds2mt;
pub mod vds_combiner;

use clap::Args;

use crate::error::Result;
use crate::session::{ReferenceGenome, Session, SessionConfig};

/// Session flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Number of CPUs to use for local computation.
    #[arg(long, default_value_t = 4)]
    pub n_cpus: usize,

    /// Memory allocation for the driver (e.g. 8g).
    #[arg(long, default_value = "8g")]
    pub driver_memory: String,

    /// Reference genome to pin the session to.
    #[arg(long, value_enum, default_value_t = ReferenceGenome::Grch38)]
    pub reference_genome: ReferenceGenome,
}

impl SessionArgs {
    /// Open a session with these flags.
    pub fn open_session(&self) -> Result<Session> {
        Session::open(SessionConfig {
            cores: self.n_cpus,
            driver_memory: self.driver_memory.clone(),
            reference_genome: self.reference_genome,
        })
    }
}
