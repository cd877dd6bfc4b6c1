//! # gvkit
//!
//! Command-line toolkit for building cohort-level variant resources from
//! per-sample GVCFs:
//!
//! 1. **Combine** per-sample GVCFs into a combined variant dataset (a
//!    `.vds` directory with reference-interval and variant-call
//!    substructures), optionally merging in pre-existing datasets.
//! 2. **Merge** variant datasets, or dense tables along rows/columns.
//! 3. **Convert** a variant dataset into a dense samples-by-variants
//!    table (`.mt`), with adjusted-genotype annotation and multi-allelic
//!    splitting.
//! 4. **Export** a dense table as a compressed multi-sample VCF.
//!
//! Engine work happens under an explicit [`session::Session`] handle
//! (one per process, released on drop), and every input path is
//! validated for existence, readability, suffix and paired index before
//! any engine call starts.

#![warn(missing_docs, missing_debug_implementations)]

pub mod archive;    // Zip helper for dataset directories
pub mod commands;   // CLI subcommand implementations
pub mod dataset;    // Variant dataset model, GVCF reader, combiner
pub mod error;      // Error taxonomy
pub mod export;     // Cohort VCF export
pub mod paths;      // Path and extension validation
pub mod session;    // Scoped engine session
pub mod table;      // Dense table model, unions, reordering, QC

// Re-exports for convenience
pub use error::{GvkitError, Result};
pub use session::{ReferenceGenome, Session, SessionConfig};
