//! Error taxonomy for the crate
//!
//! Three families, mirroring how failures surface at the CLI boundary:
//! input-validation errors (rejected before any engine work starts),
//! configuration errors, and engine/dataset errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by validation, configuration and engine operations.
#[derive(Error, Debug)]
pub enum GvkitError {
    /// Path does not exist.
    #[error("file '{0}' not found")]
    NotFound(PathBuf),

    /// Path exists but is not a regular file.
    #[error("path '{0}' is not a file")]
    NotAFile(PathBuf),

    /// Path exists but cannot be opened for reading.
    #[error("file '{0}' is not readable")]
    NotReadable(PathBuf),

    /// Path is not a directory where one was required.
    #[error("'{0}' is not a valid directory")]
    NotADirectory(PathBuf),

    /// File does not carry the expected suffix.
    #[error("file '{path}' does not end with '{expected}'")]
    WrongExtension {
        /// Offending path.
        path: PathBuf,
        /// Suffix that was required.
        expected: &'static str,
    },

    /// A per-sample input file has no readable paired index file.
    #[error("index file '{0}' is missing or unreadable")]
    MissingIndex(PathBuf),

    /// A directory scan or manifest produced no usable inputs.
    #[error("no inputs ending in '{extension}' found under '{dir}'")]
    EmptyInput {
        /// Directory or manifest that was scanned.
        dir: PathBuf,
        /// Suffix that was searched for.
        extension: &'static str,
    },

    /// Core count below the minimum of one.
    #[error("core count must be at least 1 (got {0})")]
    InvalidCores(usize),

    /// Driver memory spec that does not parse as `<number><k|m|g>`.
    #[error("invalid driver memory spec '{0}' (expected e.g. '8g')")]
    InvalidMemory(String),

    /// A second session opened while one is still live.
    #[error("an engine session is already active in this process")]
    SessionActive,

    /// Reference index outside the input sequence in the reorder helper.
    #[error("reference index {index} is out of range for {len} tables")]
    ReferenceIndexOutOfRange {
        /// Requested reference position.
        index: usize,
        /// Number of tables supplied.
        len: usize,
    },

    /// A non-reference table whose column keys differ from the reference.
    #[error("column keys of table {index} do not match the reference table")]
    ColumnKeyMismatch {
        /// Position of the offending table in the input sequence.
        index: usize,
    },

    /// Datasets or tables handed to a combine step that cannot be joined.
    #[error("cannot combine inputs: {0}")]
    IncompatibleInputs(String),

    /// On-disk dataset that violates its format contract.
    #[error("dataset '{path}': {reason}")]
    DatasetFormat {
        /// Dataset directory.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Malformed per-sample GVCF input.
    #[error("GVCF '{path}': {reason}")]
    GvcfFormat {
        /// Offending input file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Output already present and overwrite not requested.
    #[error("output '{0}' already exists (pass --overwrite to replace it)")]
    OutputExists(PathBuf),

    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Metadata, row shard or plan (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Archive read/write failure.
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GvkitError>;
