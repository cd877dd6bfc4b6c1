//! Path and extension validation
//!
//! Every path handed to the engine goes through here first: existence,
//! readability and suffix checks, plus the paired-index requirement for
//! per-sample GVCF inputs. Validation never transforms data; it only
//! produces manifests of absolute paths that are safe to stream into the
//! engine.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{GvkitError, Result};

/// Suffix carried by per-sample GVCF input files.
pub const GVCF_EXTENSION: &str = ".g.vcf.gz";
/// Suffix of the paired tabix index that must sit next to each GVCF.
pub const GVCF_INDEX_EXTENSION: &str = ".g.vcf.gz.tbi";
/// Suffix of compressed single-sample or cohort VCF files.
pub const VCF_EXTENSION: &str = ".vcf.gz";
/// Suffix carried by variant dataset directories.
pub const VDS_EXTENSION: &str = ".vds";
/// Suffix carried by dense table directories.
pub const MT_EXTENSION: &str = ".mt";
/// Suffix required of cohort VCF export paths.
pub const VCF_EXPORT_EXTENSION: &str = ".vcf.bgz";

/// Check that `path` exists, is a regular file, and is readable.
///
/// Returns the path unchanged so call sites can validate in-line while
/// building a manifest.
pub fn check_file_readable(path: &Path) -> Result<&Path> {
    if !path.exists() {
        return Err(GvkitError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(GvkitError::NotAFile(path.to_path_buf()));
    }
    // Readability is probed by opening; metadata permission bits are not
    // portable across platforms.
    if File::open(path).is_err() {
        return Err(GvkitError::NotReadable(path.to_path_buf()));
    }
    Ok(path)
}

/// Check that `path` exists and is a directory.
pub fn check_directory(path: &Path) -> Result<&Path> {
    if !path.is_dir() {
        return Err(GvkitError::NotADirectory(path.to_path_buf()));
    }
    Ok(path)
}

fn check_gvcf_with_index(path: &Path) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    if !text.ends_with(GVCF_EXTENSION) {
        return Err(GvkitError::WrongExtension {
            path: path.to_path_buf(),
            expected: GVCF_EXTENSION,
        });
    }
    check_file_readable(path)?;

    let base = &text[..text.len() - GVCF_EXTENSION.len()];
    let index = PathBuf::from(format!("{base}{GVCF_INDEX_EXTENSION}"));
    if check_file_readable(&index).is_err() {
        return Err(GvkitError::MissingIndex(index));
    }

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::fs::canonicalize(path)?)
    }
}

/// Collect validated absolute paths to every GVCF in `directory`.
///
/// Each file ending in [`GVCF_EXTENSION`] must be readable and have a
/// readable co-located index ending in [`GVCF_INDEX_EXTENSION`]. The
/// result is sorted for deterministic sample ordering downstream.
pub fn collect_gvcf_paths(directory: &Path) -> Result<Vec<PathBuf>> {
    check_directory(directory)?;

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let candidate = entry?.path();
        if !candidate.to_string_lossy().ends_with(GVCF_EXTENSION) {
            continue;
        }
        paths.push(check_gvcf_with_index(&candidate)?);
    }
    if paths.is_empty() {
        return Err(GvkitError::EmptyInput {
            dir: directory.to_path_buf(),
            extension: GVCF_EXTENSION,
        });
    }
    paths.sort();
    Ok(paths)
}

/// Read a manifest file listing one GVCF path per line and validate every
/// entry the same way [`collect_gvcf_paths`] does. Blank lines are skipped.
pub fn read_gvcf_manifest(manifest: &Path) -> Result<Vec<PathBuf>> {
    check_file_readable(manifest)?;

    let reader = BufReader::new(File::open(manifest)?);
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        paths.push(check_gvcf_with_index(Path::new(trimmed))?);
    }
    if paths.is_empty() {
        return Err(GvkitError::EmptyInput {
            dir: manifest.to_path_buf(),
            extension: GVCF_EXTENSION,
        });
    }
    Ok(paths)
}

/// Collect immediate subdirectories of `container` that carry the given
/// dataset suffix (e.g. `.vds` or `.mt`), sorted by name.
pub fn collect_dataset_dirs(container: &Path, extension: &'static str) -> Result<Vec<PathBuf>> {
    check_directory(container)?;

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(container)? {
        let candidate = entry?.path();
        if candidate.is_dir() && candidate.to_string_lossy().ends_with(extension) {
            dirs.push(candidate);
        }
    }
    if dirs.is_empty() {
        return Err(GvkitError::EmptyInput {
            dir: container.to_path_buf(),
            extension,
        });
    }
    dirs.sort();
    Ok(dirs)
}

/// Require that an export path ends in [`VCF_EXPORT_EXTENSION`].
pub fn check_vcf_export_path(path: &Path) -> Result<&Path> {
    if !path.to_string_lossy().ends_with(VCF_EXPORT_EXTENSION) {
        return Err(GvkitError::WrongExtension {
            path: path.to_path_buf(),
            expected: VCF_EXPORT_EXTENSION,
        });
    }
    Ok(path)
}
