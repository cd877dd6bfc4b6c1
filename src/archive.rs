//! Zip archive helper
//!
//! Dataset directories contain many small shard files, which makes them
//! awkward to move around or check into test fixtures. This module packs a
//! directory tree into a single zip archive and back, optionally removing
//! the source afterward. Entry paths are stored relative to the archive
//! root; extraction refuses entries that would escape the target directory.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::info;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{GvkitError, Result};
use crate::paths::check_directory;

/// Recursively compress `source_dir` into the zip archive at `output_zip`.
///
/// When `remove_originals` is set the source tree is deleted after the
/// archive has been written and flushed.
pub fn compress_dir(source_dir: &Path, output_zip: &Path, remove_originals: bool) -> Result<()> {
    check_directory(source_dir)?;
    if let Some(parent) = output_zip.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(output_zip)?;
    let mut writer = ZipWriter::new(file);
    add_dir_entries(&mut writer, source_dir, source_dir)?;
    writer.finish()?;
    info!(
        source = %source_dir.display(),
        archive = %output_zip.display(),
        "compressed directory"
    );

    if remove_originals {
        fs::remove_dir_all(source_dir)?;
        info!(source = %source_dir.display(), "removed originals after compression");
    }
    Ok(())
}

fn add_dir_entries(writer: &mut ZipWriter<File>, root: &Path, dir: &Path) -> Result<()> {
    let options = FileOptions::default();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            writer.add_directory(format!("{relative}/"), options)?;
            add_dir_entries(writer, root, &path)?;
        } else {
            writer.start_file(relative, options)?;
            let mut input = File::open(&path)?;
            io::copy(&mut input, writer)?;
        }
    }
    Ok(())
}

/// Extract the zip archive at `zip_path` into the directory `extract_to`,
/// creating it if necessary. When `remove_originals` is set the archive
/// file is deleted after extraction.
pub fn decompress_archive(zip_path: &Path, extract_to: &Path, remove_originals: bool) -> Result<()> {
    let file = File::open(zip_path).map_err(|_| GvkitError::NotFound(zip_path.to_path_buf()))?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(extract_to)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        // enclosed_name() is None for entries with absolute or `..` paths.
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(GvkitError::DatasetFormat {
                path: zip_path.to_path_buf(),
                reason: format!("archive entry '{}' escapes the extraction root", entry.name()),
            });
        };
        let target = extract_to.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut output = File::create(&target)?;
            io::copy(&mut entry, &mut output)?;
        }
    }
    info!(
        archive = %zip_path.display(),
        target = %extract_to.display(),
        "extracted archive"
    );

    if remove_originals {
        fs::remove_file(zip_path)?;
    }
    Ok(())
}
