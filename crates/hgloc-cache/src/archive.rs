//! Zip packaging for public bundles.
//!
//! Entry names are relative to the archived directory and always use `/`.
//! Both functions report failure as `false` after logging; callers treat a
//! failed archive step as "this tier is unavailable".

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use hgloc_types::relative_key;

use crate::paths::ensure_parent_dirs;

/// Archive everything under `src` into `dest_zip`.
pub fn zip_dir(src: &Path, dest_zip: &Path) -> bool {
    match try_zip_dir(src, dest_zip) {
        Ok(files) => {
            debug!(src = %src.display(), zip = %dest_zip.display(), files, "zipped directory");
            true
        }
        Err(e) => {
            warn!(src = %src.display(), zip = %dest_zip.display(), error = %e, "failed to zip directory");
            false
        }
    }
}

/// Extract `zip_path` into `dest`. Entries resolving outside `dest` abort the extraction.
pub fn unzip(zip_path: &Path, dest: &Path) -> bool {
    match try_unzip(zip_path, dest) {
        Ok(files) => {
            debug!(zip = %zip_path.display(), dest = %dest.display(), files, "extracted archive");
            true
        }
        Err(e) => {
            warn!(zip = %zip_path.display(), dest = %dest.display(), error = %e, "failed to extract archive");
            false
        }
    }
}

fn try_zip_dir(src: &Path, dest_zip: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(anyhow!("{} is not a directory", src.display()));
    }
    ensure_parent_dirs(dest_zip)?;
    let file = File::create(dest_zip)
        .map_err(|e| anyhow!("Failed to create {}: {}", dest_zip.display(), e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| anyhow!("Failed to walk {}: {}", src.display(), e))?;
        let Some(name) = relative_key(src, entry.path()) else {
            continue;
        };
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }
        writer.start_file(name, options)?;
        let mut input = File::open(entry.path())
            .map_err(|e| anyhow!("Failed to open {}: {}", entry.path().display(), e))?;
        std::io::copy(&mut input, &mut writer)?;
        files += 1;
    }
    writer.finish()?;
    Ok(files)
}

fn try_unzip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path)
        .map_err(|e| anyhow!("Failed to open {}: {}", zip_path.display(), e))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| anyhow!("Invalid zip archive {}: {}", zip_path.display(), e))?;
    std::fs::create_dir_all(dest)
        .map_err(|e| anyhow!("Failed to create directory {}: {}", dest.display(), e))?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("Unsafe entry name in archive: {}", entry.name()))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| anyhow!("Failed to create directory {}: {}", out_path.display(), e))?;
            continue;
        }
        ensure_parent_dirs(&out_path)?;
        let mut output = File::create(&out_path)
            .map_err(|e| anyhow!("Failed to create {}: {}", out_path.display(), e))?;
        std::io::copy(&mut entry, &mut output)?;
        files += 1;
    }
    Ok(files)
}
