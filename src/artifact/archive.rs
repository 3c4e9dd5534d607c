//! Archive helpers for the model release and the serving tarball.

use crate::error::{Result, SagectlError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Directory name of the serving version inside the uploaded tarball
pub const VERSION_ARCNAME: &str = "1";

/// Unpack a `.zip`, `.tar`, `.tar.gz` or `.tgz` archive into `dest`
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let file = BufReader::new(File::open(archive)?);

    if name.ends_with(".zip") {
        let mut zip = zip::ZipArchive::new(file).map_err(|e| archive_error(archive, &e))?;
        zip.extract(dest).map_err(|e| archive_error(archive, &e))?;
    } else if name.ends_with(".gz") || name.ends_with(".tgz") {
        unpack_tar(GzDecoder::new(file), archive, dest)?;
    } else {
        unpack_tar(file, archive, dest)?;
    }

    debug!("Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    let mut tar = tar::Archive::new(reader);
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| archive_error(archive, &e))
}

/// Write `version_dir` as a gzipped tarball whose only top-level entry is `1/`
pub fn package(version_dir: &Path, archive_path: &Path) -> Result<()> {
    if !version_dir.is_dir() {
        return Err(SagectlError::Archive(format!(
            "Export directory {} does not exist",
            version_dir.display()
        )));
    }

    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let encoder = GzEncoder::new(File::create(archive_path)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(VERSION_ARCNAME, version_dir)?;

    builder.into_inner()?.finish()?;

    debug!(
        size = fs::metadata(archive_path).map_or(0, |m| m.len()),
        "Packaged {} into {}",
        version_dir.display(),
        archive_path.display()
    );

    Ok(())
}

fn archive_error(archive: &Path, e: &dyn std::fmt::Display) -> SagectlError {
    SagectlError::Archive(format!("Failed to extract {}: {e}", archive.display()))
}
