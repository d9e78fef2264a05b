//! Archive extraction module
//!
//! Handles zip and tar.gz archives.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Unpacks a downloaded archive into a directory.
pub trait Unpacker: Send + Sync {
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError>;
}

/// [`Unpacker`] that picks the format from the file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveUnpacker;

impl Unpacker for ArchiveUnpacker {
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
        extract_auto(archive, dest_dir)
    }
}

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

/// Detect archive format from file extension
pub fn detect_format(path: &Path) -> Option<ArchiveFormat> {
    let path_str = path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else {
        None
    }
}

/// Extract an archive, auto-detecting format.
///
/// Downloads land in extension-less temp files, so when the name says
/// nothing the zip magic is sniffed before falling back to tar.gz.
pub fn extract_auto(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let format = match detect_format(archive_path) {
        Some(format) => format,
        None => sniff_format(archive_path)?,
    };
    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
    }
}

fn sniff_format(path: &Path) -> Result<ArchiveFormat, ExtractError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut magic)?;
    match &magic[..read] {
        [b'P', b'K', 3, 4] => Ok(ArchiveFormat::Zip),
        [0x1f, 0x8b, ..] => Ok(ArchiveFormat::TarGz),
        _ => Err(ExtractError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path: PathBuf = entry.path()?.components().collect();

        // Skip directories
        if entry.header().entry_type().is_dir() {
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);

        // Sanitize path to prevent Zip Slip
        if relative_path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
            || !absolute_path.starts_with(dest_dir)
        {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                relative_path.display()
            )));
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&absolute_path)?;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                file.name()
            )));
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}
