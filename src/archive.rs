//! Manifest-gated archive extraction.
//!
//! Installation runs in two passes over the zip index. The first pass only
//! reads: it checks that some entry is a `manifest.json` file and that no
//! entry would land outside the install root. Nothing is written unless that
//! pass succeeds. The second pass creates directories and copies file
//! contents verbatim, applying the archive's Unix permission bits.
//!
//! The second pass is not transactional. If it fails halfway (disk full,
//! permission denied) the partially extracted files stay on disk and the
//! caller is responsible for cleaning them up.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{PlugmanError, Result};
use crate::plugins::MANIFEST_FILE;

/// What an installation wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Files written.
    pub files: usize,
    /// Directory entries created.
    pub directories: usize,
    /// Directory holding the first manifest found, under the install root.
    pub plugin_dir: PathBuf,
}

/// An archive entry that passed validation.
#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    name: String,
    relative: PathBuf,
    is_dir: bool,
    mode: Option<u32>,
}

/// Validate `archive_path` as a plugin package without writing anything.
///
/// Returns the manifest's directory relative to the archive root.
pub fn validate_archive(archive_path: &Path) -> Result<PathBuf> {
    let mut archive = open_archive(archive_path)?;
    let (_, manifest_dir) = plan_entries(&mut archive, archive_path)?;
    Ok(manifest_dir)
}

/// Extract a plugin archive under `root`.
///
/// # Errors
/// - `ArchiveOpenError` if the file is missing or not a zip container
/// - `NotAPluginArchive` if no entry is a `manifest.json` file (nothing written)
/// - `UnsafeArchiveEntry` if an entry escapes `root` (nothing written)
/// - `ExtractionError` if writing an entry fails (earlier entries stay on disk)
pub fn install_archive(archive_path: &Path, root: &Path) -> Result<InstallReport> {
    let mut archive = open_archive(archive_path)?;
    let (entries, manifest_dir) = plan_entries(&mut archive, archive_path)?;

    debug!(
        archive = %archive_path.display(),
        entries = entries.len(),
        "Archive validated, extracting"
    );

    let mut report = InstallReport {
        files: 0,
        directories: 0,
        plugin_dir: root.join(&manifest_dir),
    };
    let mut dir_modes = Vec::new();

    for entry in &entries {
        let target = root.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&target).map_err(|e| extraction_error(&entry.name, e))?;
            if let Some(mode) = entry.mode {
                dir_modes.push((target, mode));
            }
            report.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| extraction_error(&entry.name, e))?;
        }

        let mut source = archive
            .by_index(entry.index)
            .map_err(|e| extraction_error(&entry.name, io::Error::other(e.to_string())))?;
        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(|e| extraction_error(&entry.name, e))?;
        io::copy(&mut source, &mut out).map_err(|e| extraction_error(&entry.name, e))?;

        if let Some(mode) = entry.mode {
            apply_mode(&target, mode).map_err(|e| extraction_error(&entry.name, e))?;
        }
        report.files += 1;
    }

    // Directory modes go last so a read-only directory does not block its children.
    for (dir, mode) in dir_modes.iter().rev() {
        apply_mode(dir, *mode).map_err(|e| extraction_error(&dir.display().to_string(), e))?;
    }

    info!(
        archive = %archive_path.display(),
        plugin_dir = %report.plugin_dir.display(),
        files = report.files,
        "Installed archive"
    );
    Ok(report)
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<File>> {
    let open_error = |reason: String| PlugmanError::ArchiveOpenError {
        path: archive_path.to_path_buf(),
        reason,
    };
    let file = File::open(archive_path).map_err(|e| open_error(e.to_string()))?;
    ZipArchive::new(file).map_err(|e| open_error(e.to_string()))
}

/// First pass: read every entry header, collect the extraction plan.
fn plan_entries(
    archive: &mut ZipArchive<File>,
    archive_path: &Path,
) -> Result<(Vec<PlannedEntry>, PathBuf)> {
    let mut entries = Vec::with_capacity(archive.len());
    let mut manifest_dir: Option<PathBuf> = None;

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| PlugmanError::ArchiveOpenError {
                path: archive_path.to_path_buf(),
                reason: format!("entry {}: {}", index, e),
            })?;

        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| PlugmanError::UnsafeArchiveEntry {
                path: archive_path.to_path_buf(),
                entry: name.clone(),
            })?;
        let is_dir = entry.is_dir();

        if !is_dir
            && manifest_dir.is_none()
            && relative.file_name() == Some(OsStr::new(MANIFEST_FILE))
        {
            manifest_dir = Some(relative.parent().map(Path::to_path_buf).unwrap_or_default());
        }

        entries.push(PlannedEntry {
            index,
            name,
            relative,
            is_dir,
            mode: entry.unix_mode().map(|m| m & 0o7777),
        });
    }

    let manifest_dir = manifest_dir.ok_or_else(|| PlugmanError::NotAPluginArchive {
        path: archive_path.to_path_buf(),
    })?;
    Ok((entries, manifest_dir))
}

fn extraction_error(entry: &str, source: io::Error) -> PlugmanError {
    PlugmanError::ExtractionError {
        entry: entry.to_string(),
        source,
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
