//! Archive materializer
//!
//! Extracts a downloaded archive into a scratch directory next to the install
//! directory, then moves its contents into place. A single enclosing top-level
//! directory is flattened away. Each moved entry replaces an existing entry
//! of the same name; unrelated entries already in the install directory are
//! left alone.
//!
//! Replacement is atomic per entry only. If a move fails halfway through, the
//! entries moved so far stay and the install directory holds a mix of old and
//! new content.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, warn};
use tar::Archive;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::install::core::percent_of;
use crate::install::error::InstallerError;

/// Supported release archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from the file name, falling back to magic bytes
    pub fn detect(path: &Path) -> Result<Self, InstallerError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            return Ok(Self::Zip);
        }
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Ok(Self::TarGz);
        }

        let mut magic = [0u8; 4];
        let read = File::open(path)
            .and_then(|mut f| f.read(&mut magic))
            .map_err(|e| InstallerError::Extract(format!("cannot open {}: {e}", path.display())))?;

        match &magic[..read] {
            [b'P', b'K', 0x03, 0x04, ..] | [b'P', b'K', 0x05, 0x06, ..] => Ok(Self::Zip),
            [0x1f, 0x8b, ..] => Ok(Self::TarGz),
            _ => Err(InstallerError::Extract(format!(
                "unsupported archive format: {}",
                path.display()
            ))),
        }
    }
}

/// What a successful materialization put into the install directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// Names moved into the install directory, sorted
    pub entries: Vec<String>,
    /// The archive had a single enclosing directory that was flattened
    pub flattened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Done(Materialized),
    /// Cancelled before any entry was moved; install directory untouched
    Cancelled,
}

/// Extract `archive` and merge its contents into `target_dir`
pub fn materialize(archive: &Path, target_dir: &Path) -> Result<Materialized, InstallerError> {
    match materialize_with(archive, target_dir, &CancellationToken::new(), |_| {})? {
        MaterializeOutcome::Done(done) => Ok(done),
        MaterializeOutcome::Cancelled => {
            Err(InstallerError::Extract("extraction cancelled".to_string()))
        }
    }
}

/// [`materialize`] with cancellation and extraction progress.
///
/// `cancel` is checked before every archive entry and once more before the
/// merge; an archive with no files is an [`InstallerError::Extract`]. Once
/// entries start moving into `target_dir` the call runs to
/// completion or failure.
pub fn materialize_with<F>(
    archive: &Path,
    target_dir: &Path,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<MaterializeOutcome, InstallerError>
where
    F: FnMut(f32),
{
    if cancel.is_cancelled() {
        return Ok(MaterializeOutcome::Cancelled);
    }

    let format = ArchiveFormat::detect(archive)?;

    let target_existed = target_dir.exists();
    fs::create_dir_all(target_dir).map_err(|e| {
        InstallerError::Move(format!("cannot create {}: {e}", target_dir.display()))
    })?;

    // Sibling of the target so the final moves are same-filesystem renames
    let parent = target_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        "{}.tmp-",
        target_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "install".to_string())
    );
    let scratch = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(parent)
        .map_err(|e| {
            InstallerError::Extract(format!(
                "cannot create scratch directory in {}: {e}",
                parent.display()
            ))
        })?;
    debug!(
        "Extracting {} into {}",
        archive.display(),
        scratch.path().display()
    );

    let extracted = match format {
        ArchiveFormat::Zip => extract_zip(archive, scratch.path(), cancel, &mut on_progress),
        ArchiveFormat::TarGz => extract_tar_gz(archive, scratch.path(), cancel, &mut on_progress),
    };

    let content = extracted.and_then(|()| {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let (root, flattened) = content_root(scratch.path())?;
        if is_empty_dir(&root)? {
            return Err(InstallerError::Extract(format!(
                "{} contains no files",
                archive.display()
            )));
        }
        Ok(Some((root, flattened)))
    });

    let (source, flattened) = match content {
        Ok(Some(found)) => found,
        Ok(None) => {
            discard_created_target(target_dir, target_existed);
            return Ok(MaterializeOutcome::Cancelled);
        }
        Err(e) => {
            discard_created_target(target_dir, target_existed);
            return Err(e);
        }
    };
    let entries = move_entries(&source, target_dir)?;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(
            "Could not remove scratch directory {}: {e}",
            scratch_path.display()
        );
    }

    Ok(MaterializeOutcome::Done(Materialized { entries, flattened }))
}

/// Undo `create_dir_all` of a target this run created; only succeeds while it
/// is still empty
fn discard_created_target(target_dir: &Path, target_existed: bool) {
    if !target_existed {
        let _ = fs::remove_dir(target_dir);
    }
}

fn is_empty_dir(dir: &Path) -> Result<bool, InstallerError> {
    fs::read_dir(dir)
        .map(|mut rd| rd.next().is_none())
        .map_err(|e| InstallerError::Extract(format!("cannot list {}: {e}", dir.display())))
}

/// Stops early, without error, once `cancel` fires
fn extract_zip(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(f32),
) -> Result<(), InstallerError> {
    let file = File::open(archive)
        .map_err(|e| InstallerError::Extract(format!("cannot open {}: {e}", archive.display())))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| {
        InstallerError::Extract(format!("{} is not a readable zip archive: {e}", archive.display()))
    })?;

    let total = zip.len() as u64;
    for i in 0..zip.len() {
        if cancel.is_cancelled() {
            debug!("Extraction cancelled after {i} of {total} entries");
            return Ok(());
        }
        let mut entry = zip.by_index(i).map_err(|e| {
            InstallerError::Extract(format!("cannot read zip entry {i}: {e}"))
        })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(InstallerError::Extract(format!(
                "zip entry {} points outside the extraction directory",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        let written = if entry.is_dir() {
            fs::create_dir_all(&out_path)
        } else {
            ensure_parent(&out_path).and_then(|()| {
                let mut out = File::create(&out_path)?;
                io::copy(&mut entry, &mut out).map(|_| ())
            })
        };
        written.map_err(|e| {
            InstallerError::Extract(format!("cannot extract {}: {e}", entry.name()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if !entry.is_dir()
                && let Some(mode) = entry.unix_mode().map(|m| m & 0o7777)
                && mode != 0
            {
                let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode));
            }
        }

        on_progress(percent_of(i as u64 + 1, total));
    }

    if total == 0 {
        on_progress(100.0);
    }
    Ok(())
}

/// Stops early, without error, once `cancel` fires
fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(f32),
) -> Result<(), InstallerError> {
    let file = File::open(archive)
        .map_err(|e| InstallerError::Extract(format!("cannot open {}: {e}", archive.display())))?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);

    let unreadable = |e: io::Error| {
        InstallerError::Extract(format!(
            "{} is not a readable tar.gz archive: {e}",
            archive.display()
        ))
    };
    for entry in tar.entries().map_err(unreadable)? {
        if cancel.is_cancelled() {
            debug!("Extraction of {} cancelled", archive.display());
            return Ok(());
        }
        let mut entry = entry.map_err(unreadable)?;
        let name = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
        let inside = entry
            .unpack_in(dest)
            .map_err(|e| InstallerError::Extract(format!("cannot extract {name}: {e}")))?;
        if !inside {
            return Err(InstallerError::Extract(format!(
                "tar entry {name} points outside the extraction directory"
            )));
        }
    }

    on_progress(100.0);
    Ok(())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// Directory whose children get installed: the single wrapper directory when
/// the archive has exactly one top-level entry and it is a directory,
/// otherwise the scratch root itself.
fn content_root(scratch: &Path) -> Result<(PathBuf, bool), InstallerError> {
    let entries = fs::read_dir(scratch)
        .and_then(|rd| rd.collect::<io::Result<Vec<_>>>())
        .map_err(|e| InstallerError::Extract(format!("cannot list {}: {e}", scratch.display())))?;

    if let [only] = entries.as_slice()
        && only.file_type().is_ok_and(|t| t.is_dir())
    {
        return Ok((only.path(), true));
    }
    Ok((scratch.to_path_buf(), false))
}

fn move_entries(source: &Path, target_dir: &Path) -> Result<Vec<String>, InstallerError> {
    let children = fs::read_dir(source)
        .and_then(|rd| rd.collect::<io::Result<Vec<_>>>())
        .map_err(|e| InstallerError::Move(format!("cannot list {}: {e}", source.display())))?;

    let mut moved: Vec<OsString> = Vec::with_capacity(children.len());
    for child in children {
        let name = child.file_name();
        replace_entry(&child.path(), &target_dir.join(&name))?;
        moved.push(name);
    }

    let mut names: Vec<String> = moved
        .into_iter()
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// Remove whatever occupies `dest`, then rename `src` onto it
fn replace_entry(src: &Path, dest: &Path) -> Result<(), InstallerError> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest).map_err(|e| {
            InstallerError::Move(format!("cannot replace {}: {e}", dest.display()))
        })?,
        Ok(_) => fs::remove_file(dest).map_err(|e| {
            InstallerError::Move(format!("cannot replace {}: {e}", dest.display()))
        })?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(InstallerError::Move(format!(
                "cannot inspect {}: {e}",
                dest.display()
            )));
        }
    }

    fs::rename(src, dest).map_err(|e| {
        InstallerError::Move(format!(
            "cannot move {} to {}: {e}",
            src.display(),
            dest.display()
        ))
    })
}
