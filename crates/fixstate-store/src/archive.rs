//! Tri-partition state archive stored as a zip container.
//!
//! Entry names encode the partition: the database dump is the single file
//! entry `dump`, while the `var` and `media` trees live under `var/` and
//! `media/`. Directory entries end in `/` and are recorded for every
//! directory, the partition root included, so empty directories survive a
//! round trip. The archive comment carries [`IDENTITY_TAG`].
//!
//! Changes are staged in memory and only reach disk on [`StateArchive::save`],
//! which rewrites the whole container into a temp file and renames it over
//! the target.

use crate::{fsync_dir, StoreError};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive comment identifying a fixstate state archive.
pub const IDENTITY_TAG: &str = "fixstate-state/1";
const DUMP_ENTRY: &str = "dump";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Dump,
    Var,
    Media,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Dump, Partition::Var, Partition::Media];

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Dump => "dump",
            Partition::Var => "var",
            Partition::Media => "media",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dump" => Ok(Partition::Dump),
            "var" => Ok(Partition::Var),
            "media" => Ok(Partition::Media),
            other => Err(StoreError::UnknownPartition(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Where an entry's content comes from.
#[derive(Debug, Clone)]
enum Source {
    /// Index into the backing zip file.
    Stored(usize),
    /// Staged file on disk, read at save or extract time.
    File(PathBuf),
    /// Staged directory; carries no content.
    Directory,
}

#[derive(Debug, Clone)]
struct Entry {
    partition: Partition,
    /// `/`-separated path inside the partition; empty for the partition root.
    relative: String,
    kind: EntryKind,
    mode: Option<u32>,
    source: Source,
}

impl Entry {
    fn name(&self) -> String {
        match (self.partition, self.kind) {
            (Partition::Dump, _) => DUMP_ENTRY.to_owned(),
            (p, EntryKind::Directory) if self.relative.is_empty() => format!("{p}/"),
            (p, EntryKind::Directory) => format!("{p}/{}/", self.relative),
            (p, EntryKind::File) => format!("{p}/{}", self.relative),
        }
    }
}

/// Split an entry name into partition, relative path and kind.
fn parse_entry_name(name: &str) -> Option<(Partition, String, EntryKind)> {
    if name == DUMP_ENTRY {
        return Some((Partition::Dump, String::new(), EntryKind::File));
    }
    let (prefix, rest) = name.split_once('/')?;
    let partition = match prefix.parse::<Partition>().ok()? {
        Partition::Dump => return None,
        p => p,
    };
    if rest.is_empty() {
        return Some((partition, String::new(), EntryKind::Directory));
    }
    match rest.strip_suffix('/') {
        Some("") => None,
        Some(dir) => Some((partition, dir.to_owned(), EntryKind::Directory)),
        None => Some((partition, rest.to_owned(), EntryKind::File)),
    }
}

/// Destination of `entry` under `dest`, or `None` if the name would escape it.
fn entry_target(dest: &Path, entry: &Entry) -> Option<PathBuf> {
    let mut target = dest.join(entry.partition.as_str());
    for part in entry.relative.split('/').filter(|p| !p.is_empty()) {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) => target.push(c),
            _ => return None,
        }
    }
    Some(target)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<(), StoreError> {
    Ok(())
}

fn describe_io_error(e: &io::Error) -> String {
    let reason = match e.kind() {
        io::ErrorKind::NotFound => "no such file",
        io::ErrorKind::PermissionDenied => "can't open file",
        io::ErrorKind::AlreadyExists => "file already exists",
        io::ErrorKind::InvalidInput => "invalid argument",
        io::ErrorKind::OutOfMemory => "malloc failure",
        io::ErrorKind::UnexpectedEof => "read error",
        _ => return format!("I/O error: {e}"),
    };
    format!("{reason} ({e})")
}

/// Human-readable reason for a zip failure.
fn describe_zip_error(e: &ZipError) -> String {
    match e {
        ZipError::Io(io) => describe_io_error(io),
        ZipError::InvalidArchive(detail) => format!("zip archive inconsistent ({detail})"),
        ZipError::UnsupportedArchive(detail) => format!("not a zip archive ({detail})"),
        ZipError::FileNotFound => "no such file".to_owned(),
    }
}

fn save_failed(e: &StoreError) -> StoreError {
    StoreError::SaveFailed(match e {
        StoreError::Zip(z) => describe_zip_error(z),
        StoreError::Io(io) => describe_io_error(io),
        other => other.to_string(),
    })
}

/// Open and verify an existing archive, returning it with its parsed entries.
fn read_archive(path: &Path) -> Result<(ZipArchive<File>, Vec<Entry>), StoreError> {
    let file = File::open(path)
        .map_err(|e| StoreError::invalid_input(path, format!("cannot open: {e}")))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| StoreError::invalid_format(path, describe_zip_error(&e)))?;
    if zip.comment() != IDENTITY_TAG.as_bytes() {
        return Err(StoreError::invalid_format(
            path,
            "missing or mismatched identity tag",
        ));
    }

    let mut entries = Vec::with_capacity(zip.len());
    let mut seen = HashSet::new();
    for index in 0..zip.len() {
        let (name, mode) = {
            let raw = zip
                .by_index_raw(index)
                .map_err(|e| StoreError::invalid_format(path, describe_zip_error(&e)))?;
            (raw.name().to_owned(), raw.unix_mode().map(|m| m & 0o7777))
        };
        let Some((partition, relative, kind)) = parse_entry_name(&name) else {
            return Err(StoreError::invalid_format(
                path,
                format!("entry '{name}' does not belong to a known partition"),
            ));
        };
        let key: Vec<&str> = relative.split('/').filter(|p| !p.is_empty()).collect();
        if !seen.insert((partition, key.join("/"))) {
            return Err(StoreError::invalid_format(
                path,
                format!("duplicate entry '{name}'"),
            ));
        }
        entries.push(Entry {
            partition,
            relative,
            kind,
            mode,
            source: Source::Stored(index),
        });
    }
    Ok((zip, entries))
}

/// Collect every directory and file under `dir` as entries of `partition`.
fn collect_tree(partition: Partition, dir: &Path) -> Result<Vec<Entry>, StoreError> {
    let mut entries = Vec::new();
    for item in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(dir);
            StoreError::invalid_input(path, e.to_string())
        })?;
        let path = item.path();
        let meta = item
            .metadata()
            .map_err(|e| StoreError::invalid_input(path, e.to_string()))?;
        let relative = relative_name(dir, path)?;

        if meta.is_dir() {
            entries.push(Entry {
                partition,
                relative,
                kind: EntryKind::Directory,
                mode: mode_of(&meta),
                source: Source::Directory,
            });
        } else if meta.is_file() {
            File::open(path)
                .map_err(|e| StoreError::invalid_input(path, format!("unreadable: {e}")))?;
            entries.push(Entry {
                partition,
                relative,
                kind: EntryKind::File,
                mode: mode_of(&meta),
                source: Source::File(path.to_path_buf()),
            });
        } else {
            warn!("skipping special file {}", path.display());
        }
    }
    Ok(entries)
}

fn relative_name(root: &Path, path: &Path) -> Result<String, StoreError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| StoreError::invalid_input(path, e.to_string()))?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let Some(part) = component.as_os_str().to_str() else {
            return Err(StoreError::invalid_input(path, "file name is not valid UTF-8"));
        };
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn require_dir(path: &Path) -> Result<(), StoreError> {
    let meta = fs::metadata(path).map_err(|e| StoreError::invalid_input(path, e.to_string()))?;
    if !meta.is_dir() {
        return Err(StoreError::invalid_input(path, "not a directory"));
    }
    fs::read_dir(path)
        .map_err(|e| StoreError::invalid_input(path, format!("unreadable: {e}")))?;
    Ok(())
}

/// A state archive: the `dump`, `var` and `media` partitions of one snapshot.
pub struct StateArchive {
    path: PathBuf,
    backing: Option<ZipArchive<File>>,
    entries: Vec<Entry>,
    dirty: bool,
}

impl fmt::Debug for StateArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateArchive")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl StateArchive {
    /// Open the archive at `path`, or start a new empty one if nothing exists
    /// there yet. A new archive is written on the first [`save`](Self::save).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if fs::symlink_metadata(&path).is_err() {
            let parent = parent_dir(&path);
            if !parent.is_dir() {
                return Err(StoreError::invalid_input(
                    &path,
                    "parent directory does not exist",
                ));
            }
            debug!("new state archive at {}", path.display());
            return Ok(Self {
                path,
                backing: None,
                entries: Vec::new(),
                dirty: true,
            });
        }

        let (backing, entries) = read_archive(&path)?;
        debug!(
            "opened state archive {} ({} entries)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            backing: Some(backing),
            entries,
            dirty: false,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().map(Entry::name).collect()
    }

    pub fn contains(&self, partition: Partition) -> bool {
        self.entries.iter().any(|e| e.partition == partition)
    }

    /// Whether there are changes not yet written by [`save`](Self::save).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the dump partition with `file`.
    pub fn set_dump(&mut self, file: &Path) -> Result<&mut Self, StoreError> {
        let meta = fs::metadata(file).map_err(|e| StoreError::invalid_input(file, e.to_string()))?;
        if !meta.is_file() {
            return Err(StoreError::invalid_input(file, "not a regular file"));
        }
        File::open(file).map_err(|e| StoreError::invalid_input(file, format!("unreadable: {e}")))?;

        self.entries.retain(|e| e.partition != Partition::Dump);
        self.entries.push(Entry {
            partition: Partition::Dump,
            relative: String::new(),
            kind: EntryKind::File,
            mode: mode_of(&meta),
            source: Source::File(file.to_path_buf()),
        });
        self.dirty = true;
        debug!("staged dump from {}", file.display());
        Ok(self)
    }

    /// Replace the var partition with the tree under `dir`.
    pub fn set_var(&mut self, dir: &Path) -> Result<&mut Self, StoreError> {
        self.set_tree(Partition::Var, dir)
    }

    /// Replace the media partition with the tree under `dir`.
    pub fn set_media(&mut self, dir: &Path) -> Result<&mut Self, StoreError> {
        self.set_tree(Partition::Media, dir)
    }

    fn set_tree(&mut self, partition: Partition, dir: &Path) -> Result<&mut Self, StoreError> {
        require_dir(dir)?;
        let collected = collect_tree(partition, dir)?;
        let count = collected.len();
        self.entries.retain(|e| e.partition != partition);
        self.entries.extend(collected);
        self.dirty = true;
        debug!("staged {count} {partition} entries from {}", dir.display());
        Ok(self)
    }

    /// Write the dump to `dest/dump`.
    pub fn extract_dump(&mut self, dest: &Path) -> Result<&mut Self, StoreError> {
        self.extract(Partition::Dump, dest)
    }

    /// Write the var tree to `dest/var`.
    pub fn extract_var(&mut self, dest: &Path) -> Result<&mut Self, StoreError> {
        self.extract(Partition::Var, dest)
    }

    /// Write the media tree to `dest/media`.
    pub fn extract_media(&mut self, dest: &Path) -> Result<&mut Self, StoreError> {
        self.extract(Partition::Media, dest)
    }

    /// Write every entry of `partition` under `dest/<partition>`.
    ///
    /// Permission bits are restored; directory modes are applied once their
    /// content is in place so read-only directories can still be filled.
    pub fn extract(&mut self, partition: Partition, dest: &Path) -> Result<&mut Self, StoreError> {
        require_dir(dest)?;

        let Self {
            path,
            backing,
            entries,
            ..
        } = &mut *self;
        let mut dir_modes = Vec::new();
        let mut written = 0usize;
        for entry in entries.iter().filter(|e| e.partition == partition) {
            let target = entry_target(dest, entry).ok_or_else(|| {
                StoreError::invalid_format(
                    path,
                    format!("entry '{}' escapes the destination", entry.name()),
                )
            })?;

            if entry.kind == EntryKind::Directory {
                fs::create_dir_all(&target)?;
                dir_modes.push((target, entry.mode));
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            match &entry.source {
                Source::Stored(index) => {
                    let Some(zip) = backing.as_mut() else {
                        return Err(StoreError::invalid_format(path, "archive is not open"));
                    };
                    let mut content = zip.by_index(*index)?;
                    io::copy(&mut content, &mut out)?;
                }
                Source::File(src) => {
                    let mut content = File::open(src)
                        .map_err(|e| StoreError::invalid_input(src, e.to_string()))?;
                    io::copy(&mut content, &mut out)?;
                }
                Source::Directory => {}
            }
            apply_mode(&target, entry.mode)?;
            written += 1;
        }

        for (dir, mode) in dir_modes.into_iter().rev() {
            apply_mode(&dir, mode)?;
        }
        debug!(
            "extracted {written} {partition} files from {} into {}",
            path.display(),
            dest.display()
        );
        Ok(self)
    }

    /// Commit all entries to disk.
    ///
    /// The container is rebuilt in a temp file next to the target, stamped,
    /// synced and renamed into place, then reopened and verified.
    pub fn save(&mut self) -> Result<&mut Self, StoreError> {
        let dir = parent_dir(&self.path).to_path_buf();
        let mut tmp = tempfile::Builder::new()
            .prefix(".fixstate-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| {
                StoreError::SaveFailed(format!(
                    "cannot create temporary file in '{}': {}",
                    dir.display(),
                    describe_io_error(&e)
                ))
            })?;

        self.write_entries(tmp.as_file_mut())
            .map_err(|e| save_failed(&e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| save_failed(&StoreError::Io(e)))?;
        tmp.persist(&self.path)
            .map_err(|e| save_failed(&StoreError::Io(e.error)))?;
        fsync_dir(&dir).map_err(|e| save_failed(&StoreError::Io(e)))?;

        let (backing, entries) = read_archive(&self.path).map_err(|e| {
            StoreError::SaveFailed(format!("saved archive failed verification: {e}"))
        })?;
        self.backing = Some(backing);
        self.entries = entries;
        self.dirty = false;
        info!(
            "saved state archive {} ({} entries)",
            self.path.display(),
            self.entries.len()
        );
        Ok(self)
    }

    fn write_entries(&mut self, out: &mut File) -> Result<(), StoreError> {
        let Self {
            backing, entries, ..
        } = self;
        let mut writer = ZipWriter::new(out);
        for entry in entries.iter() {
            let mut options =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            if let Some(mode) = entry.mode {
                options = options.unix_permissions(mode);
            }
            match &entry.source {
                Source::Stored(index) => {
                    let Some(zip) = backing.as_mut() else {
                        return Err(StoreError::SaveFailed(
                            "backing archive is not open".to_owned(),
                        ));
                    };
                    writer.raw_copy_file(zip.by_index_raw(*index)?)?;
                }
                Source::File(src) => {
                    let mut content = File::open(src)
                        .map_err(|e| StoreError::invalid_input(src, e.to_string()))?;
                    writer.start_file(entry.name(), options)?;
                    io::copy(&mut content, &mut writer)?;
                }
                Source::Directory => writer.add_directory(entry.name(), options)?,
            }
        }
        writer.set_comment(IDENTITY_TAG);
        writer.finish()?;
        Ok(())
    }
}
