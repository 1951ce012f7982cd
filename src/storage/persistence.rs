//! Window persistence.
//!
//! Every write lands in a temporary file next to its destination and is then
//! renamed over it, so a reader only ever sees the old file or the new one.
//! The directory is synced after the rename.
//! Loading is lenient: a missing, empty or corrupt file reads as an empty
//! window, and individual bad points are skipped.

use crate::core::{Result, RollupError, SampleInput, WindowKind, WindowsConfig};
use crate::storage::window::Window;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Serialize `value` as indented JSON and atomically replace `path` with it.
///
/// On any failure the destination is left untouched and the temporary file
/// is removed when it drops.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir).map_err(|e| RollupError::persist(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n").map_err(|e| RollupError::persist(path, e))?;
        writer.flush().map_err(|e| RollupError::persist(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| RollupError::persist(path, e))?;
    tmp.persist(path)
        .map_err(|e| RollupError::persist(path, e.error))?;
    sync_dir(dir).map_err(|e| RollupError::persist(path, e))?;

    Ok(())
}

/// Flush a directory entry so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Read a window file.
///
/// Never fails: anything unreadable is logged and treated as empty. Points
/// that do not parse are skipped, and the survivors are re-sorted and
/// deduplicated.
pub fn load_window(path: &Path) -> Window {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "window file absent, starting empty");
            return Window::empty();
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read window file, treating as empty");
            return Window::empty();
        },
    };

    if raw.trim().is_empty() {
        return Window::empty();
    }

    let document: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "window file is not valid JSON, treating as empty");
            return Window::empty();
        },
    };

    let last_update = document
        .get("last_update")
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| crate::core::parse_timestamp(raw).ok());

    let Some(entries) = document.get("data_points").and_then(serde_json::Value::as_array) else {
        warn!(path = %path.display(), "window file has no data_points array, treating as empty");
        return Window::empty();
    };

    let mut skipped = 0usize;
    let points = entries.iter().filter_map(|entry| {
        let parsed = serde_json::from_value::<SampleInput>(entry.clone())
            .map_err(RollupError::from)
            .and_then(|input| input.parse());
        match parsed {
            Ok(point) => Some(point),
            Err(e) => {
                skipped += 1;
                debug!(path = %path.display(), error = %e, "skipping unreadable point");
                None
            },
        }
    });
    let window = Window::from_points(points.collect::<Vec<_>>(), last_update);

    if skipped > 0 {
        warn!(path = %path.display(), skipped, kept = window.len(), "skipped unreadable points");
    }
    window
}

/// Persist a window atomically.
pub fn save_window(path: &Path, window: &Window) -> Result<()> {
    write_json_atomic(path, window)?;
    debug!(path = %path.display(), points = window.len(), "saved window");
    Ok(())
}

/// The four window files under one data directory.
#[derive(Debug, Clone)]
pub struct WindowStore {
    dir: PathBuf,
    files: BTreeMap<WindowKind, PathBuf>,
}

impl WindowStore {
    /// Open (and if needed create) the data directory.
    ///
    /// Missing window files are created empty so readers always find all four.
    pub fn open(dir: impl Into<PathBuf>, windows: &WindowsConfig) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RollupError::persist(&dir, e))?;
        if !dir.is_dir() {
            return Err(RollupError::config(format!(
                "data directory {} is not a directory",
                dir.display()
            )));
        }

        let files: BTreeMap<WindowKind, PathBuf> = WindowKind::ALL
            .iter()
            .map(|kind| (*kind, dir.join(&windows.get(*kind).file)))
            .collect();

        for (kind, path) in &files {
            if !path.exists() {
                save_window(path, &Window::empty())?;
                debug!(window = %kind, path = %path.display(), "created empty window file");
            }
        }

        Ok(Self { dir, files })
    }

    /// Data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a window.
    pub fn path(&self, kind: WindowKind) -> &Path {
        // every kind is inserted in `open`
        self.files.get(&kind).map_or(self.dir.as_path(), PathBuf::as_path)
    }

    /// Load a window (lenient).
    pub fn load(&self, kind: WindowKind) -> Window {
        load_window(self.path(kind))
    }

    /// Save a window atomically.
    pub fn save(&self, kind: WindowKind, window: &Window) -> Result<()> {
        save_window(self.path(kind), window)
    }
}
