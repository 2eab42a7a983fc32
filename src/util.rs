//! Shared filesystem helpers used across pipeline stages.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::debug;

use crate::error::{PipelineError, Result};

/// Create `dir` and all of its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| PipelineError::create_dir(dir, e))?;
    debug!("created directory {}", dir.display());
    Ok(())
}

/// Make sure `path` exists as a file, creating an empty one (and its parent
/// directories) when absent. Existing content is left alone.
///
/// Returns `true` when the file was created.
pub fn ensure_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| PipelineError::create_file(path, e))?;
    Ok(true)
}

/// Join `path` onto `root` unless it is already absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Opens a file and returns a buffered reader, transparently decompressing
/// `.gz` files. Concatenated gzip members are read as one stream.
pub fn open_compressed(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let reader: Box<dyn Read + Send> = match extension.as_str() {
        "gz" | "gzip" => Box::new(MultiGzDecoder::new(file)),
        _ => Box::new(file),
    };

    Ok(Box::new(BufReader::new(reader)))
}

/// Best-effort removal of a leftover file or directory; failures are logged.
pub fn discard(path: &Path) {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = removed
        && e.kind() != io::ErrorKind::NotFound
    {
        log::warn!("could not remove {}: {e}", path.display());
    }
}
