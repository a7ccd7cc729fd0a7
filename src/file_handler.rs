use crate::McError;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Outcome of removing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Absent,
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()))
}

/// Replace `path` with `bytes` via a sibling temp file and a rename.
///
/// Readers see either the old content or the new one, never a truncated file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), McError> {
    let tmp = temp_sibling(path);
    let result = (|| -> Result<(), std::io::Error> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(McError::file_access(path, e));
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// First line of a file without its line terminator.
pub fn first_line(path: &Path) -> Result<String, McError> {
    let file = fs::File::open(path).map_err(|e| McError::file_access(path, e))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| McError::file_access(path, e))?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Delete a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<Removal, McError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(Removal::Removed),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Removal::Absent),
        Err(e) => Err(McError::file_access(path, e)),
    }
}
