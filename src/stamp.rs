//! The stamp file the built application reads its version from.

use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Suffix marking a build from a working tree with uncommitted changes
pub const DIRTY_SUFFIX: &str = "+";

/// Write `revision + suffix` to `path`, replacing whatever was there.
///
/// Missing parent directories are created. No trailing newline is added.
pub fn write_stamp(revision: &str, suffix: &str, path: &Path) -> std::io::Result<()> {
    debug!("Writing git hash into {:?}", path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match fs::remove_file(path) {
        Ok(()) => debug!("Removed previous stamp {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::write(path, format!("{}{}", revision, suffix))?;
    info!("Stamped {:?} with '{}{}'", path, revision, suffix);
    Ok(())
}

/// Current stamp content, or `None` if nothing has been written yet
pub fn read_stamp(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
