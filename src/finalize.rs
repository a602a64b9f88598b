//! All-or-nothing output files.
//!
//! Output is written to a temporary file in the destination directory and
//! renamed over `dest` only after the writer closure succeeded and the data
//! was synced.  On any error the temporary file is removed when the
//! `NamedTempFile` drops, so `dest` is either absent/untouched or complete.

use std::fs::File;
use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

pub fn write_atomically<E, F>(dest: &Path, write: F) -> Result<(), E>
where
    E: From<io::Error>,
    F: FnOnce(&mut File) -> Result<(), E>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
