use crate::utils::errors::{FsContext, PerseusError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Owner read/write only
pub const MODE_SECRET: u32 = 0o600;
/// World readable, owner writable
pub const MODE_PUBLIC: u32 = 0o644;

/// Write `contents` to `path` through a sibling temporary file and a rename,
/// so readers never observe a partially written artifact.
pub fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        PerseusError::InvalidInput(format!("Path has no parent directory: {}", path.display()))
    })?;
    let tmp_path = temporary_sibling(path)?;

    {
        let mut file = fs::File::create(&tmp_path).fs_context(&tmp_path)?;
        set_file_mode(&tmp_path, mode)?;
        file.write_all(contents).fs_context(&tmp_path)?;
        file.sync_all().fs_context(&tmp_path)?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(PerseusError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        });
    }

    tracing::trace!("Wrote {} bytes to {} (dir {})", contents.len(), path.display(), parent.display());
    Ok(())
}

/// Set permission bits on Unix; no-op elsewhere.
pub fn set_file_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).fs_context(path)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Read a UTF-8 file, mapping a missing file to `MissingMaterial`.
pub fn read_text(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PerseusError::MissingMaterial(path.to_path_buf()))
        }
        Err(e) => Err(PerseusError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn temporary_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        PerseusError::InvalidInput(format!("Path has no file name: {}", path.display()))
    })?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(format!(".tmp{}", std::process::id()));
    Ok(path.with_file_name(tmp_name))
}
