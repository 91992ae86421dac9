use crate::utils::errors::{FsContext, PerseusError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct PerseusPaths;
pub const PROGRAM_NAME: &str = "perseus-tls";

pub const ROOT_KEY_FILE: &str = "perseus_ca.key";
pub const ROOT_CERT_FILE: &str = "perseus_ca.crt";
pub const PASSWORD_FILE: &str = "password.txt";
pub const CONFIG_FILE: &str = "config.yaml";

pub const CLIENT_KEY_FILE: &str = "client.key";
pub const CLIENT_CSR_FILE: &str = "client.csr";
pub const CLIENT_CERT_FILE: &str = "client.crt";
pub const CLIENT_BUNDLE_FILE: &str = "client.pem";

impl PerseusPaths {
    /// Get the config directory: ~/.config/perseus-tls/
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| PerseusError::Config("Cannot determine config directory".to_string()))
    }

    /// Get the base data directory: ~/.local/share/perseus-tls/
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| {
                PerseusError::Config("Cannot determine local data directory".to_string())
            })
    }

    /// Default authority root: ~/.local/share/perseus-tls/ssl/
    pub fn default_authority_root() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("ssl"))
    }

    pub fn config_file(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    pub fn root_key(authority_root: &Path) -> PathBuf {
        authority_root.join(ROOT_KEY_FILE)
    }

    pub fn root_cert(authority_root: &Path) -> PathBuf {
        authority_root.join(ROOT_CERT_FILE)
    }

    pub fn password_file(authority_root: &Path) -> PathBuf {
        authority_root.join(PASSWORD_FILE)
    }

    /// Storage directory of one subject: {authority_root}/{domain}/{name}/
    pub fn subject_dir(authority_root: &Path, domain: &str, name: &str) -> PathBuf {
        authority_root.join(domain).join(name)
    }

    /// Ensure a directory exists with proper permissions
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).fs_context(path)?;

            // Set restrictive permissions on data directories (700)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(path).fs_context(path)?.permissions();
                perms.set_mode(0o700);
                fs::set_permissions(path, perms).fs_context(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_dir_layout() {
        let dir = PerseusPaths::subject_dir(Path::new("/ssl"), "example.com", "blog.example.com");
        assert_eq!(dir, PathBuf::from("/ssl/example.com/blog.example.com"));
        assert_eq!(
            PerseusPaths::root_key(Path::new("/ssl")),
            PathBuf::from("/ssl/perseus_ca.key")
        );
    }

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        PerseusPaths::ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
