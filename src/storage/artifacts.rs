use crate::cert::renewal::ArtifactPresence;
use crate::cert::Subject;
use crate::utils::errors::Result;
use crate::utils::files::{self, MODE_PUBLIC, MODE_SECRET};
use crate::utils::paths::{
    PerseusPaths, CLIENT_BUNDLE_FILE, CLIENT_CERT_FILE, CLIENT_CSR_FILE, CLIENT_KEY_FILE,
};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four per-subject files, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    PrivateKey,
    SigningRequest,
    Certificate,
    Bundle,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::PrivateKey,
        ArtifactKind::SigningRequest,
        ArtifactKind::Certificate,
        ArtifactKind::Bundle,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::PrivateKey => CLIENT_KEY_FILE,
            Self::SigningRequest => CLIENT_CSR_FILE,
            Self::Certificate => CLIENT_CERT_FILE,
            Self::Bundle => CLIENT_BUNDLE_FILE,
        }
    }

    /// Anything holding private key material is owner-only.
    pub fn mode(&self) -> u32 {
        match self {
            Self::PrivateKey | Self::Bundle => MODE_SECRET,
            Self::SigningRequest | Self::Certificate => MODE_PUBLIC,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrivateKey => "key",
            Self::SigningRequest => "csr",
            Self::Certificate => "crt",
            Self::Bundle => "bundle",
        };
        write!(f, "{name}")
    }
}

/// Canonical file locations for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    dir: PathBuf,
}

impl ArtifactPaths {
    pub fn for_subject(authority_root: &Path, subject: &Subject) -> Self {
        Self {
            dir: PerseusPaths::subject_dir(authority_root, subject.domain(), subject.name()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn bundle(&self) -> PathBuf {
        self.path(ArtifactKind::Bundle)
    }

    pub fn presence(&self) -> ArtifactPresence {
        ArtifactPresence {
            key: self.path(ArtifactKind::PrivateKey).is_file(),
            request: self.path(ArtifactKind::SigningRequest).is_file(),
            certificate: self.path(ArtifactKind::Certificate).is_file(),
            bundle: self.path(ArtifactKind::Bundle).is_file(),
        }
    }
}

/// Persists leaf artifacts under `{authority_root}/{domain}/{name}/`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    authority_root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(authority_root: impl Into<PathBuf>) -> Self {
        Self {
            authority_root: authority_root.into(),
        }
    }

    pub fn paths(&self, subject: &Subject) -> ArtifactPaths {
        ArtifactPaths::for_subject(&self.authority_root, subject)
    }

    /// Overwrite one artifact, creating the subject directory if needed.
    pub fn write(&self, paths: &ArtifactPaths, kind: ArtifactKind, contents: &str) -> Result<()> {
        PerseusPaths::ensure_dir_exists(paths.dir())?;
        let path = paths.path(kind);
        files::write_file_atomic(&path, contents.as_bytes(), kind.mode())?;
        tracing::debug!("Wrote {} to {}", kind, path.display());
        Ok(())
    }

    pub fn read(&self, paths: &ArtifactPaths, kind: ArtifactKind) -> Result<String> {
        files::read_text(&paths.path(kind))
    }

    /// Whether a site has TLS material to configure the proxy with.
    pub fn has_certificate(&self, subject: &Subject) -> bool {
        let paths = self.paths(subject);
        paths.path(ArtifactKind::Certificate).is_file() && paths.bundle().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_paths_follow_subject_layout() {
        let subject = Subject::new("example.com", "blog.example.com").unwrap();
        let paths = ArtifactPaths::for_subject(Path::new("/ssl"), &subject);

        assert_eq!(
            paths.path(ArtifactKind::PrivateKey),
            PathBuf::from("/ssl/example.com/blog.example.com/client.key")
        );
        assert_eq!(
            paths.bundle(),
            PathBuf::from("/ssl/example.com/blog.example.com/client.pem")
        );
    }

    #[test]
    fn test_write_sets_modes_and_presence() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path());
        let subject = Subject::new("example.com", "blog.example.com").unwrap();
        let paths = writer.paths(&subject);

        assert!(!paths.presence().any());
        assert!(!writer.has_certificate(&subject));

        writer.write(&paths, ArtifactKind::PrivateKey, "key\n").unwrap();
        writer.write(&paths, ArtifactKind::Certificate, "crt\n").unwrap();
        assert!(!writer.has_certificate(&subject));

        writer.write(&paths, ArtifactKind::Bundle, "key\ncrt\n").unwrap();
        assert!(writer.has_certificate(&subject));

        let presence = paths.presence();
        assert!(presence.key && presence.certificate && presence.bundle);
        assert!(!presence.request);
        assert_eq!(
            writer.read(&paths, ArtifactKind::Bundle).unwrap(),
            "key\ncrt\n"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |kind| {
                fs::metadata(paths.path(kind)).unwrap().permissions().mode() & 0o777
            };
            assert_eq!(mode(ArtifactKind::PrivateKey), 0o600);
            assert_eq!(mode(ArtifactKind::Bundle), 0o600);
            assert_eq!(mode(ArtifactKind::Certificate), 0o644);
        }
    }
}
