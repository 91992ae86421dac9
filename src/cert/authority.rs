use crate::cert::metadata::CertificateMetadata;
use crate::cert::parser::CertificateParser;
use crate::cert::SerialNumber;
use crate::crypto::KeyMaterialCodec;
use crate::utils::errors::{PerseusError, Result};
use crate::utils::files::{self, MODE_PUBLIC, MODE_SECRET};
use crate::utils::pem::PemCertificate;
use crate::utils::paths::PerseusPaths;
use rcgen::string::PrintableString;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, Issuer, KeyPair,
};
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Root certificate lifetime
pub const ROOT_VALIDITY_DAYS: i64 = 3650;

/// Identity and secret used for the root and inherited by every request.
#[derive(Clone)]
pub struct RootCredentials {
    pub country: String,
    pub state: String,
    pub organisation: String,
    pub password: Option<String>,
}

impl RootCredentials {
    pub fn root_common_name(&self) -> String {
        format!("{} Root CA", self.organisation)
    }

    /// C / ST / O from the credentials plus the given CN.
    pub fn distinguished_name(&self, common_name: &str) -> Result<DistinguishedName> {
        let country = PrintableString::try_from(self.country.as_str()).map_err(|e| {
            PerseusError::InvalidInput(format!("Invalid country '{}': {e}", self.country))
        })?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, DnValue::PrintableString(country));
        dn.push(DnType::StateOrProvinceName, self.state.as_str());
        dn.push(DnType::OrganizationName, self.organisation.as_str());
        dn.push(DnType::CommonName, common_name);
        Ok(dn)
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("country", &self.country)
            .field("state", &self.state)
            .field("organisation", &self.organisation)
            .field("password", &self.password().map(|_| "<redacted>"))
            .finish()
    }
}

/// Whether a piece of root material came from disk or was just created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialOrigin {
    Loaded,
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub key: MaterialOrigin,
    pub certificate: MaterialOrigin,
}

impl LoadOutcome {
    pub fn is_fresh(&self) -> bool {
        self.key == MaterialOrigin::Generated || self.certificate == MaterialOrigin::Generated
    }
}

/// The loaded root key and certificate. Read-only once constructed.
pub struct RootAuthority {
    key_pair: KeyPair,
    certificate: PemCertificate,
    metadata: CertificateMetadata,
}

impl RootAuthority {
    pub fn certificate(&self) -> &PemCertificate {
        &self.certificate
    }

    pub fn metadata(&self) -> &CertificateMetadata {
        &self.metadata
    }

    pub fn subject_dn(&self) -> &str {
        &self.metadata.subject_dn
    }

    /// Signing handle for leaf issuance.
    pub fn issuer(&self) -> Result<Issuer<'static, &KeyPair>> {
        Issuer::from_ca_cert_pem(self.certificate.pem_data(), &self.key_pair).map_err(|e| {
            PerseusError::CertParsing(format!("Root certificate unusable as issuer: {e}"))
        })
    }
}

impl fmt::Debug for RootAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootAuthority")
            .field("subject", &self.metadata.subject_dn)
            .field("not_after", &self.metadata.not_after)
            .finish_non_exhaustive()
    }
}

/// Owns `perseus_ca.key` and `perseus_ca.crt` under the authority root.
#[derive(Debug, Clone)]
pub struct CertificateAuthorityStore {
    root_dir: PathBuf,
}

impl CertificateAuthorityStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn key_path(&self) -> PathBuf {
        PerseusPaths::root_key(&self.root_dir)
    }

    pub fn cert_path(&self) -> PathBuf {
        PerseusPaths::root_cert(&self.root_dir)
    }

    /// Load the root, generating whatever is absent. An existing key that
    /// fails to decode is an error; it is never replaced.
    pub fn load_or_create(
        &self,
        credentials: &RootCredentials,
    ) -> Result<(RootAuthority, LoadOutcome)> {
        PerseusPaths::ensure_dir_exists(&self.root_dir)?;

        let key_path = self.key_path();
        let (key_pair, key_origin) = if key_path.exists() {
            let key_pair = KeyMaterialCodec::load_private_key(&key_path, credentials.password())?;
            tracing::debug!("Loaded root key from {}", key_path.display());
            (key_pair, MaterialOrigin::Loaded)
        } else {
            tracing::info!("Root key not found, generating {}", key_path.display());
            let key_pair = self.write_new_key(credentials)?;
            (key_pair, MaterialOrigin::Generated)
        };

        let cert_path = self.cert_path();
        let cert_exists = cert_path.exists();
        let (certificate, cert_origin) = if key_origin == MaterialOrigin::Loaded && cert_exists {
            let certificate = KeyMaterialCodec::load_certificate(&cert_path)?;
            self.verify_key_matches(&certificate, &key_pair)?;
            (certificate, MaterialOrigin::Loaded)
        } else {
            if cert_exists {
                tracing::warn!(
                    "Root certificate {} belongs to a previous key, regenerating",
                    cert_path.display()
                );
            }
            let certificate = self.write_new_certificate(credentials, &key_pair)?;
            (certificate, MaterialOrigin::Generated)
        };

        let outcome = LoadOutcome {
            key: key_origin,
            certificate: cert_origin,
        };
        Ok((Self::assemble(key_pair, certificate)?, outcome))
    }

    /// Replace both root key and certificate. Every previously issued leaf
    /// stops chaining to the new root.
    pub fn rotate(&self, credentials: &RootCredentials) -> Result<RootAuthority> {
        PerseusPaths::ensure_dir_exists(&self.root_dir)?;
        tracing::warn!("Rotating root authority in {}", self.root_dir.display());

        let key_pair = self.write_new_key(credentials)?;
        let certificate = self.write_new_certificate(credentials, &key_pair)?;
        Self::assemble(key_pair, certificate)
    }

    /// Root certificate metadata without touching the key.
    pub fn inspect_certificate(&self) -> Result<CertificateMetadata> {
        let certificate = KeyMaterialCodec::load_certificate(&self.cert_path())?;
        CertificateParser::parse_pem(certificate.pem_data())
    }

    fn write_new_key(&self, credentials: &RootCredentials) -> Result<KeyPair> {
        let key_pair = KeyMaterialCodec::generate_key_pair()?;
        let encoded = KeyMaterialCodec::encode_private_key(&key_pair, credentials.password())?;
        if !encoded.is_encrypted() {
            tracing::warn!("Root key is stored without a password");
        }
        files::write_file_atomic(&self.key_path(), encoded.pem_data().as_bytes(), MODE_SECRET)?;
        Ok(key_pair)
    }

    fn write_new_certificate(
        &self,
        credentials: &RootCredentials,
        key_pair: &KeyPair,
    ) -> Result<PemCertificate> {
        let certificate = build_root_certificate(credentials, key_pair, OffsetDateTime::now_utc())?;
        files::write_file_atomic(
            &self.cert_path(),
            certificate.pem_data().as_bytes(),
            MODE_PUBLIC,
        )?;
        tracing::info!("Wrote root certificate {}", self.cert_path().display());
        Ok(certificate)
    }

    fn verify_key_matches(&self, certificate: &PemCertificate, key_pair: &KeyPair) -> Result<()> {
        let cert_key = CertificateParser::subject_public_key(certificate.pem_data())?;
        if cert_key != key_pair.public_key_raw() {
            return Err(PerseusError::RootMismatch {
                cert_path: self.cert_path(),
                key_path: self.key_path(),
            });
        }
        Ok(())
    }

    fn assemble(key_pair: KeyPair, certificate: PemCertificate) -> Result<RootAuthority> {
        let metadata = CertificateParser::parse_pem(certificate.pem_data())?;
        Ok(RootAuthority {
            key_pair,
            certificate,
            metadata,
        })
    }
}

/// Loads the root on first use and shares it for the rest of a run.
pub struct AuthorityContext {
    store: CertificateAuthorityStore,
    credentials: RootCredentials,
    root: OnceCell<RootAuthority>,
    outcome: Cell<Option<LoadOutcome>>,
}

impl AuthorityContext {
    pub fn new(store: CertificateAuthorityStore, credentials: RootCredentials) -> Self {
        Self {
            store,
            credentials,
            root: OnceCell::new(),
            outcome: Cell::new(None),
        }
    }

    pub fn credentials(&self) -> &RootCredentials {
        &self.credentials
    }

    pub fn store(&self) -> &CertificateAuthorityStore {
        &self.store
    }

    /// Any failure here is wrapped as `PerseusError::Authority` so callers
    /// can tell it apart from per-subject errors.
    pub fn root(&self) -> Result<&RootAuthority> {
        if let Some(root) = self.root.get() {
            return Ok(root);
        }
        let (root, outcome) = self
            .store
            .load_or_create(&self.credentials)
            .map_err(|e| PerseusError::Authority(Box::new(e)))?;
        self.outcome.set(Some(outcome));
        Ok(self.root.get_or_init(|| root))
    }

    pub fn is_loaded(&self) -> bool {
        self.root.get().is_some()
    }

    /// How the root was obtained, once it has been loaded.
    pub fn load_outcome(&self) -> Option<LoadOutcome> {
        self.outcome.get()
    }
}

fn build_root_certificate(
    credentials: &RootCredentials,
    key_pair: &KeyPair,
    now: OffsetDateTime,
) -> Result<PemCertificate> {
    let mut params = CertificateParams::default();
    params.distinguished_name = credentials.distinguished_name(&credentials.root_common_name())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.serial_number = Some((&SerialNumber::random()).into());
    params.not_before = now;
    params.not_after = now + time::Duration::days(ROOT_VALIDITY_DAYS);

    let cert = params.self_signed(key_pair).map_err(|e| PerseusError::Signing {
        subject: credentials.root_common_name(),
        reason: e.to_string(),
    })?;
    Ok(KeyMaterialCodec::encode_certificate(cert.der()))
}
