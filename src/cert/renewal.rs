use crate::cert::authority::AuthorityContext;
use crate::cert::parser::CertificateParser;
use crate::cert::request::CertificateRequestBuilder;
use crate::cert::sign::CertificateIssuer;
use crate::cert::Subject;
use crate::crypto::KeyMaterialCodec;
use crate::storage::{ArtifactKind, ArtifactPaths, ArtifactWriter};
use crate::utils::errors::Result;
use crate::utils::pem::{PemBundle, PemCertificate, PemPrivateKey};
use chrono::{DateTime, Utc};
use rcgen::KeyPair;
use std::path::PathBuf;

pub const DEFAULT_AUTO_RENEW_DAYS: u32 = 30;

/// Operator overrides for one run. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalFlags {
    pub force_key: bool,
    pub force_request: bool,
    pub force_certificate: bool,
    pub auto_renew_days: u32,
}

impl Default for RenewalFlags {
    fn default() -> Self {
        Self {
            force_key: false,
            force_request: false,
            force_certificate: false,
            auto_renew_days: DEFAULT_AUTO_RENEW_DAYS,
        }
    }
}

/// Which artifacts already exist on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactPresence {
    pub key: bool,
    pub request: bool,
    pub certificate: bool,
    pub bundle: bool,
}

impl ArtifactPresence {
    pub fn all() -> Self {
        Self {
            key: true,
            request: true,
            certificate: true,
            bundle: true,
        }
    }

    pub fn any(&self) -> bool {
        self.key || self.request || self.certificate || self.bundle
    }
}

/// Artifacts to (re)create. Each stage forces every stage after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalPlan {
    pub key: bool,
    pub request: bool,
    pub certificate: bool,
    pub bundle: bool,
}

impl RenewalPlan {
    /// key -> request -> certificate -> bundle
    pub fn decide(
        existing: &ArtifactPresence,
        flags: &RenewalFlags,
        existing_cert_pem: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let key = !existing.key || flags.force_key;
        let request = !existing.request || key || flags.force_request;
        let certificate = !existing.certificate
            || request
            || flags.force_certificate
            || is_within_renewal_window(existing_cert_pem, flags.auto_renew_days, now);
        let bundle = !existing.bundle || key || request || certificate;

        Self {
            key,
            request,
            certificate,
            bundle,
        }
    }

    pub fn is_noop(&self) -> bool {
        !(self.key || self.request || self.certificate || self.bundle)
    }

    pub fn kinds(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| self.includes(*kind))
            .collect()
    }

    pub fn includes(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::PrivateKey => self.key,
            ArtifactKind::SigningRequest => self.request,
            ArtifactKind::Certificate => self.certificate,
            ArtifactKind::Bundle => self.bundle,
        }
    }
}

/// True if the certificate expires within `days` of `now`. A missing or
/// unparsable certificate counts as due.
pub fn is_within_renewal_window(cert_pem: Option<&str>, days: u32, now: DateTime<Utc>) -> bool {
    let Some(cert_pem) = cert_pem else {
        return true;
    };
    match CertificateParser::parse_pem(cert_pem) {
        Ok(meta) => meta.expires_within(days, now),
        Err(e) => {
            tracing::warn!("Existing certificate is unreadable, renewing: {e}");
            true
        }
    }
}

/// What happened to one subject during a run.
#[derive(Debug, Clone)]
pub struct SubjectOutcome {
    pub subject: Subject,
    pub written: Vec<ArtifactKind>,
    pub bundle_path: PathBuf,
}

impl SubjectOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.written.is_empty()
    }

    pub fn bundle_written(&self) -> bool {
        self.written.contains(&ArtifactKind::Bundle)
    }
}

/// Applies `RenewalPlan` decisions for each subject.
pub struct RenewalPolicyEngine<'a> {
    authority: &'a AuthorityContext,
    writer: &'a ArtifactWriter,
    flags: RenewalFlags,
}

impl<'a> RenewalPolicyEngine<'a> {
    pub fn new(authority: &'a AuthorityContext, writer: &'a ArtifactWriter, flags: RenewalFlags) -> Self {
        Self {
            authority,
            writer,
            flags,
        }
    }

    /// Decide without writing anything. A key that no longer matches the
    /// certificate next to it forces a new request and certificate.
    pub fn plan(&self, subject: &Subject, now: DateTime<Utc>) -> RenewalPlan {
        let paths = self.writer.paths(subject);
        let presence = paths.presence();
        let existing_cert = self.read_existing_certificate(&paths, &presence);

        let mut flags = self.flags;
        if presence.key && !flags.force_key {
            if let Some(cert_pem) = existing_cert.as_deref() {
                if !self.key_matches_certificate(&paths, cert_pem) {
                    tracing::warn!("{subject}: private key does not match certificate, re-issuing");
                    flags.force_request = true;
                }
            }
        }
        RenewalPlan::decide(&presence, &flags, existing_cert.as_deref(), now)
    }

    pub fn ensure(&self, subject: &Subject) -> Result<SubjectOutcome> {
        self.ensure_at(subject, Utc::now())
    }

    /// Bring one subject's artifacts up to date as of `now`. The root is only
    /// loaded when a certificate has to be signed. Nothing is written until
    /// every planned artifact has been built.
    pub fn ensure_at(&self, subject: &Subject, now: DateTime<Utc>) -> Result<SubjectOutcome> {
        let paths = self.writer.paths(subject);
        let plan = self.plan(subject, now);
        let mut outcome = SubjectOutcome {
            subject: subject.clone(),
            written: Vec::new(),
            bundle_path: paths.bundle(),
        };

        if plan.is_noop() {
            tracing::debug!("{subject}: certificate material up to date");
            return Ok(outcome);
        }
        tracing::info!("{subject}: renewing {:?}", plan.kinds());

        let root = if plan.certificate {
            Some(self.authority.root()?)
        } else {
            None
        };

        let mut key_pair: Option<KeyPair> = None;
        let key_pem = if plan.key {
            let generated = KeyMaterialCodec::generate_key_pair()?;
            let pem = KeyMaterialCodec::encode_private_key(&generated, None)?;
            key_pair = Some(generated);
            pem
        } else {
            PemPrivateKey::new(self.writer.read(&paths, ArtifactKind::PrivateKey)?)
        };

        let csr_pem = if plan.request {
            let key_pair = match key_pair {
                Some(key_pair) => key_pair,
                None => KeyMaterialCodec::decode_private_key(
                    key_pem.pem_data(),
                    None,
                    &paths.path(ArtifactKind::PrivateKey),
                )?,
            };
            Some(
                CertificateRequestBuilder::new(self.authority.credentials())
                    .build(subject, &key_pair)?,
            )
        } else {
            None
        };

        let cert_pem = match root {
            Some(root) => {
                let csr = match &csr_pem {
                    Some(csr) => csr.clone(),
                    None => self.writer.read(&paths, ArtifactKind::SigningRequest)?,
                };
                CertificateIssuer::new(root).issue_at(subject, &csr, now)?
            }
            None => PemCertificate::new(self.writer.read(&paths, ArtifactKind::Certificate)?),
        };

        let bundle = PemBundle::new(key_pem.clone(), cert_pem.clone()).pem_data();

        if plan.key {
            self.writer
                .write(&paths, ArtifactKind::PrivateKey, key_pem.pem_data())?;
            outcome.written.push(ArtifactKind::PrivateKey);
        }
        if let Some(csr) = &csr_pem {
            self.writer.write(&paths, ArtifactKind::SigningRequest, csr)?;
            outcome.written.push(ArtifactKind::SigningRequest);
        }
        if plan.certificate {
            self.writer
                .write(&paths, ArtifactKind::Certificate, cert_pem.pem_data())?;
            outcome.written.push(ArtifactKind::Certificate);
        }
        if plan.bundle {
            self.writer.write(&paths, ArtifactKind::Bundle, &bundle)?;
            outcome.written.push(ArtifactKind::Bundle);
        }

        Ok(outcome)
    }

    fn key_matches_certificate(&self, paths: &ArtifactPaths, cert_pem: &str) -> bool {
        let key_path = paths.path(ArtifactKind::PrivateKey);
        let key = self
            .writer
            .read(paths, ArtifactKind::PrivateKey)
            .and_then(|pem| KeyMaterialCodec::decode_private_key(&pem, None, &key_path));
        let cert_key = CertificateParser::subject_public_key(cert_pem);
        match (key, cert_key) {
            (Ok(key), Ok(cert_key)) => key.public_key_raw() == cert_key.as_slice(),
            // Unreadable material is handled by the regular plan
            _ => true,
        }
    }

    fn read_existing_certificate(
        &self,
        paths: &ArtifactPaths,
        presence: &ArtifactPresence,
    ) -> Option<String> {
        if !presence.certificate {
            return None;
        }
        match self.writer.read(paths, ArtifactKind::Certificate) {
            Ok(pem) => Some(pem),
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }
}
