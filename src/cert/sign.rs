use crate::cert::authority::RootAuthority;
use crate::cert::{SerialNumber, Subject};
use crate::crypto::KeyMaterialCodec;
use crate::utils::errors::{PerseusError, Result};
use crate::utils::pem::PemCertificate;
use chrono::{DateTime, Utc};
use rcgen::string::Ia5String;
use rcgen::{CertificateSigningRequestParams, CustomExtension, IsCa, KeyUsagePurpose, SanType};
use time::OffsetDateTime;

/// Leaf certificate lifetime
pub const LEAF_VALIDITY_DAYS: i64 = 365;

const OID_EXTENDED_KEY_USAGE: &[u64] = &[2, 5, 29, 37];

/// SEQUENCE { id-kp-serverAuth, id-kp-clientAuth }
const EKU_SERVER_CLIENT_AUTH: &[u8] = &[
    0x30, 0x14, 0x06, 0x08, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x01, 0x06, 0x08, 0x2b,
    0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x02,
];

/// Signs leaf requests with the root key.
pub struct CertificateIssuer<'a> {
    root: &'a RootAuthority,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(root: &'a RootAuthority) -> Self {
        Self { root }
    }

    pub fn issue(&self, subject: &Subject, csr_pem: &str) -> Result<PemCertificate> {
        self.issue_at(subject, csr_pem, Utc::now())
    }

    /// Issue with an explicit issuance time; validity runs 365 days from it.
    pub fn issue_at(
        &self,
        subject: &Subject,
        csr_pem: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<PemCertificate> {
        let signing_error = |reason: String| PerseusError::Signing {
            subject: subject.to_string(),
            reason,
        };

        // Subject DN and public key are taken from the request as-is.
        let mut csr = CertificateSigningRequestParams::from_pem(csr_pem)
            .map_err(|e| signing_error(format!("invalid signing request: {e}")))?;

        let not_before = OffsetDateTime::from_unix_timestamp(issued_at.timestamp())
            .map_err(|e| signing_error(format!("issuance time out of range: {e}")))?;

        let params = &mut csr.params;
        params.is_ca = IsCa::NoCa;
        params.serial_number = Some((&SerialNumber::random()).into());
        params.not_before = not_before;
        params.not_after = not_before + time::Duration::days(LEAF_VALIDITY_DAYS);
        params.subject_alt_names = subject
            .dns_names()
            .into_iter()
            .map(|name| {
                Ia5String::try_from(name.clone())
                    .map(SanType::DnsName)
                    .map_err(|e| signing_error(format!("invalid DNS name '{name}': {e}")))
            })
            .collect::<Result<_>>()?;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        // rcgen only emits a non-critical EKU
        params.extended_key_usages = Vec::new();
        let mut eku =
            CustomExtension::from_oid_content(OID_EXTENDED_KEY_USAGE, EKU_SERVER_CLIENT_AUTH.to_vec());
        eku.set_criticality(true);
        params.custom_extensions = vec![eku];

        let issuer = self.root.issuer()?;
        let cert = csr
            .signed_by(&issuer)
            .map_err(|e| signing_error(format!("signing failed: {e}")))?;

        tracing::debug!(
            "Issued certificate for {} valid until {}",
            subject,
            issued_at + chrono::Duration::days(LEAF_VALIDITY_DAYS)
        );
        Ok(KeyMaterialCodec::encode_certificate(cert.der()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::tests::credentials;
    use crate::cert::authority::CertificateAuthorityStore;
    use crate::cert::parser::CertificateParser;
    use crate::cert::request::CertificateRequestBuilder;
    use chrono::TimeZone;

    #[test]
    fn test_leaf_certificate_extensions_and_validity() {
        let tmp = tempfile::tempdir().unwrap();
        let creds = credentials(None);
        let (root, _) = CertificateAuthorityStore::new(tmp.path())
            .load_or_create(&creds)
            .unwrap();

        let subject = Subject::new("example.com", "blog.example.com").unwrap();
        let key = KeyMaterialCodec::generate_key_pair().unwrap();
        let csr = CertificateRequestBuilder::new(&creds)
            .build(&subject, &key)
            .unwrap();

        let issued_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap();
        let cert = CertificateIssuer::new(&root)
            .issue_at(&subject, &csr, issued_at)
            .unwrap();
        let meta = CertificateParser::parse_pem(cert.pem_data()).unwrap();

        assert_eq!(meta.issuer_dn, root.subject_dn());
        assert_eq!(meta.issuer, "Acme Root CA");
        assert_eq!(meta.cn, "blog.example.com");
        assert!(meta.subject_dn.contains("O=Acme"));
        assert_eq!(meta.sans, vec!["blog.example.com", "www.blog.example.com"]);
        assert_eq!(meta.not_before, issued_at);
        assert_eq!(meta.not_after - meta.not_before, chrono::Duration::days(365));
        assert!(!meta.is_ca);

        assert_eq!(meta.key_usage, vec!["DigitalSignature", "KeyEncipherment"]);
        assert_eq!(meta.extended_key_usage, vec!["ServerAuth", "ClientAuth"]);
        assert!(meta.critical_extensions.contains(&"KeyUsage".to_string()));
        assert!(meta
            .critical_extensions
            .contains(&"ExtendedKeyUsage".to_string()));
        assert!(!meta
            .critical_extensions
            .contains(&"SubjectAltName".to_string()));

        let leaf_key = CertificateParser::subject_public_key(cert.pem_data()).unwrap();
        assert_eq!(leaf_key, key.public_key_raw());
    }

    #[test]
    fn test_every_issuance_gets_fresh_serial() {
        let tmp = tempfile::tempdir().unwrap();
        let creds = credentials(None);
        let (root, _) = CertificateAuthorityStore::new(tmp.path())
            .load_or_create(&creds)
            .unwrap();

        let subject = Subject::new("example.com", "shop.example.com").unwrap();
        let key = KeyMaterialCodec::generate_key_pair().unwrap();
        let csr = CertificateRequestBuilder::new(&creds)
            .build(&subject, &key)
            .unwrap();

        let issuer = CertificateIssuer::new(&root);
        let first = CertificateParser::parse_pem(issuer.issue(&subject, &csr).unwrap().pem_data())
            .unwrap();
        let second = CertificateParser::parse_pem(issuer.issue(&subject, &csr).unwrap().pem_data())
            .unwrap();
        assert_ne!(first.serial, second.serial);
    }

    #[test]
    fn test_garbage_request_is_signing_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (root, _) = CertificateAuthorityStore::new(tmp.path())
            .load_or_create(&credentials(None))
            .unwrap();
        let subject = Subject::new("example.com", "blog.example.com").unwrap();

        let err = CertificateIssuer::new(&root)
            .issue(&subject, "not a csr")
            .unwrap_err();
        assert!(matches!(err, PerseusError::Signing { .. }));
        assert!(!err.is_fatal());
    }
}
