use crate::cert::authority::RootCredentials;
use crate::cert::Subject;
use crate::utils::errors::{PerseusError, Result};
use crate::utils::pem::normalize_pem;
use rcgen::{CertificateParams, KeyPair};

/// Builds the PKCS#10 request a leaf key submits to the root.
pub struct CertificateRequestBuilder<'a> {
    credentials: &'a RootCredentials,
}

impl<'a> CertificateRequestBuilder<'a> {
    pub fn new(credentials: &'a RootCredentials) -> Self {
        Self { credentials }
    }

    /// Self-signed by `key_pair`, CN = subdomain name, no extensions.
    pub fn build(&self, subject: &Subject, key_pair: &KeyPair) -> Result<String> {
        let mut params = CertificateParams::default();
        params.distinguished_name = self.credentials.distinguished_name(subject.name())?;

        let request = params
            .serialize_request(key_pair)
            .map_err(|e| PerseusError::Signing {
                subject: subject.to_string(),
                reason: format!("failed to build signing request: {e}"),
            })?;
        let pem = request.pem().map_err(|e| PerseusError::Signing {
            subject: subject.to_string(),
            reason: format!("failed to encode signing request: {e}"),
        })?;
        Ok(normalize_pem(&pem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::tests::credentials;
    use crate::crypto::KeyMaterialCodec;
    use x509_parser::prelude::*;

    #[test]
    fn test_request_subject_and_signature() {
        let creds = credentials(None);
        let subject = Subject::new("example.com", "blog.example.com").unwrap();
        let key = KeyMaterialCodec::generate_key_pair().unwrap();

        let pem = CertificateRequestBuilder::new(&creds)
            .build(&subject, &key)
            .unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));

        let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).unwrap();
        let (_, csr) = X509CertificationRequest::from_der(&block.contents).unwrap();

        let info = &csr.certification_request_info;
        let cn = info
            .subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap();
        assert_eq!(cn, "blog.example.com");
        assert!(info.subject.to_string().contains("ST=Bucharest"));
        assert_eq!(
            info.subject_pki.subject_public_key.data.as_ref(),
            key.public_key_raw()
        );
    }
}
