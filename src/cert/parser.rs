use crate::cert::metadata::CertificateMetadata;
use crate::cert::SerialNumber;
use crate::utils::errors::{PerseusError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

pub struct CertificateParser;

impl CertificateParser {
    /// Parse certificate PEM data into metadata
    pub fn parse_pem(pem_data: &str) -> Result<CertificateMetadata> {
        let der_bytes = Self::pem_to_der(pem_data)?;
        Self::parse_der(&der_bytes)
    }

    pub fn parse_der(der_bytes: &[u8]) -> Result<CertificateMetadata> {
        let (_, cert) = X509Certificate::from_der(der_bytes)
            .map_err(|e| PerseusError::CertParsing(format!("DER parsing error: {e}")))?;
        Self::extract_metadata(&cert)
    }

    /// Raw subject public key bits of a PEM certificate.
    pub fn subject_public_key(pem_data: &str) -> Result<Vec<u8>> {
        let der_bytes = Self::pem_to_der(pem_data)?;
        let (_, cert) = X509Certificate::from_der(&der_bytes)
            .map_err(|e| PerseusError::CertParsing(format!("DER parsing error: {e}")))?;
        Ok(cert.public_key().subject_public_key.data.to_vec())
    }

    /// SHA-256 over the DER encoding, as colon-separated uppercase hex.
    pub fn fingerprint_sha256(pem_data: &str) -> Result<String> {
        let der_bytes = Self::pem_to_der(pem_data)?;
        let digest = Sha256::digest(&der_bytes);
        Ok(digest
            .iter()
            .map(|b| hex::encode_upper([*b]))
            .collect::<Vec<_>>()
            .join(":"))
    }

    /// Base64 body of the first CERTIFICATE block, decoded
    fn pem_to_der(pem_data: &str) -> Result<Vec<u8>> {
        let body: String = pem_data
            .lines()
            .map(str::trim)
            .skip_while(|line| *line != "-----BEGIN CERTIFICATE-----")
            .skip(1)
            .take_while(|line| *line != "-----END CERTIFICATE-----")
            .collect();

        if body.is_empty() {
            return Err(PerseusError::CertParsing(
                "No certificate data found in PEM".to_string(),
            ));
        }

        general_purpose::STANDARD
            .decode(&body)
            .map_err(|e| PerseusError::CertParsing(format!("Base64 decode error: {e}")))
    }

    fn extract_metadata(cert: &X509Certificate) -> Result<CertificateMetadata> {
        let serial = SerialNumber::from_bytes(cert.raw_serial());

        let first_cn = |name: &X509Name| {
            name.iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .unwrap_or("Unknown")
                .to_string()
        };
        let cn = first_cn(cert.subject());
        let issuer = first_cn(cert.issuer());

        let not_before = timestamp(cert.validity().not_before.timestamp())?;
        let not_after = timestamp(cert.validity().not_after.timestamp())?;

        let mut critical_extensions = Vec::new();
        let bad_ext = |e: X509Error| PerseusError::CertParsing(format!("Extension error: {e}"));

        let mut sans = Vec::new();
        if let Some(san) = cert.subject_alternative_name().map_err(bad_ext)? {
            if san.critical {
                critical_extensions.push("SubjectAltName".to_string());
            }
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                    GeneralName::IPAddress(ip) if ip.len() == 4 => {
                        sans.push(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]))
                    }
                    _ => {}
                }
            }
        }

        let mut key_usage = Vec::new();
        if let Some(ku) = cert.key_usage().map_err(bad_ext)? {
            if ku.critical {
                critical_extensions.push("KeyUsage".to_string());
            }
            let flags = [
                (ku.value.digital_signature(), "DigitalSignature"),
                (ku.value.non_repudiation(), "NonRepudiation"),
                (ku.value.key_encipherment(), "KeyEncipherment"),
                (ku.value.data_encipherment(), "DataEncipherment"),
                (ku.value.key_agreement(), "KeyAgreement"),
                (ku.value.key_cert_sign(), "KeyCertSign"),
                (ku.value.crl_sign(), "CRLSign"),
            ];
            key_usage.extend(
                flags
                    .iter()
                    .filter(|(set, _)| *set)
                    .map(|(_, name)| name.to_string()),
            );
        }

        let mut extended_key_usage = Vec::new();
        if let Some(eku) = cert.extended_key_usage().map_err(bad_ext)? {
            if eku.critical {
                critical_extensions.push("ExtendedKeyUsage".to_string());
            }
            let flags = [
                (eku.value.server_auth, "ServerAuth"),
                (eku.value.client_auth, "ClientAuth"),
                (eku.value.code_signing, "CodeSigning"),
                (eku.value.email_protection, "EmailProtection"),
                (eku.value.time_stamping, "TimeStamping"),
                (eku.value.ocsp_signing, "OCSPSigning"),
            ];
            extended_key_usage.extend(
                flags
                    .iter()
                    .filter(|(set, _)| *set)
                    .map(|(_, name)| name.to_string()),
            );
            extended_key_usage.extend(eku.value.other.iter().map(|oid| oid.to_id_string()));
        }

        let mut is_ca = false;
        if let Some(bc) = cert.basic_constraints().map_err(bad_ext)? {
            if bc.critical {
                critical_extensions.push("BasicConstraints".to_string());
            }
            is_ca = bc.value.ca;
        }

        Ok(CertificateMetadata {
            serial,
            cn,
            issuer,
            issuer_dn: cert.issuer().to_string(),
            subject_dn: cert.subject().to_string(),
            not_before,
            not_after,
            sans,
            key_usage,
            extended_key_usage,
            critical_extensions,
            is_ca,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| PerseusError::CertParsing(format!("Timestamp out of range: {secs}")))
}
