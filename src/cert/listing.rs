use crate::cert::renewal::{is_within_renewal_window, ArtifactPresence};
use crate::cert::{CertificateMetadata, CertificateParser, Subject};
use crate::sites::Site;
use crate::storage::{ArtifactKind, ArtifactWriter};
use crate::utils::output::{GetColumnValue, TableColumn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

pub const DEFAULT_STATUS_COLUMNS: &[&str] = &["name", "domain", "cert", "not_after", "renew"];

/// Certificate state of one discovered site, read from disk only.
#[derive(Debug, Clone, Serialize)]
pub struct SiteStatus {
    pub name: String,
    pub domain: String,
    pub has_certificate: bool,
    pub needs_renewal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateMetadata>,
    pub bundle: String,
}

impl SiteStatus {
    pub fn collect(
        writer: &ArtifactWriter,
        subject: &Subject,
        auto_renew_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let paths = writer.paths(subject);
        let cert_pem = writer.read(&paths, ArtifactKind::Certificate).ok();
        let certificate = cert_pem
            .as_deref()
            .and_then(|pem| CertificateParser::parse_pem(pem).ok());
        let needs_renewal = paths.presence() != ArtifactPresence::all()
            || is_within_renewal_window(cert_pem.as_deref(), auto_renew_days, now);

        Self {
            name: subject.name().to_string(),
            domain: subject.domain().to_string(),
            has_certificate: writer.has_certificate(subject),
            needs_renewal,
            certificate,
            bundle: paths.bundle().display().to_string(),
        }
    }

    pub fn for_sites(
        writer: &ArtifactWriter,
        sites: &[Site],
        auto_renew_days: u32,
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        sites
            .iter()
            .filter_map(|site| match site.subject() {
                Ok(subject) => Some(Self::collect(writer, &subject, auto_renew_days, now)),
                Err(e) => {
                    tracing::warn!("Skipping site {}: {e}", site.name);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteColumn {
    Name,
    Domain,
    Cert,
    Serial,
    NotBefore,
    NotAfter,
    Issuer,
    Sans,
    Renew,
    Bundle,
}

impl FromStr for SiteColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "domain" => Ok(Self::Domain),
            "cert" => Ok(Self::Cert),
            "serial" => Ok(Self::Serial),
            "not_before" => Ok(Self::NotBefore),
            "not_after" => Ok(Self::NotAfter),
            "issuer" => Ok(Self::Issuer),
            "sans" => Ok(Self::Sans),
            "renew" => Ok(Self::Renew),
            "bundle" => Ok(Self::Bundle),
            _ => Err(format!(
                "Unknown column: {s}. Valid columns: name, domain, cert, serial, not_before, not_after, issuer, sans, renew, bundle"
            )),
        }
    }
}

impl TableColumn for SiteColumn {
    fn header(&self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Domain => "DOMAIN",
            Self::Cert => "CERT",
            Self::Serial => "SERIAL",
            Self::NotBefore => "NOT BEFORE",
            Self::NotAfter => "NOT AFTER",
            Self::Issuer => "ISSUER",
            Self::Sans => "SANS",
            Self::Renew => "RENEW",
            Self::Bundle => "BUNDLE",
        }
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

impl GetColumnValue<SiteColumn> for SiteStatus {
    fn get_column_value(&self, column: &SiteColumn) -> String {
        let cert = self.certificate.as_ref();
        let from_cert = |f: fn(&CertificateMetadata) -> String| {
            cert.map(f).unwrap_or_else(|| "-".to_string())
        };
        match column {
            SiteColumn::Name => self.name.clone(),
            SiteColumn::Domain => self.domain.clone(),
            SiteColumn::Cert => yes_no(self.has_certificate),
            SiteColumn::Serial => from_cert(|m| m.serial.to_string()),
            SiteColumn::NotBefore => from_cert(|m| m.not_before.format("%Y-%m-%d").to_string()),
            SiteColumn::NotAfter => from_cert(|m| m.not_after.format("%Y-%m-%d").to_string()),
            SiteColumn::Issuer => from_cert(|m| m.issuer.clone()),
            SiteColumn::Sans => from_cert(|m| m.sans.join(",")),
            SiteColumn::Renew => yes_no(self.needs_renewal),
            SiteColumn::Bundle => self.bundle.clone(),
        }
    }
}
