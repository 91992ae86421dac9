use crate::cert::SerialNumber;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub serial: SerialNumber,
    pub cn: String,
    pub issuer: String,
    pub issuer_dn: String,
    pub subject_dn: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sans: Vec<String>,
    pub key_usage: Vec<String>,
    pub extended_key_usage: Vec<String>,
    pub critical_extensions: Vec<String>,
    pub is_ca: bool,
}

impl CertificateMetadata {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    pub fn expires_soon(&self, days: u32) -> bool {
        self.expires_within(days, Utc::now())
    }

    /// True when not-after falls on or before `now + days`. A window past the
    /// representable date range covers every certificate.
    pub fn expires_within(&self, days: u32, now: DateTime<Utc>) -> bool {
        match TimeDelta::try_days(i64::from(days)).and_then(|d| now.checked_add_signed(d)) {
            Some(threshold) => self.not_after <= threshold,
            None => true,
        }
    }

    pub fn is_self_signed(&self) -> bool {
        self.issuer_dn == self.subject_dn
    }

    pub fn validity_days(&self) -> i64 {
        (self.not_after - self.not_before).num_days()
    }

    /// Key-value pairs for detail views
    pub fn detail_pairs(&self) -> Vec<(String, String)> {
        let list = |values: &[String]| {
            if values.is_empty() {
                "-".to_string()
            } else {
                values.join(",")
            }
        };
        vec![
            ("Subject".to_string(), self.subject_dn.clone()),
            ("Issuer".to_string(), self.issuer_dn.clone()),
            ("Serial".to_string(), self.serial.as_colon_hex()),
            (
                "Not Before".to_string(),
                self.not_before.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
            (
                "Not After".to_string(),
                self.not_after.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ),
            ("SANs".to_string(), list(&self.sans)),
            ("Key Usage".to_string(), list(&self.key_usage)),
            ("Ext Key Usage".to_string(), list(&self.extended_key_usage)),
            ("Critical".to_string(), list(&self.critical_extensions)),
            ("CA".to_string(), self.is_ca.to_string()),
        ]
    }
}

impl fmt::Display for CertificateMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CN: {}, Serial: {}, Expires: {}",
            self.cn,
            self.serial,
            self.not_after.format("%Y-%m-%d %H:%M")
        )
    }
}
