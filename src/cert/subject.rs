use crate::utils::errors::{PerseusError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A site whose certificate material lives under `{domain}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    domain: String,
    name: String,
}

impl Subject {
    /// Both parts become directory names, so anything that could escape the
    /// authority root is rejected.
    pub fn new(domain: &str, name: &str) -> Result<Self> {
        validate_component("domain", domain)?;
        validate_component("subdomain", name)?;
        Ok(Self {
            domain: domain.to_string(),
            name: name.to_string(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The subdomain name, used as CN and first SAN
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `[name, www.name]`
    pub fn dns_names(&self) -> Vec<String> {
        vec![self.name.clone(), format!("www.{}", self.name)]
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.name)
    }
}

fn validate_component(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(PerseusError::InvalidInput(format!(
            "Invalid {kind} name: '{value}'"
        )))
    }
}
