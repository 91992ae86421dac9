use crate::utils::errors::{PerseusError, Result};
use crate::utils::files::{self, MODE_SECRET};
use crate::utils::paths::PerseusPaths;
use rand::distr::{Alphanumeric, SampleString};
use std::path::Path;

pub const GENERATED_PASSWORD_LEN: usize = 24;

/// Where the root key password came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    Explicit,
    Prompt,
    File,
    Generated,
    None,
}

#[derive(Clone)]
pub struct ResolvedPassword {
    value: Option<String>,
    source: PasswordSource,
}

impl ResolvedPassword {
    pub fn none() -> Self {
        Self {
            value: None,
            source: PasswordSource::None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn source(&self) -> PasswordSource {
        self.source
    }
}

impl std::fmt::Debug for ResolvedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPassword")
            .field("set", &self.value.is_some())
            .field("source", &self.source)
            .finish()
    }
}

/// How the caller wants the password obtained.
#[derive(Debug, Clone, Default)]
pub struct PasswordRequest {
    pub explicit: Option<String>,
    pub prompt: bool,
    pub disabled: bool,
}

/// Resolve the root key password.
///
/// Order: disabled, explicit value, interactive prompt, `password.txt`, and
/// finally a freshly generated password saved to `password.txt`. A password
/// is only generated when no root key exists yet; an existing encrypted key
/// with no known password must fail to load rather than be replaced.
pub fn resolve_password(authority_root: &Path, request: &PasswordRequest) -> Result<ResolvedPassword> {
    if request.disabled {
        return Ok(ResolvedPassword::none());
    }

    if let Some(explicit) = &request.explicit {
        return Ok(non_empty(explicit.clone(), PasswordSource::Explicit));
    }

    if request.prompt {
        let entered = rpassword::prompt_password("Root CA password: ")
            .map_err(|e| PerseusError::InvalidInput(format!("Failed to read password: {e}")))?;
        return Ok(non_empty(entered, PasswordSource::Prompt));
    }

    let password_file = PerseusPaths::password_file(authority_root);
    if password_file.exists() {
        let stored = files::read_text(&password_file)?;
        tracing::debug!("Using root CA password from {}", password_file.display());
        return Ok(non_empty(stored.trim().to_string(), PasswordSource::File));
    }

    if PerseusPaths::root_key(authority_root).exists() {
        tracing::debug!("Root key exists and no password is configured");
        return Ok(ResolvedPassword::none());
    }

    tracing::warn!("No CA password provided and password.txt not found");
    let generated = generate_password();
    PerseusPaths::ensure_dir_exists(authority_root)?;
    files::write_file_atomic(&password_file, generated.as_bytes(), MODE_SECRET)?;
    tracing::info!("Generated new CA password and saved to {}", password_file.display());

    Ok(ResolvedPassword {
        value: Some(generated),
        source: PasswordSource::Generated,
    })
}

pub fn generate_password() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), GENERATED_PASSWORD_LEN)
}

fn non_empty(value: String, source: PasswordSource) -> ResolvedPassword {
    if value.is_empty() {
        ResolvedPassword::none()
    } else {
        ResolvedPassword {
            value: Some(value),
            source,
        }
    }
}
