use crate::cert::authority::RootCredentials;
use crate::cert::renewal::DEFAULT_AUTO_RENEW_DAYS;
use crate::service::ProxyMode;
use crate::utils::errors::{FsContext, Result};
use crate::utils::files::{self, MODE_SECRET};
use crate::utils::paths::PerseusPaths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WEB_PATH: &str = "/mnt/www";
pub const DEFAULT_COUNTRY: &str = "RO";
pub const DEFAULT_STATE: &str = "Bucharest";
pub const DEFAULT_ORGANISATION: &str = "Perseus Reverse Proxy";
pub const DEFAULT_PROXY_NAME: &str = "nginx";

/// Persistent settings, stored as YAML in `{config_dir}/config.yaml`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Authority root; `None` means the per-user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_ca_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_ca_password: Option<String>,
    pub web_path: PathBuf,
    pub country: String,
    pub state: String,
    pub organisation: String,
    pub auto_renew_days: u32,
    pub proxy_mode: ProxyMode,
    pub proxy_name: String,
    pub skip_service_restart: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_ca_path: None,
            root_ca_password: None,
            web_path: PathBuf::from(DEFAULT_WEB_PATH),
            country: DEFAULT_COUNTRY.to_string(),
            state: DEFAULT_STATE.to_string(),
            organisation: DEFAULT_ORGANISATION.to_string(),
            auto_renew_days: DEFAULT_AUTO_RENEW_DAYS,
            proxy_mode: ProxyMode::default(),
            proxy_name: DEFAULT_PROXY_NAME.to_string(),
            skip_service_restart: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("root_ca_path", &self.root_ca_path)
            .field(
                "root_ca_password",
                &self.root_ca_password.as_ref().map(|_| "<redacted>"),
            )
            .field("web_path", &self.web_path)
            .field("country", &self.country)
            .field("state", &self.state)
            .field("organisation", &self.organisation)
            .field("auto_renew_days", &self.auto_renew_days)
            .field("proxy_mode", &self.proxy_mode)
            .field("proxy_name", &self.proxy_name)
            .field("skip_service_restart", &self.skip_service_restart)
            .finish()
    }
}

/// Values given on the command line or through the environment. Each one
/// that is set wins over the saved file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub root_ca_path: Option<PathBuf>,
    pub root_ca_password: Option<String>,
    pub web_path: Option<PathBuf>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub organisation: Option<String>,
    pub auto_renew_days: Option<u32>,
    pub proxy_mode: Option<ProxyMode>,
    pub proxy_name: Option<String>,
    pub skip_service_restart: bool,
}

impl Settings {
    /// Load saved settings, or defaults when nothing has been saved yet.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = PerseusPaths::config_file(config_dir);
        if !path.exists() {
            tracing::info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).fs_context(&path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    /// Written 0600 since it may hold the root password.
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        PerseusPaths::ensure_dir_exists(config_dir)?;
        let path = PerseusPaths::config_file(config_dir);
        let content = serde_yaml::to_string(self)?;
        files::write_file_atomic(&path, content.as_bytes(), MODE_SECRET)?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn merge(mut self, overrides: SettingsOverrides) -> Self {
        if let Some(path) = overrides.root_ca_path {
            self.root_ca_path = Some(path);
        }
        if let Some(password) = overrides.root_ca_password {
            self.root_ca_password = Some(password);
        }
        if let Some(path) = overrides.web_path {
            self.web_path = path;
        }
        if let Some(country) = overrides.country {
            self.country = country;
        }
        if let Some(state) = overrides.state {
            self.state = state;
        }
        if let Some(organisation) = overrides.organisation {
            self.organisation = organisation;
        }
        if let Some(days) = overrides.auto_renew_days {
            self.auto_renew_days = days;
        }
        if let Some(mode) = overrides.proxy_mode {
            self.proxy_mode = mode;
        }
        if let Some(name) = overrides.proxy_name {
            self.proxy_name = name;
        }
        self.skip_service_restart |= overrides.skip_service_restart;
        self
    }

    pub fn authority_root(&self) -> Result<PathBuf> {
        match &self.root_ca_path {
            Some(path) => Ok(path.clone()),
            None => PerseusPaths::default_authority_root(),
        }
    }

    /// Root identity, with the password resolved separately.
    pub fn credentials(&self, password: Option<String>) -> RootCredentials {
        RootCredentials {
            country: self.country.clone(),
            state: self.state.clone(),
            organisation: self.organisation.clone(),
            password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.country, "RO");
        assert_eq!(settings.auto_renew_days, 30);
        assert_eq!(settings.proxy_mode, ProxyMode::Native);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::default().merge(SettingsOverrides {
            root_ca_path: Some(tmp.path().join("ssl")),
            organisation: Some("Acme".to_string()),
            proxy_mode: Some(ProxyMode::Container),
            auto_renew_days: Some(14),
            ..Default::default()
        });

        settings.save(tmp.path()).unwrap();
        let loaded = Settings::load(tmp.path()).unwrap();
        assert_eq!(loaded, settings);

        let yaml = fs::read_to_string(tmp.path().join("config.yaml")).unwrap();
        assert!(yaml.contains("proxy_mode: container"));
        assert!(!yaml.contains("root_ca_password"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(tmp.path().join("config.yaml"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.yaml"), "country: DE\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.country, "DE");
        assert_eq!(settings.state, "Bucharest");
    }

    #[test]
    fn test_overrides_win_and_password_is_redacted() {
        let settings = Settings {
            root_ca_password: Some("saved".to_string()),
            ..Default::default()
        }
        .merge(SettingsOverrides {
            root_ca_password: Some("hunter2".to_string()),
            ..Default::default()
        });

        assert_eq!(settings.root_ca_password.as_deref(), Some("hunter2"));
        assert!(!format!("{settings:?}").contains("hunter2"));
        assert_eq!(settings.credentials(None).organisation, DEFAULT_ORGANISATION);
    }
}
