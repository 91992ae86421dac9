use crate::service::ProxyMode;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Ten years; leaf certificates are valid for one.
pub const MAX_AUTO_RENEW_DAYS: i64 = 3650;

#[derive(Parser)]
#[command(name = "perseus-tls")]
#[command(version = "1.0.0")]
#[command(about = "Local certificate authority and TLS certificate manager for reverse-proxied sites")]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration directory (default: ~/.config/perseus-tls)
    #[arg(long, env = "PERSEUS_CONFIG_DIR", value_hint = clap::ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long, global = true)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover sites, bring their certificates up to date and reload the proxy
    Apply {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        password: PasswordArgs,

        #[command(flatten)]
        renewal: RenewalArgs,

        /// Directory containing {domain}/{subdomain} site folders
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        web_path: Option<PathBuf>,

        /// How the reverse proxy is deployed
        #[arg(long, value_enum)]
        proxy_mode: Option<ProxyMode>,

        /// Proxy service or container name
        #[arg(long)]
        proxy_name: Option<String>,

        /// Do not start or reload the proxy
        #[arg(long)]
        skip_service_restart: bool,

        /// Do not save the effective settings
        #[arg(long)]
        no_save: bool,
    },
    /// Ensure certificate material for a single site
    Issue {
        /// Parent domain, e.g. example.com
        domain: String,

        /// Site name, e.g. blog.example.com
        subdomain: String,

        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        password: PasswordArgs,

        #[command(flatten)]
        renewal: RenewalArgs,
    },
    /// Show certificate state of discovered sites
    Status {
        /// Directory containing {domain}/{subdomain} site folders
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        web_path: Option<PathBuf>,

        /// Authority root directory
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        root_ca_path: Option<PathBuf>,

        /// Days before expiry at which a certificate counts as due
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=MAX_AUTO_RENEW_DAYS))]
        auto_renew_days: Option<u32>,

        /// Columns to display (comma-separated). Prefix with + to add to defaults.
        /// Available: name, domain, cert, serial, not_before, not_after, issuer, sans, renew, bundle
        #[arg(long, short = 'c')]
        columns: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Root certificate authority management
    Ca {
        #[command(subcommand)]
        command: CaCommands,
    },
    /// Generate shell completion scripts
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CaCommands {
    /// Create the root key and certificate if missing
    Init {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Show the root certificate
    Show {
        /// Authority root directory
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        root_ca_path: Option<PathBuf>,
    },
    /// Replace the root key and certificate. Every issued certificate becomes untrusted.
    Rotate {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        password: PasswordArgs,

        /// Confirm the rotation
        #[arg(long)]
        yes: bool,
    },
}

/// Authority location and identity
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Authority root directory
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub root_ca_path: Option<PathBuf>,

    /// Country code (C) for root and requests
    #[arg(long)]
    pub country: Option<String>,

    /// State or province (ST)
    #[arg(long)]
    pub state: Option<String>,

    /// Organisation (O)
    #[arg(long)]
    pub organisation: Option<String>,
}

/// Root key password
#[derive(Args, Debug, Clone, Default)]
pub struct PasswordArgs {
    /// Root key password
    #[arg(long, env = "PERSEUS_CA_PASSWORD", hide_env_values = true)]
    pub root_ca_password: Option<String>,

    /// Prompt for the root key password
    #[arg(long, conflicts_with_all = ["root_ca_password", "no_password"])]
    pub ask_password: bool,

    /// Store the root key unencrypted
    #[arg(long, conflicts_with = "root_ca_password")]
    pub no_password: bool,
}

/// Per-run renewal overrides
#[derive(Args, Debug, Clone, Default)]
pub struct RenewalArgs {
    /// Regenerate private keys (and everything derived from them)
    #[arg(long)]
    pub renew_keys: bool,

    /// Regenerate signing requests and certificates
    #[arg(long)]
    pub renew_csrs: bool,

    /// Re-issue certificates
    #[arg(long)]
    pub renew_crts: bool,

    /// Days before expiry at which a certificate is re-issued
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=MAX_AUTO_RENEW_DAYS))]
    pub auto_renew_days: Option<u32>,
}
