use crate::cert::listing::DEFAULT_STATUS_COLUMNS;
use crate::cert::{
    AuthorityContext, CertificateAuthorityStore, CertificateParser, CertificateService,
    RenewalFlags, RunReport, SiteColumn, Subject,
};
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::config::{Settings, SettingsOverrides};
use crate::crypto::{resolve_password, KeyMaterialCodec, PasswordRequest, PasswordSource};
use crate::service::service_manager;
use crate::sites::SiteDiscovery;
use crate::storage::ArtifactWriter;
use crate::utils::errors::{PerseusError, Result};
use crate::utils::output::{build_table_data, parse_columns, OutputFormat};
use crate::utils::paths::PerseusPaths;
use std::io;
use std::path::{Path, PathBuf};

pub fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "perseus_tls=warn",  // Default: warnings only
            1 => "perseus_tls=info",  // -v: info level
            2 => "perseus_tls=debug", // -vv: debug level
            _ => "perseus_tls=trace", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => PerseusPaths::config_dir()?,
    };
    let progress = Progress { quiet: cli.quiet };

    match cli.command {
        Commands::Apply {
            settings,
            password,
            renewal,
            web_path,
            proxy_mode,
            proxy_name,
            skip_service_restart,
            no_save,
        } => {
            let mut overrides = overrides(&settings, &password, &renewal);
            overrides.web_path = web_path;
            overrides.proxy_mode = proxy_mode;
            overrides.proxy_name = proxy_name;
            overrides.skip_service_restart = skip_service_restart;

            let settings = Settings::load(&config_dir)?.merge(overrides);
            handle_apply(&settings, &password, &renewal, &config_dir, no_save, progress)
        }
        Commands::Issue {
            domain,
            subdomain,
            settings,
            password,
            renewal,
        } => {
            let settings =
                Settings::load(&config_dir)?.merge(overrides(&settings, &password, &renewal));
            handle_issue(&settings, &password, &renewal, &domain, &subdomain, progress)
        }
        Commands::Status {
            web_path,
            root_ca_path,
            auto_renew_days,
            columns,
            json,
        } => {
            let settings = Settings::load(&config_dir)?.merge(SettingsOverrides {
                web_path,
                root_ca_path,
                auto_renew_days,
                ..Default::default()
            });
            handle_status(&settings, columns.as_deref(), json, &output)
        }
        Commands::Ca { command } => handle_ca_command(command, &config_dir, &output, progress),
        Commands::Completion { shell } => handle_completion_command(shell),
    }
}

/// `✓` lines on stderr, silenced by `--quiet`.
#[derive(Clone, Copy)]
struct Progress {
    quiet: bool,
}

impl Progress {
    fn ok(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("✓ {message}");
        }
    }

    fn failed(&self, message: impl std::fmt::Display) {
        eprintln!("✗ {message}");
    }
}

fn overrides(
    settings: &SettingsArgs,
    password: &PasswordArgs,
    renewal: &RenewalArgs,
) -> SettingsOverrides {
    SettingsOverrides {
        root_ca_path: settings.root_ca_path.clone(),
        root_ca_password: password.root_ca_password.clone(),
        country: settings.country.clone(),
        state: settings.state.clone(),
        organisation: settings.organisation.clone(),
        auto_renew_days: renewal.auto_renew_days,
        ..Default::default()
    }
}

fn renewal_flags(settings: &Settings, renewal: &RenewalArgs) -> RenewalFlags {
    RenewalFlags {
        force_key: renewal.renew_keys,
        force_request: renewal.renew_csrs,
        force_certificate: renewal.renew_crts,
        auto_renew_days: settings.auto_renew_days,
    }
}

fn password_request(settings: &Settings, password: &PasswordArgs) -> PasswordRequest {
    PasswordRequest {
        // A prompt replaces any saved password
        explicit: if password.ask_password {
            None
        } else {
            settings.root_ca_password.clone()
        },
        prompt: password.ask_password,
        disabled: password.no_password,
    }
}

/// Root store, credentials and password resolved from the effective settings.
fn authority(
    settings: &Settings,
    password: &PasswordArgs,
    progress: Progress,
) -> Result<(PathBuf, AuthorityContext)> {
    let root = settings.authority_root()?;
    let resolved = resolve_password(&root, &password_request(settings, password))?;
    if resolved.source() == PasswordSource::Generated {
        progress.ok(format!(
            "Generated root CA password in {}",
            PerseusPaths::password_file(&root).display()
        ));
    }

    let credentials = settings.credentials(resolved.value().map(str::to_string));
    let context = AuthorityContext::new(CertificateAuthorityStore::new(&root), credentials);
    Ok((root, context))
}

fn report_outcomes(report: &RunReport, progress: Progress) {
    for outcome in &report.outcomes {
        if outcome.is_unchanged() {
            progress.ok(format!("{}: up to date", outcome.subject));
        } else {
            let written: Vec<String> = outcome.written.iter().map(|k| k.to_string()).collect();
            progress.ok(format!("{}: wrote {}", outcome.subject, written.join(", ")));
        }
    }
    for (subject, error) in &report.failures {
        progress.failed(format!("{subject}: {error}"));
    }
}

fn handle_apply(
    settings: &Settings,
    password: &PasswordArgs,
    renewal: &RenewalArgs,
    config_dir: &Path,
    no_save: bool,
    progress: Progress,
) -> Result<()> {
    let sites = SiteDiscovery::new(&settings.web_path)?.discover()?;
    tracing::info!("Discovered {} sites in {}", sites.len(), settings.web_path.display());

    let mut subjects: Vec<Subject> = Vec::with_capacity(sites.len());
    for site in &sites {
        match site.subject() {
            Ok(subject) => subjects.push(subject),
            Err(e) => progress.failed(format!("{}: {e}", site.name)),
        }
    }

    let (root, authority) = authority(settings, password, progress)?;
    let service = CertificateService::new(authority, ArtifactWriter::new(&root));
    let report = service.run(&subjects, renewal_flags(settings, renewal))?;
    report_outcomes(&report, progress);

    if !no_save {
        settings.save(config_dir)?;
    }

    let bundles = report.bundles_written();
    if bundles.is_empty() {
        tracing::info!("No certificate changed, proxy left alone");
    } else if settings.skip_service_restart {
        tracing::info!("{} bundles changed, service restart skipped", bundles.len());
    } else {
        let proxy = service_manager(settings.proxy_mode, &settings.proxy_name);
        proxy.setup()?;
        proxy.apply()?;
        progress.ok(format!("Reloaded {}", proxy.name()));
    }

    let failed = report.failures.len() + (sites.len() - subjects.len());
    if failed > 0 {
        return Err(PerseusError::PartialFailure {
            failed,
            total: sites.len(),
        });
    }
    Ok(())
}

fn handle_issue(
    settings: &Settings,
    password: &PasswordArgs,
    renewal: &RenewalArgs,
    domain: &str,
    subdomain: &str,
    progress: Progress,
) -> Result<()> {
    let subject = Subject::new(domain, subdomain)?;
    let (root, authority) = authority(settings, password, progress)?;
    let service = CertificateService::new(authority, ArtifactWriter::new(&root));

    let report = service.run(std::slice::from_ref(&subject), renewal_flags(settings, renewal))?;
    report_outcomes(&report, progress);
    if report.has_failures() {
        return Err(PerseusError::PartialFailure { failed: 1, total: 1 });
    }

    println!("{}", service.writer().paths(&subject).bundle().display());
    Ok(())
}

fn handle_status(
    settings: &Settings,
    columns: Option<&str>,
    json: bool,
    output: &OutputFormat,
) -> Result<()> {
    let sites = SiteDiscovery::new(&settings.web_path)?.discover()?;
    let root = settings.authority_root()?;

    // Status never loads the root, so no password is needed
    let service = CertificateService::new(
        AuthorityContext::new(CertificateAuthorityStore::new(&root), settings.credentials(None)),
        ArtifactWriter::new(&root),
    );
    let flags = RenewalFlags {
        auto_renew_days: settings.auto_renew_days,
        ..Default::default()
    };
    let statuses = service.status(&sites, flags);

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }
    if statuses.is_empty() {
        return Ok(());
    }

    let columns: Vec<SiteColumn> =
        parse_columns(columns, DEFAULT_STATUS_COLUMNS).map_err(PerseusError::InvalidInput)?;
    output.print_table(&build_table_data(&statuses, &columns, !output.raw));
    Ok(())
}

fn handle_ca_command(
    command: CaCommands,
    config_dir: &Path,
    output: &OutputFormat,
    progress: Progress,
) -> Result<()> {
    match command {
        CaCommands::Init { settings, password } => {
            let settings = Settings::load(config_dir)?.merge(overrides(
                &settings,
                &password,
                &RenewalArgs::default(),
            ));
            let (_, authority) = self::authority(&settings, &password, progress)?;
            let root = authority.root()?;
            let fresh = authority.load_outcome().is_some_and(|o| o.is_fresh());

            if fresh {
                progress.ok(format!("Root CA created: {}", root.subject_dn()));
            } else {
                progress.ok(format!("Root CA already present: {}", root.subject_dn()));
            }
            println!("{}", authority.store().cert_path().display());
            Ok(())
        }
        CaCommands::Show { root_ca_path } => {
            let settings = Settings::load(config_dir)?.merge(SettingsOverrides {
                root_ca_path,
                ..Default::default()
            });
            let store = CertificateAuthorityStore::new(settings.authority_root()?);
            let metadata = store.inspect_certificate()?;
            let certificate = KeyMaterialCodec::load_certificate(&store.cert_path())?;

            let mut pairs = metadata.detail_pairs();
            pairs.push((
                "SHA-256".to_string(),
                CertificateParser::fingerprint_sha256(certificate.pem_data())?,
            ));
            pairs.push((
                "Path".to_string(),
                store.cert_path().display().to_string(),
            ));
            output.print_key_value(&pairs);
            Ok(())
        }
        CaCommands::Rotate {
            settings,
            password,
            yes,
        } => {
            if !yes {
                return Err(PerseusError::InvalidInput(
                    "Rotating the root invalidates every issued certificate; pass --yes to confirm"
                        .to_string(),
                ));
            }
            let settings = Settings::load(config_dir)?.merge(overrides(
                &settings,
                &password,
                &RenewalArgs::default(),
            ));
            let (_, authority) = self::authority(&settings, &password, progress)?;
            let root = authority.store().rotate(authority.credentials())?;

            progress.ok(format!(
                "Root CA rotated, new serial {}",
                root.metadata().serial
            ));
            progress.ok("Run `perseus-tls apply --renew-crts` to re-issue site certificates");
            Ok(())
        }
    }
}
