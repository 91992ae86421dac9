use crate::cert::authority::AuthorityContext;
use crate::cert::listing::SiteStatus;
use crate::cert::renewal::{RenewalFlags, RenewalPolicyEngine, SubjectOutcome};
use crate::cert::Subject;
use crate::sites::Site;
use crate::storage::ArtifactWriter;
use crate::utils::errors::{PerseusError, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Result of one run over a set of subjects.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<SubjectOutcome>,
    pub failures: Vec<(Subject, PerseusError)>,
}

impl RunReport {
    /// Bundles (re)written during the run. The proxy only needs a reload
    /// when this is non-empty.
    pub fn bundles_written(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter(|o| o.bundle_written())
            .map(|o| o.bundle_path.clone())
            .collect()
    }

    pub fn unchanged(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_unchanged()).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Entry point tying the root, the renewal engine and the artifact tree
/// together for a whole run.
pub struct CertificateService {
    authority: AuthorityContext,
    writer: ArtifactWriter,
}

impl CertificateService {
    pub fn new(authority: AuthorityContext, writer: ArtifactWriter) -> Self {
        Self { authority, writer }
    }

    pub fn authority(&self) -> &AuthorityContext {
        &self.authority
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    pub fn run(&self, subjects: &[Subject], flags: RenewalFlags) -> Result<RunReport> {
        self.run_at(subjects, flags, Utc::now())
    }

    /// Process every subject. A failure to load the root aborts the run;
    /// any other failure is recorded and the next subject is tried.
    pub fn run_at(
        &self,
        subjects: &[Subject],
        flags: RenewalFlags,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let engine = RenewalPolicyEngine::new(&self.authority, &self.writer, flags);
        let mut report = RunReport::default();

        for subject in subjects {
            match engine.ensure_at(subject, now) {
                Ok(outcome) => {
                    if !outcome.is_unchanged() {
                        tracing::info!("{subject}: wrote {:?}", outcome.written);
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!("{subject}: {e}");
                    report.failures.push((subject.clone(), e));
                }
            }
        }

        if let Some(outcome) = self.authority.load_outcome() {
            if outcome.is_fresh() {
                tracing::info!(
                    "Root authority was (re)generated at {}",
                    self.authority.store().root_dir().display()
                );
            }
        }

        Ok(report)
    }

    pub fn status(&self, sites: &[Site], flags: RenewalFlags) -> Vec<SiteStatus> {
        SiteStatus::for_sites(&self.writer, sites, flags.auto_renew_days, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::tests::credentials;
    use crate::cert::authority::CertificateAuthorityStore;
    use crate::storage::ArtifactKind;
    use std::fs;
    use std::path::Path;

    fn service(root: &Path, password: Option<&str>) -> CertificateService {
        CertificateService::new(
            AuthorityContext::new(CertificateAuthorityStore::new(root), credentials(password)),
            ArtifactWriter::new(root),
        )
    }

    fn subjects() -> Vec<Subject> {
        vec![
            Subject::new("example.com", "blog.example.com").unwrap(),
            Subject::new("example.com", "shop.example.com").unwrap(),
        ]
    }

    #[test]
    fn test_first_run_writes_bundles_and_second_is_quiet() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Some("secret"));

        let report = service.run(&subjects(), RenewalFlags::default()).unwrap();
        assert!(!report.has_failures());
        assert_eq!(report.bundles_written().len(), 2);
        assert!(service.authority().load_outcome().unwrap().is_fresh());

        // Fresh context, as on the next invocation
        let service = self::service(tmp.path(), Some("secret"));
        let report = service.run(&subjects(), RenewalFlags::default()).unwrap();
        assert!(report.bundles_written().is_empty());
        assert_eq!(report.unchanged(), 2);
        assert!(!service.authority().is_loaded());
    }

    #[test]
    fn test_subject_failure_does_not_stop_run() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), None);
        let subjects = subjects();

        // A directory where the key file should be makes this subject fail
        let blocked = service.writer().paths(&subjects[0]);
        fs::create_dir_all(blocked.path(ArtifactKind::PrivateKey)).unwrap();

        let report = service.run(&subjects, RenewalFlags::default()).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, subjects[0]);
        assert_eq!(report.bundles_written().len(), 1);
    }

    #[test]
    fn test_root_failure_aborts_run() {
        let tmp = tempfile::tempdir().unwrap();
        CertificateAuthorityStore::new(tmp.path())
            .load_or_create(&credentials(Some("right")))
            .unwrap();

        let service = service(tmp.path(), Some("wrong"));
        let err = service
            .run(&subjects(), RenewalFlags::default())
            .unwrap_err();
        assert!(err.is_fatal());
        for subject in subjects() {
            assert!(!service.writer().paths(&subject).presence().any());
        }
    }
}
