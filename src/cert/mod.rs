pub mod authority;
pub mod listing;
pub mod metadata;
pub mod parser;
pub mod renewal;
pub mod request;
pub mod serial;
pub mod service;
pub mod sign;
pub mod subject;

pub use authority::{AuthorityContext, CertificateAuthorityStore, RootAuthority, RootCredentials};
pub use listing::{SiteColumn, SiteStatus};
pub use metadata::CertificateMetadata;
pub use parser::CertificateParser;
pub use renewal::{RenewalFlags, RenewalPlan, RenewalPolicyEngine};
pub use request::CertificateRequestBuilder;
pub use serial::SerialNumber;
pub use service::{CertificateService, RunReport};
pub use sign::CertificateIssuer;
pub use subject::Subject;
