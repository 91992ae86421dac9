pub mod cert;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod service;
pub mod sites;
pub mod storage;
pub mod utils;

// Re-export specific items to avoid conflicts
pub use cert::{
    CertificateAuthorityStore, CertificateIssuer, CertificateMetadata, CertificateParser,
    CertificateRequestBuilder, CertificateService, RenewalPolicyEngine, Subject,
};
pub use cli::{args, commands};
pub use config::Settings;
pub use crypto::KeyMaterialCodec;
pub use storage::ArtifactWriter;
pub use utils::{errors, paths};
