pub mod discovery;

pub use discovery::{Site, SiteDiscovery};
