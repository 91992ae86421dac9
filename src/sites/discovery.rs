use crate::cert::Subject;
use crate::utils::errors::{FsContext, PerseusError, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory names that count as hostnames.
pub const DOMAIN_PATTERN: &str = r"^([a-z0-9-]+\.)+[a-z]{2,4}$";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    pub domain: String,
    pub name: String,
    pub slug: String,
    pub web_root: PathBuf,
}

impl Site {
    pub fn subject(&self) -> Result<Subject> {
        Subject::new(&self.domain, &self.name)
    }
}

/// Finds `{web_path}/{domain}/{name}` site directories.
pub struct SiteDiscovery {
    web_path: PathBuf,
    pattern: Regex,
}

impl SiteDiscovery {
    pub fn new(web_path: impl Into<PathBuf>) -> Result<Self> {
        let pattern = Regex::new(DOMAIN_PATTERN)
            .map_err(|e| PerseusError::Config(format!("Invalid domain pattern: {e}")))?;
        Ok(Self {
            web_path: web_path.into(),
            pattern,
        })
    }

    pub fn is_hostname(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// Sites sorted by name. A missing web path yields no sites.
    pub fn discover(&self) -> Result<Vec<Site>> {
        if !self.web_path.is_dir() {
            tracing::warn!("Web path {} does not exist", self.web_path.display());
            return Ok(Vec::new());
        }

        let mut sites = Vec::new();
        for domain_dir in self.matching_dirs(&self.web_path)? {
            for site_dir in self.matching_dirs(&domain_dir)? {
                let domain = dir_name(&domain_dir);
                let name = dir_name(&site_dir);
                let web_root = fs::canonicalize(&site_dir).fs_context(&site_dir)?;
                tracing::debug!("Found site: {name} ({domain})");
                sites.push(Site {
                    slug: name.replace('.', "-"),
                    domain,
                    name,
                    web_root,
                });
            }
        }

        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    fn matching_dirs(&self, parent: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(parent).fs_context(parent)? {
            let path = entry.fs_context(parent)?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.is_hostname(n));
            if path.is_dir() && matches {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_pattern() {
        let discovery = SiteDiscovery::new("/nonexistent").unwrap();
        assert!(discovery.is_hostname("example.com"));
        assert!(discovery.is_hostname("blog.example.co.uk"));
        assert!(discovery.is_hostname("my-site.example.info"));
        assert!(!discovery.is_hostname("localhost"));
        assert!(!discovery.is_hostname("Example.com"));
        assert!(!discovery.is_hostname("example.technology"));
        assert!(!discovery.is_hostname("under_score.com"));
    }

    #[test]
    fn test_discover_sorts_and_skips_non_sites() {
        let tmp = tempfile::tempdir().unwrap();
        let web = tmp.path();
        fs::create_dir_all(web.join("example.com/shop.example.com")).unwrap();
        fs::create_dir_all(web.join("example.com/blog.example.com")).unwrap();
        fs::create_dir_all(web.join("example.com/not_a_site")).unwrap();
        fs::create_dir_all(web.join("other.org/a.other.org")).unwrap();
        fs::create_dir_all(web.join("tmp/x.example.com")).unwrap();
        fs::write(web.join("example.com/file.example.com"), "").unwrap();

        let sites = SiteDiscovery::new(web).unwrap().discover().unwrap();
        let names: Vec<_> = sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a.other.org", "blog.example.com", "shop.example.com"]);

        let blog = &sites[1];
        assert_eq!(blog.domain, "example.com");
        assert_eq!(blog.slug, "blog-example-com");
        assert!(blog.web_root.is_absolute());
        assert_eq!(blog.subject().unwrap().name(), "blog.example.com");
    }

    #[test]
    fn test_missing_web_path_is_empty() {
        let sites = SiteDiscovery::new("/nonexistent/perseus/www")
            .unwrap()
            .discover()
            .unwrap();
        assert!(sites.is_empty());
    }
}
