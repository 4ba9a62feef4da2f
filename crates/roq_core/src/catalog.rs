//! The service catalog: every supported service keyed by identifier.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::service::{ServiceConfig, ServiceRecord};

/// Catalog bundled into the binary at build time.
pub const BUNDLED_CATALOG: &str = include_str!("../services.toml");

/// Read-only mapping from service identifier to verification rules.
///
/// Built once at startup and never mutated, so a single instance can be
/// shared across concurrent verifications behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: BTreeMap<Box<str>, ServiceConfig>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    services: BTreeMap<String, ServiceRecord>,
}

impl Catalog {
    /// Parses the catalog bundled with this crate.
    pub fn load() -> Result<Self, CatalogError> {
        parse_toml(Path::new("<bundled>"), BUNDLED_CATALOG)
    }

    /// Loads a catalog from a TOML file on disk.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        parse_toml(path, &content)
    }

    /// Parses a catalog from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        parse_toml(Path::new("<inline>"), content)
    }

    /// Builds a catalog from already constructed service configs.
    ///
    /// Identifiers are lower-cased; two entries that collide after
    /// lower-casing are rejected.
    pub fn from_services(services: impl IntoIterator<Item = ServiceConfig>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();

        for mut service in services {
            let id: Box<str> = service.id.to_lowercase().into();
            if map.contains_key(&id) {
                return Err(CatalogError::DuplicateService { id: id.into() });
            }
            service.id.clone_from(&id);
            map.insert(id, service);
        }

        Ok(Self { services: map })
    }

    /// Looks up a service by identifier, ignoring case.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&ServiceConfig> {
        self.services.get(id.to_lowercase().as_str())
    }

    /// Returns an iterator over all services, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.values()
    }

    /// Returns the number of services in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if the catalog has no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn parse_toml(path: &Path, content: &str) -> Result<Catalog, CatalogError> {
    let file: CatalogFile = toml::from_str(content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let services = file
        .services
        .into_iter()
        .map(|(id, record)| {
            record.into_config(&id).map_err(|e| CatalogError::InvalidService {
                id,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let catalog = Catalog::from_services(services)?;

    #[cfg(feature = "tracing")]
    debug!(path = %path.display(), services = catalog.len(), "catalog loaded");

    Ok(catalog)
}

/// Errors that can occur when loading the service catalog.
///
/// All of them are fatal: no verification can run without a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read from disk.
    #[error("failed to read catalog '{path}': {source}")]
    Read {
        /// Path to the catalog file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file contained invalid TOML or an unknown enum value.
    #[error("failed to parse catalog '{path}': {source}")]
    Parse {
        /// Path to the catalog file that could not be parsed.
        path: PathBuf,
        /// The underlying TOML deserialisation error.
        #[source]
        source: toml::de::Error,
    },

    /// An entry was well-formed TOML but missing fields its strategy needs.
    #[error("invalid service '{id}': {reason}")]
    InvalidService {
        /// Identifier of the offending entry.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two entries share an identifier once lower-cased.
    #[error("duplicate service '{id}' in catalog")]
    DuplicateService {
        /// The colliding identifier.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ManualSpec, ResponseKind, SdkKind, Strategy};

    #[test]
    fn bundled_catalog_loads() {
        let catalog = Catalog::load().unwrap();
        assert!(!catalog.is_empty());
    }

    #[test]
    fn bundled_catalog_has_github() {
        let catalog = Catalog::load().unwrap();
        let github = catalog.lookup("github").unwrap();

        assert_eq!(github.name.as_ref(), "GitHub");
        let Strategy::Http(spec) = &github.strategy else {
            panic!("github should use the http strategy");
        };
        assert_eq!(spec.response.kind, ResponseKind::Json);
        assert_eq!(spec.response.details_format.as_deref(), Some("user: {{.login}}"));
    }

    #[test]
    fn bundled_catalog_has_aws_sdk_entry() {
        let catalog = Catalog::load().unwrap();
        let aws = catalog.lookup("aws").unwrap();

        assert!(aws.requires_secret());
        assert!(matches!(&aws.strategy, Strategy::Sdk(spec) if spec.kind == SdkKind::Aws));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = Catalog::load().unwrap();
        assert!(catalog.lookup("GitHub").is_some());
        assert!(catalog.lookup("GITHUB").is_some());
    }

    #[test]
    fn lookup_unknown_returns_none() {
        let catalog = Catalog::load().unwrap();
        assert!(catalog.lookup("foobar").is_none());
    }

    #[test]
    fn ids_are_lowercased_at_load() {
        let catalog = Catalog::from_toml(
            r#"
            [services.MyService]
            name = "My Service"
            method = "MANUAL"
            message = "Cannot verify automatically"
            "#,
        )
        .unwrap();

        let service = catalog.lookup("myservice").unwrap();
        assert_eq!(service.id.as_ref(), "myservice");
        assert!(matches!(&service.strategy, Strategy::Manual(ManualSpec { details: None, .. })));
    }

    #[test]
    fn case_colliding_ids_are_rejected() {
        let err = Catalog::from_toml(
            r#"
            [services.github]
            name = "GitHub"
            method = "MANUAL"
            message = "a"

            [services.GitHub]
            name = "GitHub"
            method = "MANUAL"
            message = "b"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, CatalogError::DuplicateService { ref id } if id == "github"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Catalog::from_toml("[services.github\nname = ").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn unknown_response_type_is_a_parse_error() {
        let err = Catalog::from_toml(
            r#"
            [services.example]
            name = "Example"
            method = "GET"
            url = "https://example.com"
            response_type = "xml"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn missing_url_is_an_invalid_service() {
        let err = Catalog::from_toml(
            r#"
            [services.example]
            name = "Example"
            method = "GET"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidService { ref id, .. } if id == "example"));
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Catalog::from_path(Path::new("/nonexistent/services.toml")).unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.toml");
        std::fs::write(
            &path,
            r#"
            [services.example]
            name = "Example"
            method = "GET"
            url = "https://example.com/{{.Key}}"
            "#,
        )
        .unwrap();

        let catalog = Catalog::from_path(&path).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn iter_is_sorted_by_id() {
        let catalog = Catalog::load().unwrap();
        let ids: Vec<_> = catalog.iter().map(|s| s.id.as_ref()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
