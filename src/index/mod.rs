//! Package index sources
//!
//! The resolver never talks to a registry directly. It consults a
//! [`PackageIndex`] for the versions of a package and for the metadata of one
//! version (its own requirements, the settings it is sensitive to, and the
//! interface a consumer needs to link against it).
//!
//! Several sources can be configured. They are kept in an [`IndexSet`] in
//! declaration order; that order is the first tie-break when two sources offer
//! the same version.

mod fs;
mod http;
mod memory;

pub use fs::FsIndex;
pub use http::HttpIndex;
pub use memory::MemoryIndex;

use crate::error::ResolveError;
use crate::recipe::{parse_version, validate_package_name, RequirementSpec};
use crate::settings::Sensitivity;
use async_trait::async_trait;
use futures_util::future::join_all;
use semver::Version;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Metadata file name inside a package version directory
pub const METADATA_FILE: &str = "package.toml";

/// A source of package versions and metadata.
///
/// Implementations only read. `open` is called once before resolution and
/// `close` once after it, whatever the outcome.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Human-readable source name used in diagnostics
    fn name(&self) -> &str;

    async fn open(&self) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ResolveError> {
        Ok(())
    }

    /// Versions available for `name`, ascending. Empty if the source does
    /// not know the package.
    async fn list_versions(&self, name: &str) -> Result<Vec<Version>, ResolveError>;

    /// Requirements, settings sensitivity and interface of one version
    async fn fetch_metadata(&self, name: &str, version: &Version)
        -> Result<PackageMetadata, ResolveError>;
}

/// Link interface of a package, relative to its install directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageInterface {
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub libs: Vec<String>,
    pub system_libs: Vec<String>,
    pub defines: Vec<String>,
    pub cxxflags: Vec<String>,
}

impl Default for PackageInterface {
    fn default() -> Self {
        Self {
            include_dirs: vec!["include".to_string()],
            lib_dirs: vec!["lib".to_string()],
            libs: vec![],
            system_libs: vec![],
            defines: vec![],
            cxxflags: vec![],
        }
    }
}

/// Declared metadata of one package version
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    pub name: String,
    pub version: Version,
    pub settings: Sensitivity,
    pub requires: Vec<RequirementSpec>,
    pub interface: PackageInterface,
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    package: PackageSection,
    #[serde(default)]
    interface: PackageInterface,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageSection {
    name: String,
    version: String,
    #[serde(default)]
    settings: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
}

impl PackageMetadata {
    /// Parse a `package.toml` document
    pub fn parse(content: &str) -> Result<Self, String> {
        let file: MetadataFile = toml::from_str(content).map_err(|e| e.to_string())?;
        let section = file.package;

        validate_package_name(&section.name)?;
        let version = parse_version(&section.version)?;
        let settings = Sensitivity::from_names(&section.settings).map_err(|e| e.to_string())?;
        let requires = section
            .requires
            .iter()
            .map(|spec| RequirementSpec::parse(spec).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: section.name,
            version,
            settings,
            requires,
            interface: file.interface,
        })
    }
}

/// One version offered by one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub version: Version,
    /// Position of the offering source in the [`IndexSet`]
    pub source: usize,
}

impl Candidate {
    /// Identifier used as the final tie-break (full version text, including
    /// build metadata)
    pub fn identifier(&self) -> String {
        self.version.to_string()
    }
}

/// Ordered collection of index sources
#[derive(Clone, Default)]
pub struct IndexSet {
    sources: Vec<Arc<dyn PackageIndex>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source; earlier sources win ties
    pub fn with_source(mut self, source: Arc<dyn PackageIndex>) -> Self {
        self.sources.push(source);
        self
    }

    /// Build from configured source specs (`https://...` or a directory path)
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Self {
        specs
            .iter()
            .fold(Self::new(), |set, spec| set.with_source(source_from_spec(spec.as_ref())))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn source_name(&self, source: usize) -> &str {
        self.sources.get(source).map(|s| s.name()).unwrap_or("<unknown>")
    }

    /// Open every source in order. If one fails, the ones already opened are
    /// closed again before the error is returned.
    pub async fn open(&self) -> Result<(), ResolveError> {
        for (opened, source) in self.sources.iter().enumerate() {
            debug!("Opening index {}", source.name());
            if let Err(e) = source.open().await {
                for earlier in &self.sources[..opened] {
                    if let Err(close_err) = earlier.close().await {
                        debug!("Closing index {} after failed open: {}", earlier.name(), close_err);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Close every source, returning the first failure
    pub async fn close(&self) -> Result<(), ResolveError> {
        let mut first_error = None;
        for source in &self.sources {
            debug!("Closing index {}", source.name());
            if let Err(e) = source.close().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// All versions of `name` across sources, queried concurrently and
    /// returned in source order.
    pub async fn candidates(&self, name: &str) -> Result<Vec<Candidate>, ResolveError> {
        let results = join_all(self.sources.iter().map(|s| s.list_versions(name))).await;

        let mut candidates = Vec::new();
        for (source, result) in results.into_iter().enumerate() {
            for version in result? {
                candidates.push(Candidate { version, source });
            }
        }
        Ok(candidates)
    }

    pub async fn metadata(&self, name: &str, candidate: &Candidate) -> Result<PackageMetadata, ResolveError> {
        let source = self.sources.get(candidate.source).ok_or_else(|| ResolveError::IndexQuery {
            source_name: "<unknown>".to_string(),
            name: name.to_string(),
            reason: format!("no index source at position {}", candidate.source),
        })?;
        source.fetch_metadata(name, &candidate.version).await
    }
}

/// Create an index source from a config/CLI spec
pub fn source_from_spec(spec: &str) -> Arc<dyn PackageIndex> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        Arc::new(HttpIndex::new(spec))
    } else {
        Arc::new(FsIndex::new(PathBuf::from(spec)))
    }
}
