//! In-memory index source

use super::{PackageIndex, PackageMetadata};
use crate::error::ResolveError;
use async_trait::async_trait;
use semver::Version;
use std::collections::BTreeMap;

/// Index source backed by a map; used for embedding and tests
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    name: String,
    packages: BTreeMap<String, BTreeMap<Version, PackageMetadata>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Add one package version
    pub fn with_package(mut self, metadata: PackageMetadata) -> Self {
        self.insert(metadata);
        self
    }

    pub fn insert(&mut self, metadata: PackageMetadata) {
        self.packages
            .entry(metadata.name.clone())
            .or_default()
            .insert(metadata.version.clone(), metadata);
    }
}

#[async_trait]
impl PackageIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<Version>, ResolveError> {
        Ok(self
            .packages
            .get(name)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_metadata(
        &self,
        name: &str,
        version: &Version,
    ) -> Result<PackageMetadata, ResolveError> {
        self.packages
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
            .ok_or_else(|| ResolveError::IndexQuery {
                source_name: self.name.clone(),
                name: name.to_string(),
                reason: format!("version {} not present", version),
            })
    }
}
