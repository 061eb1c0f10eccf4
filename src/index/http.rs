//! HTTP index source
//!
//! Reads `{base}/{name}/versions.json` (a JSON array of version strings) and
//! `{base}/{name}/{version}/package.toml`. A 404 on the version list means
//! the source does not know the package. Requests run on the blocking pool
//! and are never retried here.

use super::{PackageIndex, PackageMetadata, METADATA_FILE};
use crate::error::ResolveError;
use crate::recipe::parse_version;
use async_trait::async_trait;
use semver::Version;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Index source served over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpIndex {
    base_url: String,
}

impl HttpIndex {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn query_error(&self, name: &str, reason: impl Into<String>) -> ResolveError {
        ResolveError::IndexQuery {
            source_name: self.base_url.clone(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// GET a URL as text; `Ok(None)` on 404
    async fn get_text(&self, name: &str, url: String) -> Result<Option<String>, ResolveError> {
        debug!("GET {}", url);
        let result = tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build()
                .into();
            match agent.get(&url).call() {
                Ok(mut response) => response
                    .body_mut()
                    .read_to_string()
                    .map(Some)
                    .map_err(|e| e.to_string()),
                Err(ureq::Error::StatusCode(404)) => Ok(None),
                Err(e) => Err(e.to_string()),
            }
        })
        .await
        .map_err(|e| self.query_error(name, format!("request task failed: {}", e)))?;

        result.map_err(|reason| self.query_error(name, reason))
    }
}

#[async_trait]
impl PackageIndex for HttpIndex {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<Version>, ResolveError> {
        let url = format!("{}/{}/versions.json", self.base_url, name);
        let Some(body) = self.get_text(name, url).await? else {
            return Ok(vec![]);
        };
        parse_version_list(&body).map_err(|reason| self.query_error(name, reason))
    }

    async fn fetch_metadata(
        &self,
        name: &str,
        version: &Version,
    ) -> Result<PackageMetadata, ResolveError> {
        let url = format!("{}/{}/{}/{}", self.base_url, name, version, METADATA_FILE);
        let body = self
            .get_text(name, url)
            .await?
            .ok_or_else(|| self.query_error(name, format!("version {} not present", version)))?;
        PackageMetadata::parse(&body).map_err(|reason| self.query_error(name, reason))
    }
}

/// Parse a `versions.json` body into ascending versions
fn parse_version_list(body: &str) -> Result<Vec<Version>, String> {
    let raw: Vec<String> = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let mut versions = raw
        .iter()
        .map(|v| parse_version(v))
        .collect::<Result<Vec<_>, _>>()?;
    versions.sort();
    Ok(versions)
}
