//! Filesystem index source
//!
//! Layout: `{root}/{name}/{version}/package.toml`. Directory names are parsed
//! leniently (`1.46` is `1.46.0`); entries that do not parse are skipped.

use super::{PackageIndex, PackageMetadata, METADATA_FILE};
use crate::error::ResolveError;
use crate::recipe::parse_version;
use async_trait::async_trait;
use semver::Version;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Index source reading a directory tree
#[derive(Debug, Clone)]
pub struct FsIndex {
    root: PathBuf,
    name: String,
}

impl FsIndex {
    pub fn new(root: PathBuf) -> Self {
        let name = root.display().to_string();
        Self { root, name }
    }

    fn query_error(&self, name: &str, reason: impl Into<String>) -> ResolveError {
        ResolveError::IndexQuery {
            source_name: self.name.clone(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Version directories of a package, paired with their parsed version
    async fn version_dirs(&self, name: &str) -> Result<Vec<(Version, PathBuf)>, ResolveError> {
        let package_dir = self.root.join(name);
        let mut entries = match tokio::fs::read_dir(&package_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(self.query_error(name, e.to_string())),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.query_error(name, e.to_string()))?
        {
            let path = entry.path();
            if !path.join(METADATA_FILE).is_file() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            match parse_version(&dir_name) {
                Ok(version) => found.push((version, path)),
                Err(reason) => warn!("Skipping {}: {}", path.display(), reason),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

#[async_trait]
impl PackageIndex for FsIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), ResolveError> {
        if !self.root.is_dir() {
            return Err(self.query_error("*", "index directory does not exist"));
        }
        Ok(())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<Version>, ResolveError> {
        let versions: Vec<Version> = self
            .version_dirs(name)
            .await?
            .into_iter()
            .map(|(version, _)| version)
            .collect();
        debug!("{}: {} versions of {}", self.name, versions.len(), name);
        Ok(versions)
    }

    async fn fetch_metadata(
        &self,
        name: &str,
        version: &Version,
    ) -> Result<PackageMetadata, ResolveError> {
        let dir = self
            .version_dirs(name)
            .await?
            .into_iter()
            .find(|(v, _)| v == version)
            .map(|(_, dir)| dir)
            .ok_or_else(|| self.query_error(name, format!("version {} not present", version)))?;

        let path = dir.join(METADATA_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| self.query_error(name, format!("reading {}: {}", path.display(), e)))?;
        let metadata = PackageMetadata::parse(&content)
            .map_err(|e| self.query_error(name, format!("{}: {}", path.display(), e)))?;

        if metadata.name != name {
            return Err(self.query_error(
                name,
                format!("{} declares package '{}'", path.display(), metadata.name),
            ));
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_package(root: &std::path::Path, name: &str, dir: &str, body: &str) {
        let path = root.join(name).join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(METADATA_FILE), body).unwrap();
    }

    #[tokio::test]
    async fn lists_versions_sorted() {
        let temp = TempDir::new().unwrap();
        for v in ["10.2.0", "10.1.0"] {
            write_package(
                temp.path(),
                "fmt",
                v,
                &format!("[package]\nname = \"fmt\"\nversion = \"{}\"\n", v),
            );
        }
        // Not a version directory
        std::fs::create_dir_all(temp.path().join("fmt").join("latest")).unwrap();

        let index = FsIndex::new(temp.path().to_path_buf());
        let versions = index.list_versions("fmt").await.unwrap();
        assert_eq!(versions, vec![Version::new(10, 1, 0), Version::new(10, 2, 0)]);
    }

    #[tokio::test]
    async fn unknown_package_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = FsIndex::new(temp.path().to_path_buf());
        assert!(index.list_versions("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_metadata_matches_lenient_dir_names() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            "libuv",
            "1.46",
            "[package]\nname = \"libuv\"\nversion = \"1.46\"\n\n[interface]\nlibs = [\"uv\"]\n",
        );

        let index = FsIndex::new(temp.path().to_path_buf());
        let meta = index
            .fetch_metadata("libuv", &Version::new(1, 46, 0))
            .await
            .unwrap();
        assert_eq!(meta.interface.libs, vec!["uv"]);
    }

    #[tokio::test]
    async fn fetch_metadata_rejects_name_mismatch() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            "zlib",
            "1.3.0",
            "[package]\nname = \"zlib-ng\"\nversion = \"1.3.0\"\n",
        );

        let index = FsIndex::new(temp.path().to_path_buf());
        let err = index
            .fetch_metadata("zlib", &Version::new(1, 3, 0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zlib-ng"));
    }

    #[tokio::test]
    async fn open_requires_root() {
        let temp = TempDir::new().unwrap();
        let index = FsIndex::new(temp.path().join("missing"));
        assert!(index.open().await.is_err());
    }
}
