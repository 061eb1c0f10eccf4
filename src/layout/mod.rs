//! Build layout planning
//!
//! Every (recipe identity, settings) pair owns one directory tree under the
//! workspace:
//!
//! ```text
//! <workspace>/<name>/<version>/<short digest>/
//!     .kiln-layout.json      identity + full settings digest
//!     build/
//!         generators/        generated CMake inputs
//!     package/
//! <workspace>/store/<name>/<version>/<short digest>/   installed dependencies
//! ```
//!
//! The short digest is the first 12 hex characters of the settings digest.
//! The stamp file records the full digest so two settings sets sharing a
//! prefix are detected instead of silently sharing a tree.

use crate::error::{KilnError, KilnResult, LayoutError};
use crate::recipe::{Recipe, RecipeIdentity};
use crate::resolver::PackageNode;
use crate::settings::{BuildType, Settings, SettingsDigest};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stamp file name inside a layout root
pub const STAMP_FILE: &str = ".kiln-layout.json";

/// Directory under the workspace root holding installed packages
pub const STORE_DIR: &str = "store";

/// Absolute paths for one build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub identity: RecipeIdentity,
    pub digest: SettingsDigest,
    pub build_type: BuildType,

    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub generators_dir: PathBuf,
    pub package_dir: PathBuf,
}

impl LayoutPlan {
    /// 12-character digest prefix used in the directory name
    pub fn short_hash(&self) -> &str {
        self.digest.short()
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.root.join(STAMP_FILE)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Stamp {
    name: String,
    version: String,
    settings_digest: String,
}

/// Layout planner bound to a workspace root
#[derive(Debug, Clone)]
pub struct Layout {
    workspace: PathBuf,
    /// Create missing ancestors of the workspace root too
    create_parents: bool,
}

impl Layout {
    /// The workspace root is created on first use, but its parent must exist.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            create_parents: false,
        }
    }

    /// Also create missing ancestors of the workspace root (the default
    /// data-directory workspace)
    pub fn with_create_parents(mut self, create: bool) -> Self {
        self.create_parents = create;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Paths for a recipe under the given settings, without touching disk.
    ///
    /// Only the axes the recipe declared contribute to the digest.
    pub fn compute(&self, recipe: &Recipe, settings: &Settings) -> LayoutPlan {
        let relevant = settings.restrict(&recipe.settings);
        let digest = relevant.digest();
        let root = self
            .workspace
            .join(&recipe.identity.name)
            .join(&recipe.identity.version)
            .join(digest.short());
        let build_dir = root.join("build");

        LayoutPlan {
            identity: recipe.identity.clone(),
            build_type: settings.build_type.unwrap_or_default(),
            source_dir: recipe.source_dir.clone(),
            generators_dir: build_dir.join("generators"),
            package_dir: root.join("package"),
            build_dir,
            root,
            digest,
        }
    }

    /// Compute the plan and create its directories.
    ///
    /// Existing directories are reused when their stamp matches.
    pub async fn plan(&self, recipe: &Recipe, settings: &Settings) -> KilnResult<LayoutPlan> {
        let plan = self.compute(recipe, settings);
        debug!("Layout root: {}", plan.root.display());

        self.ensure_workspace().await?;
        check_stamp(&plan).await?;
        for dir in [&plan.root, &plan.build_dir, &plan.generators_dir, &plan.package_dir] {
            ensure_dir(dir).await?;
        }

        let stamp = Stamp {
            name: plan.identity.name.clone(),
            version: plan.identity.version.clone(),
            settings_digest: plan.digest.to_string(),
        };
        let content = serde_json::to_string_pretty(&stamp)?;
        write_atomic(&plan.stamp_path(), content.as_bytes())
            .await
            .map_err(|e| layout_io(plan.stamp_path(), e))?;

        Ok(plan)
    }

    async fn ensure_workspace(&self) -> KilnResult<()> {
        if self.create_parents {
            return ensure_dir(&self.workspace).await;
        }
        match tokio::fs::create_dir(&self.workspace).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.workspace.is_dir() {
                    Ok(())
                } else {
                    Err(LayoutError::PathCollision {
                        path: self.workspace.clone(),
                        reason: "exists and is not a directory".to_string(),
                    }
                    .into())
                }
            }
            Err(e) => Err(layout_io(self.workspace.clone(), e)),
        }
    }

    /// Store directory of an installed dependency package
    pub fn package_dir(&self, node: &PackageNode) -> PathBuf {
        self.workspace
            .join(STORE_DIR)
            .join(&node.name)
            .join(node.version.to_string())
            .join(node.settings.digest().short())
    }
}

/// Fail if an existing layout root belongs to another configuration
async fn check_stamp(plan: &LayoutPlan) -> KilnResult<()> {
    let path = plan.stamp_path();
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(layout_io(path, e)),
    };

    let stamp: Stamp = serde_json::from_str(&content).map_err(|e| LayoutError::PathCollision {
        path: plan.root.clone(),
        reason: format!("unreadable layout stamp: {}", e),
    })?;

    if stamp.name != plan.identity.name
        || stamp.version != plan.identity.version
        || stamp.settings_digest != plan.digest.as_str()
    {
        return Err(LayoutError::PathCollision {
            path: plan.root.clone(),
            reason: format!(
                "directory belongs to {}/{} with settings digest {}",
                stamp.name, stamp.version, stamp.settings_digest
            ),
        }
        .into());
    }
    Ok(())
}

/// Create a directory (and parents), tolerating concurrent creation
async fn ensure_dir(dir: &Path) -> KilnResult<()> {
    if let Ok(meta) = tokio::fs::symlink_metadata(dir).await {
        if !meta.is_dir() {
            return Err(LayoutError::PathCollision {
                path: dir.to_path_buf(),
                reason: "exists and is not a directory".to_string(),
            }
            .into());
        }
        return Ok(());
    }

    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(layout_io(dir.to_path_buf(), e)),
    }
}

fn layout_io(path: PathBuf, source: std::io::Error) -> KilnError {
    match source.kind() {
        ErrorKind::PermissionDenied => LayoutError::PermissionDenied(path).into(),
        _ => LayoutError::Io { path, source }.into(),
    }
}

/// Write a file via a uniquely named temp file in the same directory and a
/// rename, so readers never see a partial file.
pub async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
