//! Recipe loading
//!
//! A recipe is the `kiln.toml` file at the root of a project. It names the
//! component, lists the settings axes its binaries depend on, and declares
//! the upstream packages it requires:
//!
//! ```toml
//! [recipe]
//! name = "myproject"
//! version = "0.1"
//! settings = ["os", "compiler", "build_type", "arch"]
//! requires = ["fmt>=10.0,<11.0", "libuv>=1.40,<2.0"]
//! exports_sources = ["CMakeLists.txt", "src/*"]
//! ```
//!
//! Requirements are parsed once at load time into plain data; nothing in a
//! recipe is evaluated during resolution.

pub mod requirement;

pub use requirement::{parse_version, validate_package_name, RequirementSpec, VersionConstraint};

use crate::error::{KilnError, KilnResult};
use crate::settings::Sensitivity;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of a recipe inside a project directory
pub const RECIPE_FILE: &str = "kiln.toml";

/// Name and version of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeIdentity {
    pub name: String,
    pub version: String,
}

impl fmt::Display for RecipeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// A loaded recipe. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub identity: RecipeIdentity,

    /// Axes the recipe's binaries are sensitive to
    pub settings: Sensitivity,

    /// Direct requirements in declaration order
    pub requires: Vec<RequirementSpec>,

    /// Source globs shipped with the recipe
    pub exports_sources: Vec<String>,

    /// Directory containing the recipe (the CMake source root)
    pub source_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RecipeFile {
    recipe: RecipeSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeSection {
    name: String,
    version: String,
    #[serde(default)]
    settings: Vec<String>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    exports_sources: Vec<String>,
}

impl Recipe {
    /// Load `kiln.toml` from a project directory
    pub async fn from_dir(dir: &Path) -> KilnResult<Self> {
        let path = dir.join(RECIPE_FILE);
        if !path.exists() {
            return Err(KilnError::RecipeNotFound(path));
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| KilnError::io(format!("reading recipe {}", path.display()), e))?;

        let source_dir = std::path::absolute(dir)
            .map_err(|e| KilnError::io(format!("resolving {}", dir.display()), e))?;
        Self::parse(&content, &source_dir).map_err(|reason| KilnError::RecipeInvalid {
            path: path.clone(),
            reason,
        })
    }

    /// Parse recipe text; `source_dir` is recorded as the source root
    pub fn parse(content: &str, source_dir: &Path) -> Result<Self, String> {
        let file: RecipeFile = toml::from_str(content).map_err(|e| e.to_string())?;
        let section = file.recipe;

        validate_package_name(&section.name)?;
        if section.version.trim().is_empty()
            || section.version.starts_with('.')
            || !section
                .version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
        {
            return Err(format!("invalid recipe version '{}'", section.version));
        }

        let settings = Sensitivity::from_names(&section.settings).map_err(|e| e.to_string())?;
        let requires = section
            .requires
            .iter()
            .map(|spec| RequirementSpec::parse(spec).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            identity: RecipeIdentity {
                name: section.name,
                version: section.version,
            },
            settings,
            requires,
            exports_sources: section.exports_sources,
            source_dir: source_dir.to_path_buf(),
        })
    }
}
