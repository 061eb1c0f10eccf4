//! Configuration schema for kiln
//!
//! Global configuration lives at `~/.config/kiln/config.toml`; a project may
//! add a `.kiln.toml` that overrides it key by key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub workspace: WorkspaceConfig,

    /// Package index sources, highest priority first
    pub index: IndexConfig,

    /// Named settings presets: `[profiles.<name>] <axis> = <value>`
    pub profiles: BTreeMap<String, BTreeMap<String, String>>,

    pub cmake: CMakeConfig,

    /// Compiler executable overrides keyed by compiler name
    pub compilers: BTreeMap<String, CompilerPaths>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Profile applied when `--profile` is not given
    pub default_profile: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            default_profile: None,
        }
    }
}

/// Where layouts and installed packages live
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace root (defaults to the user data directory)
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory paths or `http(s)://` URLs
    pub sources: Vec<String>,
}

/// CMake invocation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CMakeConfig {
    /// cmake executable
    pub program: String,

    /// Generator passed as `-G` (CMake picks its default when unset)
    pub generator: Option<String>,

    /// Parallel build jobs
    pub jobs: Option<usize>,
}

impl Default for CMakeConfig {
    fn default() -> Self {
        Self {
            program: "cmake".to_string(),
            generator: None,
            jobs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerPaths {
    pub cc: Option<String>,
    pub cxx: Option<String>,
}
