//! Configuration management for kiln

pub mod schema;

pub use schema::{CMakeConfig, CompilerPaths, Config};

use crate::error::{KilnError, KilnResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".kiln.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiln")
            .join("config.toml")
    }

    /// Default workspace root when none is configured
    pub fn default_workspace() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiln")
            .join("workspace")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> KilnResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> KilnResult<Config> {
        let value = read_toml(path).await?;
        value.try_into().map_err(|e: toml::de::Error| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with a project-local file layered on top.
    ///
    /// Tables merge key by key; any other value in the local file replaces
    /// the global one. Relative index directories in the local file are
    /// taken relative to that file.
    pub async fn load_merged(&self, local: Option<&Path>) -> KilnResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            read_toml(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let mut overlay = read_toml(local).await?;
        if let Some(base) = local.parent() {
            absolutize_sources(&mut overlay, base);
        }
        merge_toml(&mut merged, overlay);

        merged.try_into().map_err(|e: toml::de::Error| KilnError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Walk up from `start` looking for `.kiln.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> KilnResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            KilnError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Settings values of a named profile
    pub fn profile(&self, name: &str) -> KilnResult<&BTreeMap<String, String>> {
        self.profiles
            .get(name)
            .ok_or_else(|| KilnError::ProfileNotFound(name.to_string()))
    }

    /// Configured workspace root or the default one
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace
            .root
            .clone()
            .unwrap_or_else(ConfigManager::default_workspace)
    }

    /// Compiler overrides for a compiler name, if configured
    pub fn compiler_paths(&self, compiler: &str) -> CompilerPaths {
        self.compilers.get(compiler).cloned().unwrap_or_default()
    }
}

async fn read_toml(path: &Path) -> KilnResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| KilnError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e: toml::de::Error| KilnError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Recursively merge `overlay` into `base`
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn absolutize_sources(doc: &mut toml::Value, base: &Path) {
    let Some(sources) = doc
        .get_mut("index")
        .and_then(|index| index.get_mut("sources"))
        .and_then(|sources| sources.as_array_mut())
    else {
        return;
    };

    for source in sources.iter_mut() {
        if let Some(spec) = source.as_str() {
            let is_url = spec.starts_with("http://") || spec.starts_with("https://");
            if !is_url && Path::new(spec).is_relative() {
                *source = toml::Value::String(base.join(spec).display().to_string());
            }
        }
    }
}
