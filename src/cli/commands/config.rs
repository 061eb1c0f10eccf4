//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{KilnError, KilnResult};
use crate::layout::write_atomic;
use crate::settings::Axis;
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> KilnResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                std::env::current_dir()
                    .map_err(|e| KilnError::io("getting current directory", e))?
                    .join(LOCAL_CONFIG_FILE)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value).await?;

            let ctx = UiContext::detect();
            ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, value, path.display()));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> KilnResult<()> {
    let toml = toml::to_string_pretty(config)?;
    println!("{}", toml);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}

/// How a value given on the command line is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Integer,
    List,
}

/// Map a dotted key to its TOML table path.
///
/// Profile keys keep the dotted axis as one key:
/// `profiles.release.compiler.version` is `["profiles", "release", "compiler.version"]`.
fn key_path(key: &str) -> KilnResult<(Vec<String>, ValueKind)> {
    let parts: Vec<&str> = key.split('.').collect();
    let owned = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();

    match parts.as_slice() {
        ["general", "log_format" | "default_profile"]
        | ["workspace", "root"]
        | ["cmake", "program" | "generator"]
        | ["compilers", _, "cc" | "cxx"] => Ok((owned(&parts), ValueKind::Text)),
        ["cmake", "jobs"] => Ok((owned(&parts), ValueKind::Integer)),
        ["index", "sources"] => Ok((owned(&parts), ValueKind::List)),
        ["profiles", profile, axis @ ..] if !axis.is_empty() => {
            let axis = axis.join(".");
            if Axis::parse(&axis).is_none() {
                return Err(KilnError::User(format!("Unknown setting '{}' in key {}", axis, key)));
            }
            Ok((vec!["profiles".to_string(), profile.to_string(), axis], ValueKind::Text))
        }
        _ => Err(KilnError::User(format!(
            "Unknown config key: {} (valid: {})",
            key,
            VALID_KEYS.join(", ")
        ))),
    }
}

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "general.default_profile",
    "workspace.root",
    "index.sources",
    "cmake.program",
    "cmake.generator",
    "cmake.jobs",
    "profiles.<name>.<axis>",
    "compilers.<name>.cc",
    "compilers.<name>.cxx",
];

/// Set one key in a config file, keeping every other key as written
async fn set_value(path: &Path, key: &str, value: &str) -> KilnResult<()> {
    let (segments, kind) = key_path(key)?;

    let mut doc: toml::Value = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| KilnError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, &segments, typed_value(kind, value)?)?;

    // Refuse to write something the loader would reject
    let _: Config = doc.clone().try_into().map_err(|e: toml::de::Error| KilnError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
    }
    let content = toml::to_string_pretty(&doc)?;
    write_atomic(path, content.as_bytes())
        .await
        .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))
}

fn typed_value(kind: ValueKind, value: &str) -> KilnResult<toml::Value> {
    Ok(match kind {
        ValueKind::Text => toml::Value::String(value.to_string()),
        ValueKind::Integer => toml::Value::Integer(
            value
                .parse()
                .map_err(|_| KilnError::User(format!("Invalid number: {}", value)))?,
        ),
        ValueKind::List => toml::Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ),
    })
}

/// Set a value at `segments`, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, segments: &[String], value: toml::Value) -> KilnResult<()> {
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(KilnError::User("empty config key".to_string()));
    };

    let mut current = doc;
    for part in parents {
        current = current
            .as_table_mut()
            .ok_or_else(|| KilnError::User(format!("Expected table at key: {}", part)))?
            .entry(part.as_str())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| KilnError::User(format!("Expected table for key: {}", segments.join("."))))?
        .insert(leaf.clone(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn key_path_profiles_keep_dotted_axis() {
        let (segments, kind) = key_path("profiles.release.compiler.version").unwrap();
        assert_eq!(segments, vec!["profiles", "release", "compiler.version"]);
        assert_eq!(kind, ValueKind::Text);

        assert!(key_path("profiles.release.color").is_err());
        assert!(key_path("profiles.release").is_err());
        assert!(key_path("vm.name").is_err());
        assert_eq!(key_path("cmake.jobs").unwrap().1, ValueKind::Integer);
        assert_eq!(key_path("index.sources").unwrap().1, ValueKind::List);
    }

    #[tokio::test]
    async fn set_value_creates_file_and_loads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        set_value(&path, "cmake.generator", "Ninja").await.unwrap();
        set_value(&path, "cmake.jobs", "8").await.unwrap();
        set_value(&path, "index.sources", "/srv/a, https://index.example.com").await.unwrap();
        set_value(&path, "profiles.release.compiler.version", "13").await.unwrap();

        let config = ConfigManager::with_path(path).load().await.unwrap();
        assert_eq!(config.cmake.generator.as_deref(), Some("Ninja"));
        assert_eq!(config.cmake.jobs, Some(8));
        assert_eq!(config.index.sources, vec!["/srv/a", "https://index.example.com"]);
        assert_eq!(config.profile("release").unwrap()["compiler.version"], "13");
    }

    #[tokio::test]
    async fn set_value_keeps_other_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&path, "[workspace]\nroot = \"/ws\"\n").unwrap();

        set_value(&path, "general.default_profile", "release").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("root = \"/ws\""));
        assert!(content.contains("default_profile = \"release\""));
        assert!(!content.contains("[cmake]"));
    }

    #[tokio::test]
    async fn set_value_rejects_bad_number() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        assert!(set_value(&path, "cmake.jobs", "many").await.is_err());
        assert!(!path.exists());
    }
}
