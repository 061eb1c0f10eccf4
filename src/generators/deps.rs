//! Dependency descriptors
//!
//! For every resolved package, writes `<name>-config.cmake` defining an
//! `INTERFACE IMPORTED` target `<name>::<name>` so `find_package(<name>)`
//! works against the generators directory. Also writes `kiln-deps.json`, a
//! machine-readable index of the graph in dependency order.

use super::{cmake_path, cmake_quote, write_artifact, GenerateContext, GeneratedArtifact, Generator};
use crate::error::GenerateError;
use crate::resolver::PackageNode;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Aggregate index file name
pub const DEPS_INDEX_FILE: &str = "kiln-deps.json";

/// Version of the `kiln-deps.json` schema
pub const DEPS_FORMAT_VERSION: u32 = 1;

const NAME: &str = "deps";

const CONFIG_SUFFIX: &str = "-config.cmake";

pub struct DepsGenerator;

#[derive(Debug, Serialize)]
struct DepsIndex<'a> {
    format_version: u32,
    recipe: RecipeEntry<'a>,
    settings_digest: &'a str,
    packages: Vec<PackageEntry>,
}

#[derive(Debug, Serialize)]
struct RecipeEntry<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct PackageEntry {
    name: String,
    version: String,
    settings_digest: String,
    install_dir: String,
    targets: Vec<String>,
    requires: Vec<String>,
}

/// `<name>::<name>`
pub fn target_name(package: &str) -> String {
    format!("{0}::{0}", package)
}

#[async_trait]
impl Generator for DepsGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<Vec<GeneratedArtifact>, GenerateError> {
        let order = ctx.graph.topological_order();
        let mut artifacts = Vec::with_capacity(order.len() + 1);
        let mut entries = Vec::with_capacity(order.len());

        for node in order {
            let install_dir = ctx.layout.package_dir(node);
            if !install_dir.is_dir() {
                return Err(GenerateError::MissingArtifact {
                    package: node.reference(),
                    path: install_dir,
                });
            }

            let path = ctx.plan.generators_dir.join(config_file_name(&node.name));
            artifacts.push(write_artifact(NAME, path, &config_file(node, &install_dir)).await?);

            entries.push(PackageEntry {
                name: node.name.clone(),
                version: node.version.to_string(),
                settings_digest: node.settings.digest().to_string(),
                install_dir: cmake_path(&install_dir),
                targets: vec![target_name(&node.name)],
                requires: node.requires.clone(),
            });
        }

        let index = DepsIndex {
            format_version: DEPS_FORMAT_VERSION,
            recipe: RecipeEntry {
                name: &ctx.plan.identity.name,
                version: &ctx.plan.identity.version,
            },
            settings_digest: ctx.plan.digest.as_str(),
            packages: entries,
        };
        let mut json = serde_json::to_string_pretty(&index).map_err(|e| GenerateError::WriteFailure {
            path: ctx.plan.generators_dir.join(DEPS_INDEX_FILE),
            source: e.into(),
        })?;
        json.push('\n');
        artifacts.push(write_artifact(NAME, ctx.plan.generators_dir.join(DEPS_INDEX_FILE), &json).await?);

        prune_stale_configs(&ctx.plan.generators_dir, &artifacts).await?;
        Ok(artifacts)
    }
}

fn config_file_name(package: &str) -> String {
    format!("{}{}", package, CONFIG_SUFFIX)
}

/// Remove package configs left over from an earlier, larger graph.
///
/// The layout is keyed by settings only, so a dropped requirement would
/// otherwise stay findable through `find_package`.
async fn prune_stale_configs(dir: &Path, written: &[GeneratedArtifact]) -> Result<(), GenerateError> {
    let read_failure = |source: std::io::Error| GenerateError::WriteFailure {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_failure)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_failure)? {
        let path = entry.path();
        let is_config = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(CONFIG_SUFFIX));
        if !is_config || written.iter().any(|a| a.path == path) {
            continue;
        }
        debug!("Removing stale {}", path.display());
        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| GenerateError::WriteFailure { path, source })?;
    }
    Ok(())
}

/// CMake package config for one node
fn config_file(node: &PackageNode, install_dir: &Path) -> String {
    let name = &node.name;
    let target = target_name(name);
    let root_var = format!("{}_ROOT", name);
    let iface = &node.interface;
    let under_root = |dirs: &[String]| -> Vec<String> {
        dirs.iter().map(|d| format!("${{{}}}/{}", root_var, d)).collect()
    };

    let mut out = String::new();
    out.push_str(&format!(
        "# {} {} ({}), generated by kiln deps format {}\n\n",
        name,
        node.version,
        node.settings,
        DEPS_FORMAT_VERSION
    ));
    out.push_str("include_guard(GLOBAL)\n\n");
    out.push_str(&format!("set({}_FOUND TRUE)\n", name));
    out.push_str(&format!("set({}_VERSION {})\n", name, cmake_quote(&node.version.to_string())));
    out.push_str(&format!("set({} {})\n", root_var, cmake_quote(&cmake_path(install_dir))));

    for dep in &node.requires {
        out.push_str(&format!(
            "include(\"${{CMAKE_CURRENT_LIST_DIR}}/{}-config.cmake\")\n",
            dep
        ));
    }

    out.push_str(&format!("\nif(NOT TARGET {})\n", target));
    out.push_str(&format!("  add_library({} INTERFACE IMPORTED)\n", target));

    let mut link_items: Vec<String> = iface.libs.clone();
    link_items.extend(iface.system_libs.iter().cloned());
    link_items.extend(node.requires.iter().map(|dep| target_name(dep)));

    let properties = [
        ("INTERFACE_INCLUDE_DIRECTORIES", under_root(&iface.include_dirs)),
        ("INTERFACE_LINK_DIRECTORIES", under_root(&iface.lib_dirs)),
        ("INTERFACE_LINK_LIBRARIES", link_items),
        ("INTERFACE_COMPILE_DEFINITIONS", iface.defines.clone()),
        ("INTERFACE_COMPILE_OPTIONS", iface.cxxflags.clone()),
    ];
    for (property, values) in properties {
        if values.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "  set_property(TARGET {} PROPERTY {} \"{}\")\n",
            target,
            property,
            values.iter().map(|v| v.replace('"', "\\\"")).collect::<Vec<_>>().join(";")
        ));
    }
    out.push_str("endif()\n");
    out
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::resolver::ResolvedGraph;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_config_per_package_and_index() {
        let temp = TempDir::new().unwrap();
        let graph = scenario_graph();
        let (layout, plan) = planned(temp.path(), &graph).await;
        let settings = settings();
        let ctx = GenerateContext {
            graph: &graph,
            settings: &settings,
            plan: &plan,
            layout: &layout,
        };

        let artifacts = DepsGenerator.generate(&ctx).await.unwrap();
        assert_eq!(artifacts.len(), 3);

        let fmt = std::fs::read_to_string(plan.generators_dir.join("fmt-config.cmake")).unwrap();
        assert!(fmt.contains("add_library(fmt::fmt INTERFACE IMPORTED)"));
        assert!(fmt.contains("set(fmt_VERSION \"10.2.0\")"));
        assert!(fmt.contains("set(fmt_FOUND TRUE)"));
        assert!(fmt.contains("INTERFACE_LINK_LIBRARIES \"fmt\""));
        assert!(fmt.contains("${fmt_ROOT}/include"));

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(plan.generators_dir.join(DEPS_INDEX_FILE)).unwrap())
                .unwrap();
        assert_eq!(index["format_version"], 1);
        assert_eq!(index["recipe"]["name"], "myproject");
        assert_eq!(index["packages"][0]["name"], "fmt");
        assert_eq!(index["packages"][1]["targets"][0], "libuv::libuv");
    }

    #[tokio::test]
    async fn dependency_targets_are_linked() {
        let temp = TempDir::new().unwrap();
        let graph = ResolvedGraph::new(
            vec![node("png", "1.6.0", &["zlib"], &["png16"]), node("zlib", "1.3.0", &[], &["z"])],
            vec!["png".to_string()],
        );
        let (layout, plan) = planned(temp.path(), &graph).await;
        let settings = settings();
        let ctx = GenerateContext {
            graph: &graph,
            settings: &settings,
            plan: &plan,
            layout: &layout,
        };
        DepsGenerator.generate(&ctx).await.unwrap();

        let png = std::fs::read_to_string(plan.generators_dir.join("png-config.cmake")).unwrap();
        assert!(png.contains("\"png16;zlib::zlib\""));
        assert!(png.contains("zlib-config.cmake"));

        let index: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(plan.generators_dir.join(DEPS_INDEX_FILE)).unwrap())
                .unwrap();
        // dependencies first
        assert_eq!(index["packages"][0]["name"], "zlib");
        assert_eq!(index["packages"][1]["name"], "png");
    }

    #[tokio::test]
    async fn dropped_requirement_config_is_removed() {
        let temp = TempDir::new().unwrap();
        let graph = scenario_graph();
        let (layout, plan) = planned(temp.path(), &graph).await;
        let settings = settings();
        let ctx = GenerateContext {
            graph: &graph,
            settings: &settings,
            plan: &plan,
            layout: &layout,
        };
        DepsGenerator.generate(&ctx).await.unwrap();
        assert!(plan.generators_dir.join("libuv-config.cmake").exists());

        let smaller = ResolvedGraph::new(
            vec![graph.get("fmt").unwrap().clone()],
            vec!["fmt".to_string()],
        );
        let ctx = GenerateContext {
            graph: &smaller,
            settings: &settings,
            plan: &plan,
            layout: &layout,
        };
        DepsGenerator.generate(&ctx).await.unwrap();

        assert!(plan.generators_dir.join("fmt-config.cmake").exists());
        assert!(!plan.generators_dir.join("libuv-config.cmake").exists());
        assert!(plan.generators_dir.join(DEPS_INDEX_FILE).exists());
    }

    #[tokio::test]
    async fn missing_store_directory_fails() {
        let temp = TempDir::new().unwrap();
        let graph = scenario_graph();
        let (layout, plan) = planned(temp.path(), &graph).await;
        std::fs::remove_dir_all(layout.package_dir(graph.get("libuv").unwrap())).unwrap();

        let settings = settings();
        let ctx = GenerateContext {
            graph: &graph,
            settings: &settings,
            plan: &plan,
            layout: &layout,
        };
        let err = DepsGenerator.generate(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            GenerateError::MissingArtifact { ref package, .. } if package == "libuv/1.46.0"
        ));
    }
}
