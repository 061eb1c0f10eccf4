//! Resolve command - print the resolved package graph

use super::observer::ConsoleObserver;
use super::prepare;
use crate::cancel::CancelToken;
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::Config;
use crate::error::KilnResult;
use crate::pipeline::{Phase, Silent};
use crate::recipe::Recipe;
use crate::resolver::ResolvedGraph;
use crate::settings::Settings;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config, cancel: CancelToken) -> KilnResult<()> {
    let pipeline = prepare(args.pipeline, config, cancel).await?;

    match args.format {
        OutputFormat::Json => {
            let report = pipeline.run_until(Phase::Resolve, &Silent).await?;
            let graph = report.graph.unwrap_or_default();
            print_json(pipeline.recipe(), pipeline.settings(), &graph)
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::intro(&ctx, &format!("kiln resolve {}", pipeline.recipe().identity));

            let observer = ConsoleObserver::new(&ctx, pipeline.recipe().identity.to_string());
            let report = pipeline.run_until(Phase::Resolve, &observer).await.inspect_err(|_| observer.abort())?;
            let graph = report.graph.unwrap_or_default();

            if graph.is_empty() {
                ui::step_info(&ctx, "No requirements");
            } else {
                print_table(&graph);
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct GraphView<'a> {
    recipe: String,
    settings: BTreeMap<&'static str, &'a str>,
    graph_digest: String,
    roots: &'a [String],
    /// Dependencies before dependents
    packages: Vec<PackageView<'a>>,
}

#[derive(Serialize)]
struct PackageView<'a> {
    name: &'a str,
    version: String,
    source: &'a str,
    depth: usize,
    settings_digest: String,
    requires: &'a [String],
}

fn graph_view<'a>(recipe: &Recipe, settings: &'a Settings, graph: &'a ResolvedGraph) -> GraphView<'a> {
    GraphView {
        recipe: recipe.identity.to_string(),
        settings: settings.entries(),
        graph_digest: graph.digest(),
        roots: graph.roots(),
        packages: graph
            .topological_order()
            .into_iter()
            .map(|node| PackageView {
                name: &node.name,
                version: node.version.to_string(),
                source: &node.source,
                depth: node.depth,
                settings_digest: node.settings.digest().short().to_string(),
                requires: &node.requires,
            })
            .collect(),
    }
}

fn print_json(recipe: &Recipe, settings: &Settings, graph: &ResolvedGraph) -> KilnResult<()> {
    let json = serde_json::to_string_pretty(&graph_view(recipe, settings, graph))?;
    println!("{}", json);
    Ok(())
}

fn print_table(graph: &ResolvedGraph) {
    println!();
    println!(
        "{:<20} {:<12} {:<8} {:<24} {}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("DEPTH").bold(),
        style("SOURCE").bold(),
        style("REQUIRES").bold()
    );
    println!("{}", "-".repeat(80));

    for node in graph.nodes() {
        let requires = if node.requires.is_empty() {
            style("-".to_string()).dim()
        } else {
            style(node.requires.join(", "))
        };
        println!(
            "{:<20} {:<12} {:<8} {:<24} {}",
            node.name,
            node.version.to_string(),
            node.depth,
            node.source,
            requires
        );
    }

    let digest = graph.digest();
    println!();
    println!("{} package(s), graph {}", graph.len(), digest.get(..12).unwrap_or(&digest));
}
